//! Bounded fan-out of render jobs to a fixed set of workers.
//!
//! One producer (the staleness scan) and N workers share a single rendezvous
//! channel: a send only completes when a worker is ready to take the job, so
//! at most N jobs are in flight and memory stays bounded no matter how large
//! the serving tree is.
//!
//! ## Cancellation
//!
//! Any render error is fatal to the run. The worker that sees it records it
//! in a shared slot (the first one wins), raises the stop flag and exits.
//! Workers check the flag before every job; the producer checks it before
//! every send and keeps re-checking while it waits for a receiver, so it
//! never blocks forever on workers that are gone. Jobs already being
//! rendered are allowed to finish.

use crate::render::{RenderError, Renderer};
use crate::staleness::RenderJob;
use crossbeam_channel::{self as chan, Receiver, SendTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// How long a blocked send waits before re-checking the stop flag.
const SEND_POLL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("a render worker panicked")]
    WorkerPanicked,
}

/// Returned to the producer once the run has been cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Producer side of the job channel.
pub struct JobSender<'s, 'a> {
    tx: Sender<RenderJob<'a>>,
    stop: &'s AtomicBool,
}

impl<'a> JobSender<'_, 'a> {
    /// Hand `job` to the next free worker, waiting as long as it takes
    /// unless the run is cancelled first.
    pub fn send(&self, job: RenderJob<'a>) -> Result<(), Cancelled> {
        let mut job = job;
        loop {
            if self.stop.load(Ordering::Acquire) {
                return Err(Cancelled);
            }
            match self.tx.send_timeout(job, SEND_POLL) {
                Ok(()) => return Ok(()),
                // No worker free yet; retry after checking stop.
                Err(SendTimeoutError::Timeout(returned)) => job = returned,
                // Every worker has exited.
                Err(SendTimeoutError::Disconnected(_)) => return Err(Cancelled),
            }
        }
    }
}

/// What a completed dispatch produced.
#[derive(Debug)]
pub struct Dispatched<T> {
    /// Whatever the producer returned.
    pub value: T,
    /// Pages rendered successfully.
    pub rendered: usize,
}

/// Fixed-size pool of render workers.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    workers: usize,
}

impl Dispatcher {
    /// `workers` is clamped to at least one.
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `produce` on the calling thread while the workers render every
    /// job it sends.
    ///
    /// Returns only after every worker has exited. The result is the first
    /// render error if there was one, otherwise the producer's value.
    pub fn run<'a, R, T>(
        &self,
        renderer: &R,
        produce: impl FnOnce(&JobSender<'_, 'a>) -> Result<T, Cancelled>,
    ) -> Result<Dispatched<T>, DispatchError>
    where
        R: Renderer + ?Sized,
    {
        let stop = AtomicBool::new(false);
        let first_error: Mutex<Option<RenderError>> = Mutex::new(None);
        let rendered = AtomicUsize::new(0);
        let (tx, rx) = chan::bounded::<RenderJob<'a>>(0);

        let (produced, panicked) = thread::scope(|scope| {
            let handles: Vec<_> = (0..self.workers)
                .map(|id| {
                    let rx = rx.clone();
                    let worker = Worker {
                        id,
                        stop: &stop,
                        first_error: &first_error,
                        rendered: &rendered,
                    };
                    scope.spawn(move || worker.run(renderer, rx))
                })
                .collect();
            // Only workers hold receivers now.
            drop(rx);

            let sender = JobSender { tx, stop: &stop };
            let produced = produce(&sender);
            // Closing the channel lets idle workers drain and exit.
            drop(sender);

            let mut panicked = false;
            for handle in handles {
                panicked |= handle.join().is_err();
            }
            (produced, panicked)
        });

        let first_error = first_error
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(e) = first_error {
            return Err(e.into());
        }
        match produced {
            Ok(value) if !panicked => Ok(Dispatched {
                value,
                rendered: rendered.into_inner(),
            }),
            // Cancelled without a recorded error: the workers died.
            _ => Err(DispatchError::WorkerPanicked),
        }
    }
}

struct Worker<'s> {
    id: usize,
    stop: &'s AtomicBool,
    first_error: &'s Mutex<Option<RenderError>>,
    rendered: &'s AtomicUsize,
}

impl Worker<'_> {
    fn run<R: Renderer + ?Sized>(&self, renderer: &R, rx: Receiver<RenderJob<'_>>) {
        while let Ok(job) = rx.recv() {
            if self.stop.load(Ordering::Acquire) {
                break;
            }
            match renderer.render(&job) {
                Ok(()) => {
                    self.rendered.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(worker = self.id, dest = %job.dest.display(), "rendered");
                }
                Err(e) => {
                    tracing::error!(worker = self.id, error = %e, "render failed, cancelling run");
                    let mut slot = self
                        .first_error
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                    drop(slot);
                    self.stop.store(true, Ordering::Release);
                    break;
                }
            }
        }
    }
}
