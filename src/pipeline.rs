//! The incremental render pass, end to end.
//!
//! ```text
//! inventory::scan ──► staleness::detect ──► Dispatcher (N workers) ──► aggregate
//!   (one listing       (per package dir,      (pages, atomic writes)     (indexes,
//!    per directory)     resolves via xref)                                listings)
//! ```
//!
//! [`render_all`] either restores every output to be at least as new as its
//! inputs or stops at the first fatal error without leaving partial files
//! behind. [`check`] runs the same scan and staleness detection but only
//! counts what a render pass would do.

use crate::aggregate::{self, listing_is_stale};
use crate::dispatch::{DispatchError, Dispatcher};
use crate::inventory::{self, Inventory, PackageDir, ScanError};
use crate::meta::{GlobalView, IndexError};
use crate::render::{RenderError, Renderer};
use crate::staleness::{self, DirectoryState};
use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error("cross-reference index: {0}")]
    Index(#[from] IndexError),
    #[error("cannot build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("a render worker panicked")]
    WorkerPanicked,
}

impl From<DispatchError> for PipelineError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Render(e) => Self::Render(e),
            DispatchError::WorkerPanicked => Self::WorkerPanicked,
        }
    }
}

/// Knobs for one pass.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Concurrent page renderers; also sizes the aggregation pool.
    pub workers: usize,
    /// Restrict pages and indexes to these binary packages.
    pub only_render: Option<BTreeSet<String>>,
    /// Regenerate every suite listing regardless of staleness.
    pub force_listings: bool,
}

impl RenderOptions {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            only_render: None,
            force_listings: false,
        }
    }

    /// Build the whitelist from a list of names; empty means no restriction.
    pub fn with_only_render(mut self, packages: &[String]) -> Self {
        self.only_render = if packages.is_empty() {
            None
        } else {
            Some(packages.iter().cloned().collect())
        };
        self
    }

    fn selected(&self, dir: &PackageDir) -> bool {
        self.only_render
            .as_ref()
            .is_none_or(|only| only.contains(&dir.package))
    }
}

/// What one render pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    /// Package directories inspected.
    pub directories: usize,
    /// Pages rendered.
    pub rendered: usize,
    /// Source entries skipped because their name could not be parsed or is
    /// not UTF-8.
    pub skipped: usize,
    /// Package indexes rebuilt.
    pub indexes: usize,
    /// Suite listings rendered.
    pub listings: usize,
}

impl RunStats {
    /// Whether the pass wrote nothing at all.
    pub fn is_noop(&self) -> bool {
        self.rendered == 0 && self.indexes == 0 && self.listings == 0
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rendered, {} {} rebuilt, {} {} ({} directories",
            self.rendered,
            self.indexes,
            plural(self.indexes, "index", "indexes"),
            self.listings,
            plural(self.listings, "listing", "listings"),
            self.directories,
        )?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        write!(f, ")")
    }
}

fn plural<'s>(n: usize, one: &'s str, many: &'s str) -> &'s str {
    if n == 1 { one } else { many }
}

fn log_whitelist(options: &RenderOptions) {
    if let Some(only) = &options.only_render {
        let names: Vec<&str> = only.iter().map(String::as_str).collect();
        tracing::info!(packages = %names.join(","), "restricting rendering to whitelisted packages");
    }
}

/// Bring every output under `root` up to date.
pub fn render_all<R>(
    root: &Path,
    view: &GlobalView,
    renderer: &R,
    options: &RenderOptions,
) -> Result<RunStats, PipelineError>
where
    R: Renderer + ?Sized,
{
    log_whitelist(options);
    let inventory = inventory::scan(root, &view.suites)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers.max(1))
        .build()?;

    let dispatcher = Dispatcher::new(options.workers);
    let dispatched = dispatcher.run(renderer, |sender| {
        let mut states = Vec::new();
        for dir in inventory.packages.iter().filter(|d| options.selected(d)) {
            states.push(staleness::detect(root, dir, &view.xref, |job| {
                sender.send(job)
            })?);
        }
        Ok(states)
    })?;
    let states: Vec<DirectoryState> = dispatched.value;
    tracing::info!(
        rendered = dispatched.rendered,
        workers = dispatcher.workers(),
        "page rendering complete"
    );

    let aggregated =
        aggregate::aggregate(&pool, renderer, &inventory, &states, options.force_listings)?;

    Ok(RunStats {
        directories: states.len(),
        rendered: dispatched.rendered,
        skipped: states.iter().map(|s| s.skipped).sum(),
        indexes: aggregated.indexes,
        listings: aggregated.listings,
    })
}

/// What a render pass would do for one suite.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SuitePlan {
    pub suite: String,
    pub directories: usize,
    pub stale_documents: usize,
    pub stale_indexes: usize,
    pub skipped: usize,
    pub listing_stale: bool,
}

impl SuitePlan {
    pub fn is_up_to_date(&self) -> bool {
        self.stale_documents == 0 && self.stale_indexes == 0 && !self.listing_stale
    }
}

/// Result of a dry run, one plan per scanned suite in name order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub suites: Vec<SuitePlan>,
}

impl CheckReport {
    pub fn is_up_to_date(&self) -> bool {
        self.suites.iter().all(SuitePlan::is_up_to_date)
    }

    pub fn stale_documents(&self) -> usize {
        self.suites.iter().map(|s| s.stale_documents).sum()
    }

    pub fn stale_indexes(&self) -> usize {
        self.suites.iter().map(|s| s.stale_indexes).sum()
    }
}

/// Report what [`render_all`] would write, without writing anything.
pub fn check(
    root: &Path,
    view: &GlobalView,
    options: &RenderOptions,
) -> Result<CheckReport, PipelineError> {
    log_whitelist(options);
    let inventory = inventory::scan(root, &view.suites)?;
    Ok(plan(root, view, &inventory, options))
}

fn plan(root: &Path, view: &GlobalView, inventory: &Inventory, options: &RenderOptions) -> CheckReport {
    let mut by_suite: BTreeMap<&str, SuitePlan> = inventory
        .suites
        .iter()
        .map(|s| {
            let plan = SuitePlan {
                suite: s.name.clone(),
                ..Default::default()
            };
            (s.name.as_str(), plan)
        })
        .collect();

    for dir in inventory.packages.iter().filter(|d| options.selected(d)) {
        let state = staleness::detect(root, dir, &view.xref, |_| Ok::<(), Infallible>(()))
            .unwrap_or_else(|never| match never {});
        if let Some(plan) = by_suite.get_mut(dir.suite.as_str()) {
            plan.directories += 1;
            plan.stale_documents += state.rendered;
            plan.skipped += state.skipped;
            plan.stale_indexes += usize::from(state.index_stale);
        }
    }

    for suite in &inventory.suites {
        if let Some(plan) = by_suite.get_mut(suite.name.as_str()) {
            plan.listing_stale =
                listing_is_stale(suite, plan.stale_indexes > 0, options.force_listings);
        }
    }

    CheckReport {
        suites: by_suite.into_values().collect(),
    }
}
