//! # manrender
//!
//! Incremental, concurrent renderer for a tree of gzip-compressed manual
//! pages. Each run re-renders only what is stale, writes every output
//! atomically, and finishes by refreshing the package indexes and suite
//! listings that depend on the pages.
//!
//! # Serving Tree
//!
//! ```text
//! /srv/man/
//! ├── contents-bookworm.html.gz        # suite listing
//! └── bookworm/                        # suite
//!     └── coreutils/                   # binary package
//!         ├── index.html.gz            # package index
//!         ├── ls.1.gz                  # source page
//!         ├── ls.1.html.gz             # rendered page
//!         ├── ls.1.fr.gz               # translation
//!         └── dir.1.gz -> ls.1.gz      # alias, never rendered
//! ```
//!
//! # Pipeline
//!
//! One run goes through these phases, each starting only once the previous
//! one succeeded:
//!
//! 1. **Index**: walk every suite and build the [`meta::CrossReferenceIndex`]
//!    of all page variants. It is read-only from here on.
//! 2. **Scan**: list every package directory once ([`inventory`]).
//! 3. **Detect and dispatch**: per directory, decide which pages are stale
//!    ([`staleness`]) and hand them to a fixed pool of workers over a
//!    rendezvous channel ([`dispatch`]). The first render error cancels the
//!    run.
//! 4. **Aggregate**: rebuild stale package indexes, then stale suite
//!    listings ([`aggregate`]).
//!
//! Nothing about a run is persisted. Staleness is derived from modification
//! times on every run: an output is fresh when it is at least as new as
//! everything it was built from.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Runs the phases above; dry-run [`pipeline::check`] |
//! | [`atomic`] | Temp file + gzip + rename writer used for every output |
//! | [`inventory`] | One-pass listing of suites and package directories |
//! | [`staleness`] | Per-directory page and index staleness, render jobs |
//! | [`dispatch`] | Bounded worker pool with first-error cancellation |
//! | [`aggregate`] | Package index and suite listing regeneration |
//! | [`meta`] | Page identities and the cross-reference index |
//! | [`naming`] | `<name>.<section>[.<lang>].gz` serving-path parser |
//! | [`render`] | `Renderer` trait and the maud-based HTML renderer |
//! | [`config`] | `manrender.toml` loading, validation, merging |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`output`] | CLI output formatting for render and check |
//!
//! # Design Decisions
//!
//! ## Identity by Pointer
//!
//! Every page variant is allocated once, in the cross-reference index, and
//! shared as an `Arc`. Pages found during the scan are swapped for the
//! index's instance, so "is this the page being rendered?" is a pointer
//! comparison. [`meta::DocumentMeta::same_document`] exists for callers
//! holding copies.
//!
//! ## Atomic Writes Only
//!
//! A web server reads the tree while it is being rendered. Every output is
//! staged in a temporary file next to its destination and renamed into
//! place, so a reader sees either the old file or the new one. A failed
//! render leaves the previous output and its mtime alone, which keeps it
//! stale for the next run.

pub mod aggregate;
pub mod atomic;
pub mod config;
pub mod dispatch;
pub mod inventory;
pub mod logging;
pub mod meta;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod staleness;

#[cfg(test)]
pub(crate) mod test_helpers;
