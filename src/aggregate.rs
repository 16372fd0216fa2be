//! Aggregation pass: package indexes, then suite listings.
//!
//! Runs strictly after every page render has completed. Stale indexes are
//! rebuilt in parallel; listings are only started once all index rebuilds
//! have succeeded.
//!
//! A suite listing is regenerated when it is missing, when the suite
//! directory changed after it was written (a package directory appeared or
//! went away), or when any index of that suite was rebuilt in this run.
//!
//! Every stale index is attempted even if another one fails. The error
//! returned is the one for the earliest directory in scan order, so the
//! same broken tree always reports the same path.

use crate::inventory::{Inventory, SuiteDir, listing_name};
use crate::render::{RenderError, Renderer};
use crate::staleness::DirectoryState;
use rayon::prelude::*;
use std::collections::BTreeSet;

/// Counts of what the aggregation pass wrote.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Aggregated {
    pub indexes: usize,
    pub listings: usize,
}

/// Whether `suite`'s listing must be regenerated.
pub fn listing_is_stale(suite: &SuiteDir, index_rebuilt: bool, force: bool) -> bool {
    force
        || index_rebuilt
        || suite
            .listing_modified
            .is_none_or(|listing| listing < suite.modified)
}

/// Rebuild every stale index in `states`, then every stale listing.
pub fn aggregate<R>(
    pool: &rayon::ThreadPool,
    renderer: &R,
    inventory: &Inventory,
    states: &[DirectoryState],
    force_listings: bool,
) -> Result<Aggregated, RenderError>
where
    R: Renderer + ?Sized,
{
    let stale: Vec<&DirectoryState> = states.iter().filter(|s| s.index_stale).collect();
    let results: Vec<Result<(), RenderError>> = pool.install(|| {
        stale
            .par_iter()
            .map(|dir| renderer.render_index(&dir.index_path(), &dir.documents))
            .collect()
    });
    first_error(results)?;
    tracing::info!(indexes = stale.len(), "package indexes rebuilt");

    let rebuilt: BTreeSet<&str> = stale.iter().map(|s| s.suite.as_str()).collect();
    let listings: Vec<&SuiteDir> = inventory
        .suites
        .iter()
        .filter(|s| listing_is_stale(s, rebuilt.contains(s.name.as_str()), force_listings))
        .collect();
    let results: Vec<Result<(), RenderError>> = pool.install(|| {
        listings
            .par_iter()
            .map(|suite| {
                let dest = inventory.root.join(listing_name(&suite.name));
                renderer.render_listing(&dest, &suite.name, &suite.packages)
            })
            .collect()
    });
    first_error(results)?;
    tracing::info!(listings = listings.len(), "suite listings rendered");

    Ok(Aggregated {
        indexes: stale.len(),
        listings: listings.len(),
    })
}

/// The earliest error in input order. Later ones are logged.
fn first_error(results: Vec<Result<(), RenderError>>) -> Result<(), RenderError> {
    let mut errors = results.into_iter().filter_map(Result::err);
    let Some(first) = errors.next() else {
        return Ok(());
    };
    for e in errors {
        tracing::error!(error = %e, "aggregation failed");
    }
    Err(first)
}
