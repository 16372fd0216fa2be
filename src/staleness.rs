//! Staleness detection for one package directory.
//!
//! The invariant the renderer maintains is: every source page `X.gz` has a
//! rendered `X.html.gz` whose mtime is not earlier than the source's, and the
//! directory's `index.html.gz` is not older than any source page in it.
//! [`detect`] compares the mtimes captured by the inventory scan and emits a
//! [`RenderJob`] for every page that violates the first half. Whether the
//! index violates the second half is returned in the [`DirectoryState`].
//!
//! The index rule is deliberately conservative: any source newer than the
//! index marks it stale, even a source whose own rendered page is already
//! fresh.

use crate::inventory::{EntryKind, PackageDir};
use crate::meta::{CrossReferenceIndex, DocumentMeta};
use crate::naming::{self, INDEX_NAME};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// One page to render. Consumed by exactly one worker.
#[derive(Debug, Clone)]
pub struct RenderJob<'a> {
    /// `<dir>/<page>.html.gz`
    pub dest: PathBuf,
    /// `<dir>/<page>.gz`
    pub src: PathBuf,
    /// The index's shared instance when the page is indexed.
    pub meta: Arc<DocumentMeta>,
    /// Every variant sharing the page's name, including `meta` itself.
    pub variants: &'a [Arc<DocumentMeta>],
    pub xref: &'a CrossReferenceIndex,
}

/// What the detector learned about one package directory.
#[derive(Debug)]
pub struct DirectoryState {
    pub suite: String,
    pub package: String,
    pub path: PathBuf,
    /// Every parsed source page, keyed by source file name.
    pub documents: BTreeMap<String, Arc<DocumentMeta>>,
    /// Pages emitted for rendering.
    pub rendered: usize,
    /// Source entries whose name could not be parsed.
    pub skipped: usize,
    /// Some source page is newer than `index.html.gz` (or it is missing).
    pub index_stale: bool,
}

impl DirectoryState {
    pub fn index_path(&self) -> PathBuf {
        self.path.join(INDEX_NAME)
    }
}

/// Inspect one package directory, handing every stale page to `emit`.
///
/// `emit` returning an error stops the loop immediately and the error is
/// passed through; the dispatcher uses that for cancellation.
pub fn detect<'a, E>(
    root: &Path,
    dir: &PackageDir,
    xref: &'a CrossReferenceIndex,
    mut emit: impl FnMut(RenderJob<'a>) -> Result<(), E>,
) -> Result<DirectoryState, E> {
    let by_name = dir.by_name();
    let index_modified = by_name
        .get(INDEX_NAME)
        .map(|e| e.modified)
        .unwrap_or(UNIX_EPOCH);

    let mut state = DirectoryState {
        suite: dir.suite.clone(),
        package: dir.package.clone(),
        path: dir.path.clone(),
        documents: BTreeMap::new(),
        rendered: 0,
        skipped: 0,
        index_stale: false,
    };

    for entry in &dir.entries {
        // Symlinks alias a page rendered under its real name.
        if entry.kind != EntryKind::File {
            continue;
        }
        let src = dir.path.join(&entry.file_name);
        let Some(name) = entry.name() else {
            if looks_like_source(&entry.file_name) {
                tracing::warn!(
                    path = %src.display(),
                    "skipping page with non UTF-8 file name"
                );
                state.skipped += 1;
            }
            continue;
        };
        if !naming::is_source_name(name) {
            continue;
        }

        let parsed = match naming::from_serving_path(root, &src) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(
                    path = %src.display(),
                    error = %e,
                    "BUG: cannot parse page from serving path"
                );
                state.skipped += 1;
                continue;
            }
        };
        let meta = xref.resolve(parsed);
        state.documents.insert(name.to_string(), Arc::clone(&meta));

        let html_name = naming::rendered_name(name);
        let needs_render = match by_name.get(html_name.as_str()) {
            Some(html) => html.modified < entry.modified,
            None => true,
        };
        if needs_render {
            let variants = xref.variants(&meta.name);
            emit(RenderJob {
                dest: dir.path.join(&html_name),
                src,
                meta,
                variants,
                xref,
            })?;
            state.rendered += 1;
        }

        if newer_than(entry.modified, index_modified) {
            state.index_stale = true;
        }
    }

    Ok(state)
}

fn newer_than(a: SystemTime, b: SystemTime) -> bool {
    a > b
}

/// Byte-level `is_source_name` for names that are not UTF-8.
fn looks_like_source(file_name: &OsStr) -> bool {
    let bytes = file_name.as_encoded_bytes();
    bytes.ends_with(naming::SOURCE_SUFFIX.as_bytes())
        && !bytes.ends_with(naming::RENDERED_SUFFIX.as_bytes())
}
