//! Shared test utilities for the manrender test suite.
//!
//! Provides serving-tree fixture builders, mtime control and a [`Renderer`]
//! mock that records what it was asked to do.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let src = write_source(tmp.path(), "bookworm/coreutils/ls.1.gz", "LS(1)");
//! set_mtime(&src, ts(1_000));
//!
//! let renderer = RecordingRenderer::default();
//! // ... run the pipeline ...
//! assert_eq!(renderer.page_names(), vec!["ls.1.html.gz"]);
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::atomic::write_atomically;
use crate::meta::DocumentMeta;
use crate::naming::DEFAULT_LANGUAGE;
use crate::render::{RenderError, Renderer};
use crate::staleness::RenderJob;

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `content` gzip-compressed to `root/rel`, creating parents.
pub fn write_source(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    fs::write(&path, encoder.finish().unwrap()).unwrap();
    path
}

/// Decompress a gzip file to a string.
pub fn read_gz(path: &Path) -> String {
    let file = fs::File::open(path)
        .unwrap_or_else(|e| panic!("cannot open {}: {e}", path.display()));
    let mut text = String::new();
    GzDecoder::new(file).read_to_string(&mut text).unwrap();
    text
}

/// `UNIX_EPOCH + secs`.
pub fn ts(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

/// Set the modification time of a file or directory.
pub fn set_mtime(path: &Path, time: SystemTime) {
    let file = if path.is_dir() {
        fs::File::open(path)
    } else {
        fs::File::options().write(true).open(path)
    }
    .unwrap_or_else(|e| panic!("cannot open {}: {e}", path.display()));
    file.set_modified(time).unwrap();
}

/// A page variant as the scanner would parse it.
pub fn doc(suite: &str, package: &str, name: &str, section: &str, lang: &str) -> DocumentMeta {
    let stem = if lang == DEFAULT_LANGUAGE {
        format!("{name}.{section}")
    } else {
        format!("{name}.{section}.{lang}")
    };
    DocumentMeta {
        name: name.into(),
        section: section.into(),
        language: lang.into(),
        suite: suite.into(),
        package: package.into(),
        version: None,
        stem,
    }
}

// =========================================================================
// Recording renderer
// =========================================================================

/// A [`Renderer`] that writes a one-line placeholder for every output and
/// remembers every call.
///
/// With `fail_on` set, rendering the page whose source file name matches
/// fails with a write error and leaves the destination untouched.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub fail_on: Option<String>,
    pages: Mutex<Vec<PathBuf>>,
    indexes: Mutex<Vec<PathBuf>>,
    listings: Mutex<Vec<PathBuf>>,
}

impl RecordingRenderer {
    pub fn failing_on(source_name: &str) -> Self {
        Self {
            fail_on: Some(source_name.to_string()),
            ..Default::default()
        }
    }

    /// Page destinations in call order.
    pub fn pages(&self) -> Vec<PathBuf> {
        self.pages.lock().unwrap().clone()
    }

    /// Page destination file names, sorted.
    pub fn page_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pages().iter().map(|p| file_name(p)).collect();
        names.sort();
        names
    }

    pub fn indexes(&self) -> Vec<PathBuf> {
        self.indexes.lock().unwrap().clone()
    }

    pub fn listings(&self) -> Vec<PathBuf> {
        self.listings.lock().unwrap().clone()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

fn placeholder(dest: &Path, line: String) -> Result<(), RenderError> {
    write_atomically(dest, |w| w.write_all(line.as_bytes())).map_err(|source: io::Error| {
        RenderError::Write {
            path: dest.to_path_buf(),
            source,
        }
    })
}

impl Renderer for RecordingRenderer {
    fn render(&self, job: &RenderJob<'_>) -> Result<(), RenderError> {
        self.pages.lock().unwrap().push(job.dest.clone());
        if self.fail_on.as_deref() == Some(file_name(&job.src).as_str()) {
            return Err(RenderError::Write {
                path: job.dest.clone(),
                source: io::Error::other("injected failure"),
            });
        }
        placeholder(&job.dest, format!("page {}", job.meta.serving_path()))
    }

    fn render_index(
        &self,
        dest: &Path,
        documents: &BTreeMap<String, Arc<DocumentMeta>>,
    ) -> Result<(), RenderError> {
        self.indexes.lock().unwrap().push(dest.to_path_buf());
        let names: Vec<&str> = documents.keys().map(String::as_str).collect();
        placeholder(dest, format!("index {}", names.join(" ")))
    }

    fn render_listing(
        &self,
        dest: &Path,
        suite: &str,
        packages: &[String],
    ) -> Result<(), RenderError> {
        self.listings.lock().unwrap().push(dest.to_path_buf());
        placeholder(dest, format!("listing {suite} {}", packages.join(" ")))
    }
}
