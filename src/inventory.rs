//! One-pass inventory of the serving tree.
//!
//! Deciding what is stale needs the modification time of every source page,
//! every rendered page and every index. Rather than `stat`ing files one by
//! one while deciding, the scanner lists each package directory exactly once
//! and keeps the entries (name, kind, mtime) in memory:
//!
//! ```text
//! <root>/
//! ├── contents-bookworm.html.gz      # suite listing
//! └── bookworm/                      # suite
//!     └── coreutils/                 # binary package → one PackageDir
//!         ├── index.html.gz
//!         ├── ls.1.gz
//!         ├── ls.1.html.gz
//!         └── dir.1.gz -> ls.1.gz    # alias, never rendered
//! ```
//!
//! Any listing error is fatal: an unreadable suite or package directory means
//! the serving tree is misconfigured, and silently skipping it would leave
//! pages stale without anyone noticing.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("cannot list {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot stat {path}: {source}")]
    Metadata {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// What a directory entry is, without following symbolic links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Other,
}

/// One directory entry as seen at scan time.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    /// The name exactly as the filesystem returned it.
    pub file_name: OsString,
    pub kind: EntryKind,
    pub modified: SystemTime,
}

impl EntryInfo {
    /// The file name, if it is valid UTF-8.
    pub fn name(&self) -> Option<&str> {
        self.file_name.to_str()
    }
}

/// A `<suite>/<package>` directory and everything in it.
#[derive(Debug)]
pub struct PackageDir {
    pub suite: String,
    pub package: String,
    pub path: PathBuf,
    /// Sorted by name.
    pub entries: Vec<EntryInfo>,
}

impl PackageDir {
    /// Entries keyed by file name. Names that are not UTF-8 are left out.
    pub fn by_name(&self) -> HashMap<&str, &EntryInfo> {
        self.entries
            .iter()
            .filter_map(|e| Some((e.name()?, e)))
            .collect()
    }
}

/// A suite directory and the binary packages below it.
#[derive(Debug)]
pub struct SuiteDir {
    pub name: String,
    pub modified: SystemTime,
    /// Package directory names, sorted.
    pub packages: Vec<String>,
    /// Modification time of `contents-<suite>.html.gz`, if present.
    pub listing_modified: Option<SystemTime>,
}

/// Result of scanning the serving tree.
#[derive(Debug)]
pub struct Inventory {
    pub root: PathBuf,
    pub suites: Vec<SuiteDir>,
    pub packages: Vec<PackageDir>,
}

impl Inventory {
    /// Binary package names per suite, as shown on the suite listings.
    pub fn bins_by_suite(&self) -> BTreeMap<&str, &[String]> {
        self.suites
            .iter()
            .map(|s| (s.name.as_str(), s.packages.as_slice()))
            .collect()
    }
}

/// File name of the listing page for `suite`, placed in the serving root.
pub fn listing_name(suite: &str) -> String {
    format!("contents-{suite}.html.gz")
}

/// Scan every recognized suite under `root`.
///
/// Suites that have no directory are logged and skipped; everything else
/// that cannot be listed aborts the scan.
pub fn scan(root: &Path, suites: &BTreeSet<String>) -> Result<Inventory, ScanError> {
    let top = list_dir(root)?;
    let top_by_name: HashMap<&str, &EntryInfo> = top
        .iter()
        .filter_map(|e| Some((e.name()?, e)))
        .collect();

    let mut suite_dirs = Vec::new();
    let mut packages = Vec::new();

    for suite in suites {
        let Some(entry) = top_by_name
            .get(suite.as_str())
            .filter(|e| e.kind == EntryKind::Dir)
        else {
            tracing::warn!(suite = %suite, root = %root.display(), "suite directory missing");
            continue;
        };
        let suite_path = root.join(suite);
        let mut names = Vec::new();
        for bin in list_dir(&suite_path)? {
            if bin.kind != EntryKind::Dir {
                continue;
            }
            let path = suite_path.join(&bin.file_name);
            let Some(name) = bin.name() else {
                tracing::warn!(
                    path = %path.display(),
                    "skipping package directory with non UTF-8 name"
                );
                continue;
            };
            let entries = list_dir(&path)?;
            packages.push(PackageDir {
                suite: suite.clone(),
                package: name.to_string(),
                path,
                entries,
            });
            names.push(name.to_string());
        }
        suite_dirs.push(SuiteDir {
            name: suite.clone(),
            modified: entry.modified,
            packages: names,
            listing_modified: top_by_name
                .get(listing_name(suite).as_str())
                .map(|e| e.modified),
        });
    }

    tracing::info!(
        suites = suite_dirs.len(),
        directories = packages.len(),
        "serving tree scanned"
    );
    Ok(Inventory {
        root: root.to_path_buf(),
        suites: suite_dirs,
        packages,
    })
}

/// List a directory once, sorted by name, without following symlinks.
pub fn list_dir(path: &Path) -> Result<Vec<EntryInfo>, ScanError> {
    let read_err = |source: std::io::Error| ScanError::ReadDir {
        path: path.to_path_buf(),
        source,
    };
    let mut entries = Vec::new();
    for entry in fs::read_dir(path).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let stat_err = |source: std::io::Error| ScanError::Metadata {
            path: entry.path(),
            source,
        };
        // DirEntry::metadata does not traverse symlinks.
        let metadata = entry.metadata().map_err(stat_err)?;
        let file_type = metadata.file_type();
        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        entries.push(EntryInfo {
            file_name: entry.file_name(),
            kind,
            modified: metadata.modified().map_err(stat_err)?,
        });
    }
    entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(entries)
}
