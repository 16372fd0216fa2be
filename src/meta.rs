//! Page identities and the cross-reference index.
//!
//! A [`DocumentMeta`] describes one page variant: a name and section in one
//! language, shipped by one binary package in one suite. The same logical
//! page (say `ls(1)`) usually exists in many variants across suites and
//! translations; the [`CrossReferenceIndex`] groups them by name.
//!
//! The index is built once per run, before any rendering starts, and is only
//! read afterwards, so workers share it by plain reference. Every variant is
//! held in an [`Arc`]: pages scanned from a package directory are replaced
//! by the index's instance ([`CrossReferenceIndex::resolve`]), which lets the
//! renderer tell "this is the page being rendered" apart from its siblings
//! with [`Arc::ptr_eq`] instead of comparing every field.

use crate::naming;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("cannot list serving directory {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot walk serving tree: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("cannot read package versions: {0}")]
    Versions(#[from] serde_json::Error),
}

/// One page variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DocumentMeta {
    pub name: String,
    pub section: String,
    pub language: String,
    pub suite: String,
    pub package: String,
    /// Version of the binary package, when package metadata provides it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// File name on disk without the `.gz` suffix.
    pub stem: String,
}

impl DocumentMeta {
    /// `<suite>/<package>/<stem>`, unique per page variant.
    pub fn serving_path(&self) -> String {
        format!("{}/{}/{}", self.suite, self.package, self.stem)
    }

    /// Absolute URL of the rendered page.
    pub fn href(&self) -> String {
        format!("/{}.html", self.serving_path())
    }

    /// `ls(1)`
    pub fn title(&self) -> String {
        format!("{}({})", self.name, self.section)
    }

    /// Field-wise identity, for callers holding copies rather than the
    /// index's shared instances.
    pub fn same_document(&self, other: &DocumentMeta) -> bool {
        self.name == other.name
            && self.section == other.section
            && self.language == other.language
            && self.suite == other.suite
            && self.package == other.package
            && self.version == other.version
    }
}

/// Package versions keyed by `"suite/package"`.
pub type PackageVersions = HashMap<String, String>;

/// Load a JSON object of `"suite/package": "version"` pairs.
pub fn load_package_versions(path: &Path) -> Result<PackageVersions, IndexError> {
    let content = fs::read_to_string(path).map_err(|source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Every known variant of every page, grouped by page name.
#[derive(Debug, Default)]
pub struct CrossReferenceIndex {
    by_name: HashMap<String, Vec<Arc<DocumentMeta>>>,
}

impl CrossReferenceIndex {
    /// Build the index from a set of page variants.
    ///
    /// Variants are ordered by suite, language, section and package.
    /// Duplicate serving paths keep the first occurrence.
    pub fn from_metas(metas: impl IntoIterator<Item = DocumentMeta>) -> Self {
        let mut by_name: HashMap<String, Vec<Arc<DocumentMeta>>> = HashMap::new();
        for meta in metas {
            by_name
                .entry(meta.name.clone())
                .or_default()
                .push(Arc::new(meta));
        }
        for variants in by_name.values_mut() {
            variants.sort_by(|a, b| {
                (&a.suite, &a.language, &a.section, &a.package)
                    .cmp(&(&b.suite, &b.language, &b.section, &b.package))
            });
            let mut seen = BTreeSet::new();
            variants.retain(|v| seen.insert(v.serving_path()));
        }
        Self { by_name }
    }

    /// Walk `<root>/<suite>/<package>/` for every suite and index all
    /// source pages found there. Symbolic links are aliases of a page that
    /// is indexed under its real name, so they are skipped.
    ///
    /// A suite with no directory under `root` is logged and skipped, the
    /// same way [`inventory::scan`](crate::inventory::scan) treats it. Any
    /// other error reading the tree is fatal.
    pub fn discover(
        root: &Path,
        suites: &BTreeSet<String>,
        versions: &PackageVersions,
    ) -> Result<Self, IndexError> {
        let mut metas = Vec::new();
        for suite in suites {
            let suite_path = root.join(suite);
            let is_dir = match fs::symlink_metadata(&suite_path) {
                Ok(m) => m.is_dir(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
                Err(source) => {
                    return Err(IndexError::Io {
                        path: suite_path,
                        source,
                    });
                }
            };
            if !is_dir {
                tracing::warn!(suite = %suite, root = %root.display(), "suite directory missing");
                continue;
            }
            let walker = WalkDir::new(&suite_path)
                .min_depth(2)
                .max_depth(2)
                .sort_by_file_name();
            for entry in walker {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Some(file_name) = entry.file_name().to_str() else {
                    continue;
                };
                if !naming::is_source_name(file_name) {
                    continue;
                }
                match naming::from_serving_path(root, entry.path()) {
                    Ok(mut meta) => {
                        meta.version = versions
                            .get(&format!("{}/{}", meta.suite, meta.package))
                            .cloned();
                        metas.push(meta);
                    }
                    Err(e) => tracing::debug!(error = %e, "not indexing"),
                }
            }
        }
        Ok(Self::from_metas(metas))
    }

    /// All variants sharing `name`, or an empty slice.
    pub fn variants(&self, name: &str) -> &[Arc<DocumentMeta>] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace a freshly parsed page by the index's shared instance with the
    /// same serving path. Pages the index does not know keep their own,
    /// unshared allocation.
    pub fn resolve(&self, parsed: DocumentMeta) -> Arc<DocumentMeta> {
        let serving_path = parsed.serving_path();
        self.variants(&parsed.name)
            .iter()
            .find(|v| v.serving_path() == serving_path)
            .cloned()
            .unwrap_or_else(|| Arc::new(parsed))
    }

    /// Pick the variant a `name(section)` reference on a page in `suite`
    /// and `language` should link to.
    ///
    /// Preference: same suite and language, then same suite, then anything.
    /// `section` matches exactly or as a prefix (`3` finds `3pm`).
    pub fn best_match(
        &self,
        name: &str,
        section: &str,
        suite: &str,
        language: &str,
    ) -> Option<&Arc<DocumentMeta>> {
        let candidates: Vec<&Arc<DocumentMeta>> = self
            .variants(name)
            .iter()
            .filter(|v| v.section == section || v.section.starts_with(section))
            .collect();
        candidates
            .iter()
            .find(|v| v.suite == suite && v.language == language)
            .or_else(|| candidates.iter().find(|v| v.suite == suite))
            .or_else(|| candidates.first())
            .copied()
    }

    /// Number of distinct page names.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Number of page variants across all names.
    pub fn variant_count(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }
}

/// Everything known about the corpus before rendering starts.
#[derive(Debug, Default)]
pub struct GlobalView {
    pub suites: BTreeSet<String>,
    pub xref: CrossReferenceIndex,
}

impl GlobalView {
    /// Build the view for `root`. An empty `suites` list selects every
    /// directory directly under `root`.
    pub fn discover(
        root: &Path,
        suites: &[String],
        versions: &PackageVersions,
    ) -> Result<Self, IndexError> {
        // Listing the root up front also makes a missing root fatal when
        // suites are configured explicitly.
        let on_disk = list_suite_dirs(root)?;
        let suites: BTreeSet<String> = if suites.is_empty() {
            on_disk
        } else {
            suites.iter().cloned().collect()
        };
        let xref = CrossReferenceIndex::discover(root, &suites, versions)?;
        tracing::info!(
            suites = suites.len(),
            names = xref.len(),
            variants = xref.variant_count(),
            "cross-reference index built"
        );
        Ok(Self { suites, xref })
    }
}

fn list_suite_dirs(root: &Path) -> Result<BTreeSet<String>, IndexError> {
    let io_err = |source: std::io::Error| IndexError::Io {
        path: root.to_path_buf(),
        source,
    };
    let mut suites = BTreeSet::new();
    for entry in fs::read_dir(root).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if !entry.file_type().map_err(io_err)?.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => {
                suites.insert(name);
            }
            Err(raw) => {
                tracing::warn!(name = ?raw, "skipping suite directory with non UTF-8 name");
            }
        }
    }
    Ok(suites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{doc, write_source};
    use tempfile::TempDir;

    // =========================================================================
    // DocumentMeta
    // =========================================================================

    #[test]
    fn serving_path_and_href() {
        let m = doc("bookworm", "coreutils", "ls", "1", "fr");
        assert_eq!(m.serving_path(), "bookworm/coreutils/ls.1.fr");
        assert_eq!(m.href(), "/bookworm/coreutils/ls.1.fr.html");
        assert_eq!(m.title(), "ls(1)");
    }

    #[test]
    fn same_document_ignores_allocation() {
        let a = doc("bookworm", "coreutils", "ls", "1", "en");
        let b = a.clone();
        assert!(a.same_document(&b));
        let c = DocumentMeta {
            version: Some("9.1-1".into()),
            ..a.clone()
        };
        assert!(!a.same_document(&c));
    }

    // =========================================================================
    // CrossReferenceIndex
    // =========================================================================

    fn sample_index() -> CrossReferenceIndex {
        CrossReferenceIndex::from_metas([
            doc("trixie", "coreutils", "ls", "1", "en"),
            doc("bookworm", "coreutils", "ls", "1", "fr"),
            doc("bookworm", "coreutils", "ls", "1", "en"),
            doc("bookworm", "manpages-dev", "open", "2", "en"),
            doc("bookworm", "libfoo-perl", "Foo", "3pm", "en"),
        ])
    }

    #[test]
    fn variants_grouped_and_ordered() {
        let index = sample_index();
        let paths: Vec<String> = index
            .variants("ls")
            .iter()
            .map(|v| v.serving_path())
            .collect();
        assert_eq!(
            paths,
            vec![
                "bookworm/coreutils/ls.1",
                "bookworm/coreutils/ls.1.fr",
                "trixie/coreutils/ls.1",
            ]
        );
        assert_eq!(index.len(), 3);
        assert_eq!(index.variant_count(), 5);
    }

    #[test]
    fn unknown_name_has_no_variants() {
        assert!(sample_index().variants("nope").is_empty());
    }

    #[test]
    fn duplicate_serving_paths_collapse() {
        let index = CrossReferenceIndex::from_metas([
            doc("bookworm", "coreutils", "ls", "1", "en"),
            doc("bookworm", "coreutils", "ls", "1", "en"),
        ]);
        assert_eq!(index.variants("ls").len(), 1);
    }

    #[test]
    fn resolve_returns_shared_instance() {
        let index = sample_index();
        let resolved = index.resolve(doc("bookworm", "coreutils", "ls", "1", "fr"));
        assert!(
            index
                .variants("ls")
                .iter()
                .any(|v| Arc::ptr_eq(v, &resolved))
        );
    }

    #[test]
    fn resolve_unknown_keeps_parsed() {
        let index = sample_index();
        let parsed = doc("sid", "coreutils", "ls", "1", "en");
        let resolved = index.resolve(parsed.clone());
        assert_eq!(*resolved, parsed);
        assert!(!index.variants("ls").iter().any(|v| Arc::ptr_eq(v, &resolved)));
    }

    #[test]
    fn best_match_prefers_suite_and_language() {
        let index = sample_index();
        let m = index.best_match("ls", "1", "bookworm", "fr").unwrap();
        assert_eq!(m.serving_path(), "bookworm/coreutils/ls.1.fr");

        let m = index.best_match("ls", "1", "trixie", "fr").unwrap();
        assert_eq!(m.serving_path(), "trixie/coreutils/ls.1");

        let m = index.best_match("ls", "1", "sid", "de").unwrap();
        assert_eq!(m.suite, "bookworm");
    }

    #[test]
    fn best_match_section_prefix() {
        let index = sample_index();
        assert!(index.best_match("Foo", "3", "bookworm", "en").is_some());
        assert!(index.best_match("open", "3", "bookworm", "en").is_none());
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    #[test]
    fn discover_indexes_sources_only() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_source(root, "bookworm/coreutils/ls.1.gz", "ls");
        write_source(root, "bookworm/coreutils/ls.1.fr.gz", "ls fr");
        write_source(root, "bookworm/coreutils/ls.1.html.gz", "<html>");
        write_source(root, "bookworm/coreutils/README.gz", "junk");
        write_source(root, "trixie/coreutils/ls.1.gz", "ls");

        let suites = BTreeSet::from(["bookworm".to_string()]);
        let mut versions = PackageVersions::new();
        versions.insert("bookworm/coreutils".into(), "9.1-1".into());
        let index = CrossReferenceIndex::discover(root, &suites, &versions).unwrap();

        assert_eq!(index.variant_count(), 2);
        assert!(
            index
                .variants("ls")
                .iter()
                .all(|v| v.version.as_deref() == Some("9.1-1"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn discover_skips_symlinks() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_source(root, "bookworm/coreutils/ls.1.gz", "ls");
        std::os::unix::fs::symlink("ls.1.gz", root.join("bookworm/coreutils/dir.1.gz")).unwrap();

        let suites = BTreeSet::from(["bookworm".to_string()]);
        let index = CrossReferenceIndex::discover(root, &suites, &PackageVersions::new()).unwrap();

        assert!(index.variants("dir").is_empty());
        assert_eq!(index.variants("ls").len(), 1);
    }

    #[test]
    fn global_view_defaults_to_all_suite_dirs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_source(root, "bookworm/coreutils/ls.1.gz", "ls");
        write_source(root, "trixie/coreutils/ls.1.gz", "ls");
        fs::write(root.join("contents-bookworm.html.gz"), b"").unwrap();

        let view = GlobalView::discover(root, &[], &PackageVersions::new()).unwrap();
        assert_eq!(
            view.suites.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["bookworm", "trixie"]
        );
        assert_eq!(view.xref.variants("ls").len(), 2);
    }

    #[test]
    fn discover_skips_missing_suite() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_source(root, "bookworm/coreutils/ls.1.gz", "ls");
        fs::write(root.join("sid"), b"not a directory").unwrap();

        let suites = ["bookworm", "trixie", "sid"].map(String::from);
        let view = GlobalView::discover(root, &suites, &PackageVersions::new()).unwrap();

        assert_eq!(view.suites.len(), 3);
        assert_eq!(view.xref.variants("ls").len(), 1);
    }

    #[test]
    fn global_view_missing_root_is_error_with_explicit_suites() {
        let tmp = TempDir::new().unwrap();
        let suites = ["bookworm".to_string()];
        let result =
            GlobalView::discover(&tmp.path().join("missing"), &suites, &PackageVersions::new());
        assert!(matches!(result, Err(IndexError::Io { .. })));
    }

    #[test]
    fn global_view_missing_root_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = GlobalView::discover(&tmp.path().join("missing"), &[], &PackageVersions::new());
        assert!(matches!(result, Err(IndexError::Io { .. })));
    }

    #[test]
    fn load_versions_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("versions.json");
        fs::write(&path, r#"{"bookworm/coreutils": "9.1-1"}"#).unwrap();
        let versions = load_package_versions(&path).unwrap();
        assert_eq!(versions["bookworm/coreutils"], "9.1-1");
    }
}
