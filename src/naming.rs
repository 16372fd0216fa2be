//! Serving-path convention for source manual pages.
//!
//! Every source page lives at
//!
//! ```text
//! <root>/<suite>/<binary package>/<name>.<section>[.<language>].gz
//! ```
//!
//! and renders to a sibling `<name>.<section>[.<language>].html.gz`. This
//! module is the only place that knows how to take such a path apart.
//!
//! ## File Names
//!
//! - `ls.1.gz` → name="ls", section="1", language="en"
//! - `ls.1.fr.gz` → name="ls", section="1", language="fr"
//! - `git-log.1.pt_BR.gz` → name="git-log", section="1", language="pt_BR"
//! - `python3.12.1.gz` → name="python3.12", section="1", language="en"
//! - `Xorg.conf.5x.de.gz` → name="Xorg.conf", section="5x", language="de"

use crate::meta::DocumentMeta;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Suffix of a compressed source page.
pub const SOURCE_SUFFIX: &str = ".gz";
/// Suffix of a compressed rendered page.
pub const RENDERED_SUFFIX: &str = ".html.gz";
/// Name of the per-package index page.
pub const INDEX_NAME: &str = "index.html.gz";
/// Language assumed when a file name carries none.
pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("{0} is not below the serving directory")]
    OutsideRoot(PathBuf),
    #[error("{0} is not at <suite>/<package>/<page>")]
    Layout(PathBuf),
    #[error("cannot parse page name from {0}")]
    FileName(PathBuf),
}

/// Components of a page file name, without suite or package.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFileName {
    pub name: String,
    pub section: String,
    pub language: String,
}

/// Whether `file_name` names a compressed source page (not a rendered one).
pub fn is_source_name(file_name: &str) -> bool {
    file_name.ends_with(SOURCE_SUFFIX) && !file_name.ends_with(RENDERED_SUFFIX)
}

/// Name of the rendered counterpart: swap `.gz` for `.html.gz`.
///
/// ```text
/// ls.1.gz     → ls.1.html.gz
/// ls.1.fr.gz  → ls.1.fr.html.gz
/// ```
pub fn rendered_name(source_name: &str) -> String {
    let stem = source_name
        .strip_suffix(SOURCE_SUFFIX)
        .unwrap_or(source_name);
    format!("{stem}{RENDERED_SUFFIX}")
}

/// Parse `<name>.<section>[.<language>]` (the `.gz` already stripped).
pub fn parse_stem(stem: &str) -> Option<ParsedFileName> {
    let (rest, last) = stem.rsplit_once('.')?;
    if is_section(last) {
        return non_empty(rest).map(|name| ParsedFileName {
            name: name.to_string(),
            section: last.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        });
    }
    if !is_language(last) {
        return None;
    }
    let (name, section) = rest.rsplit_once('.')?;
    if !is_section(section) {
        return None;
    }
    non_empty(name).map(|name| ParsedFileName {
        name: name.to_string(),
        section: section.to_string(),
        language: last.to_string(),
    })
}

/// Sections start with a digit and may carry a suffix: `1`, `3pm`, `5x`.
pub(crate) fn is_section(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Locale-style language tags: `de`, `pt_BR`, `sr@latin`.
fn is_language(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '@')
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() { None } else { Some(s) }
}

/// Parse a full source path below `root` into page metadata.
///
/// The version is left unset; it comes from package metadata, not the path.
pub fn from_serving_path(root: &Path, full: &Path) -> Result<DocumentMeta, ParseError> {
    let rel = full
        .strip_prefix(root)
        .map_err(|_| ParseError::OutsideRoot(full.to_path_buf()))?;
    let parts: Vec<&str> = rel
        .components()
        .map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect::<Option<_>>()
        .ok_or_else(|| ParseError::Layout(full.to_path_buf()))?;
    let [suite, package, file_name] = parts.as_slice() else {
        return Err(ParseError::Layout(full.to_path_buf()));
    };
    let stem = file_name
        .strip_suffix(SOURCE_SUFFIX)
        .filter(|_| is_source_name(file_name))
        .ok_or_else(|| ParseError::FileName(full.to_path_buf()))?;
    let parsed = parse_stem(stem).ok_or_else(|| ParseError::FileName(full.to_path_buf()))?;

    Ok(DocumentMeta {
        name: parsed.name,
        section: parsed.section,
        language: parsed.language,
        suite: suite.to_string(),
        package: package.to_string(),
        version: None,
        stem: stem.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // File name parsing
    // =========================================================================

    #[test]
    fn name_and_section_default_language() {
        let p = parse_stem("ls.1").unwrap();
        assert_eq!(p.name, "ls");
        assert_eq!(p.section, "1");
        assert_eq!(p.language, "en");
    }

    #[test]
    fn explicit_language() {
        let p = parse_stem("ls.1.fr").unwrap();
        assert_eq!(p.name, "ls");
        assert_eq!(p.section, "1");
        assert_eq!(p.language, "fr");
    }

    #[test]
    fn locale_with_territory_and_modifier() {
        assert_eq!(parse_stem("git-log.1.pt_BR").unwrap().language, "pt_BR");
        assert_eq!(parse_stem("ls.1.sr@latin").unwrap().language, "sr@latin");
    }

    #[test]
    fn dotted_names_keep_their_dots() {
        let p = parse_stem("python3.12.1").unwrap();
        assert_eq!(p.name, "python3.12");
        assert_eq!(p.section, "1");

        let p = parse_stem("Xorg.conf.5x.de").unwrap();
        assert_eq!(p.name, "Xorg.conf");
        assert_eq!(p.section, "5x");
        assert_eq!(p.language, "de");
    }

    #[test]
    fn section_with_suffix() {
        let p = parse_stem("Dpkg::Version.3pm").unwrap();
        assert_eq!(p.name, "Dpkg::Version");
        assert_eq!(p.section, "3pm");
    }

    #[test]
    fn rejects_missing_section() {
        assert_eq!(parse_stem("README"), None);
        assert_eq!(parse_stem("notes.txt"), None);
        assert_eq!(parse_stem("ls.fr"), None);
    }

    #[test]
    fn rejects_empty_name() {
        assert_eq!(parse_stem(".1"), None);
        assert_eq!(parse_stem(".1.fr"), None);
    }

    // =========================================================================
    // Suffix helpers
    // =========================================================================

    #[test]
    fn source_names() {
        assert!(is_source_name("ls.1.gz"));
        assert!(!is_source_name("ls.1.html.gz"));
        assert!(!is_source_name("index.html.gz"));
        assert!(!is_source_name("ls.1"));
    }

    #[test]
    fn rendered_name_swaps_suffix() {
        assert_eq!(rendered_name("ls.1.gz"), "ls.1.html.gz");
        assert_eq!(rendered_name("ls.1.fr.gz"), "ls.1.fr.html.gz");
    }

    // =========================================================================
    // Serving paths
    // =========================================================================

    #[test]
    fn parses_full_serving_path() {
        let root = Path::new("/srv/man");
        let m = from_serving_path(root, Path::new("/srv/man/bookworm/coreutils/ls.1.de.gz"))
            .unwrap();
        assert_eq!(m.suite, "bookworm");
        assert_eq!(m.package, "coreutils");
        assert_eq!(m.name, "ls");
        assert_eq!(m.section, "1");
        assert_eq!(m.language, "de");
        assert_eq!(m.version, None);
        assert_eq!(m.serving_path(), "bookworm/coreutils/ls.1.de");
    }

    #[test]
    fn path_outside_root() {
        let err = from_serving_path(Path::new("/srv/man"), Path::new("/tmp/a/b/ls.1.gz"));
        assert!(matches!(err, Err(ParseError::OutsideRoot(_))));
    }

    #[test]
    fn path_too_shallow_or_deep() {
        let root = Path::new("/srv/man");
        assert!(matches!(
            from_serving_path(root, Path::new("/srv/man/bookworm/ls.1.gz")),
            Err(ParseError::Layout(_))
        ));
        assert!(matches!(
            from_serving_path(root, Path::new("/srv/man/bookworm/a/b/ls.1.gz")),
            Err(ParseError::Layout(_))
        ));
    }

    #[test]
    fn rendered_page_is_not_a_source() {
        let root = Path::new("/srv/man");
        assert!(matches!(
            from_serving_path(root, Path::new("/srv/man/bookworm/coreutils/ls.1.html.gz")),
            Err(ParseError::FileName(_))
        ));
    }
}
