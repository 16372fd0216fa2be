//! HTML rendering of pages, package indexes and suite listings.
//!
//! The pipeline talks to renderers through the [`Renderer`] trait so it can
//! be driven by something other than HTML (the tests use a recording mock).
//! [`HtmlRenderer`] is the default implementation.
//!
//! ## Output Structure
//!
//! ```text
//! <root>/
//! ├── contents-bookworm.html.gz      # listing: every package of the suite
//! └── bookworm/coreutils/
//!     ├── index.html.gz              # index: every page of the package
//!     ├── ls.1.gz
//!     └── ls.1.html.gz               # page
//! ```
//!
//! ## Pages
//!
//! A page shows the source text with every `name(section)` reference that
//! the cross-reference index can resolve turned into a link (same suite and
//! language preferred), next to a navigation block listing all variants of
//! the page. The variant being rendered is highlighted by identity, not by
//! comparing fields.
//!
//! Sources that cannot be decompressed or are not UTF-8 are a content
//! problem, not an I/O problem: they render an error page in place of the
//! document and the run continues. Only failing to read the source or to
//! write the output is an error.
//!
//! All output goes through [`write_atomically`].

use crate::atomic::write_atomically;
use crate::meta::{CrossReferenceIndex, DocumentMeta};
use crate::naming::{self, DEFAULT_LANGUAGE};
use crate::staleness::RenderJob;
use flate2::read::GzDecoder;
use maud::{DOCTYPE, Markup, html};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Produces the three kinds of output files.
///
/// Implementations are shared by every worker, hence `Sync`. Each method
/// must either replace `dest` completely or leave it untouched.
pub trait Renderer: Sync {
    /// Render one page to `job.dest`.
    fn render(&self, job: &RenderJob<'_>) -> Result<(), RenderError>;

    /// Render a package index listing `documents` (keyed by source file name).
    fn render_index(
        &self,
        dest: &Path,
        documents: &BTreeMap<String, Arc<DocumentMeta>>,
    ) -> Result<(), RenderError>;

    /// Render the listing of every binary package in `suite`.
    fn render_listing(&self, dest: &Path, suite: &str, packages: &[String])
    -> Result<(), RenderError>;
}

const CSS: &str = include_str!("../static/style.css");

/// Renders everything as gzip-compressed HTML built with maud.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for HtmlRenderer {
    fn render(&self, job: &RenderJob<'_>) -> Result<(), RenderError> {
        let compressed = fs::read(&job.src).map_err(|source| RenderError::Read {
            path: job.src.clone(),
            source,
        })?;
        let body = match decode(&compressed) {
            Ok(text) => document_body(&text, &job.meta, job.xref),
            Err(e) => {
                tracing::warn!(
                    path = %job.src.display(),
                    error = %e,
                    "source cannot be decoded, writing error page"
                );
                error_body(&e)
            }
        };
        write_page(&job.dest, document_page(&job.meta, job.variants, body))
    }

    fn render_index(
        &self,
        dest: &Path,
        documents: &BTreeMap<String, Arc<DocumentMeta>>,
    ) -> Result<(), RenderError> {
        write_page(dest, index_page(dest, documents))
    }

    fn render_listing(
        &self,
        dest: &Path,
        suite: &str,
        packages: &[String],
    ) -> Result<(), RenderError> {
        write_page(dest, listing_page(suite, packages))
    }
}

fn decode(compressed: &[u8]) -> io::Result<String> {
    let mut text = String::new();
    GzDecoder::new(compressed).read_to_string(&mut text)?;
    Ok(text)
}

fn write_page(dest: &Path, markup: Markup) -> Result<(), RenderError> {
    write_atomically(dest, |w| w.write_all(markup.into_string().as_bytes())).map_err(
        |source: io::Error| RenderError::Write {
            path: dest.to_path_buf(),
            source,
        },
    )
}

// ============================================================================
// Cross-reference links
// ============================================================================

/// A run of page text: either plain or a resolved `name(section)` reference.
#[derive(Debug, PartialEq)]
pub(crate) enum Segment<'t> {
    Text(&'t str),
    Ref { text: &'t str, href: String },
}

/// Split `text` into plain runs and references that resolve in `xref`.
///
/// References are looked up from the point of view of `from`: the same
/// suite and language win when several variants match.
pub(crate) fn segments<'t>(
    text: &'t str,
    from: &DocumentMeta,
    xref: &CrossReferenceIndex,
) -> Vec<Segment<'t>> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut plain_start = 0;
    let mut pos = 0;

    while let Some(offset) = text[pos..].find('(') {
        let open = pos + offset;
        pos = open + 1;

        // Name characters are ASCII, so the byte after the last non-name
        // byte is always a char boundary.
        let name_start = bytes[plain_start..open]
            .iter()
            .rposition(|&b| !is_name_byte(b))
            .map_or(plain_start, |p| plain_start + p + 1);
        let name = &text[name_start..open];
        let Some(close) = text[pos..].find(')').map(|c| pos + c) else {
            break;
        };
        let section = &text[pos..close];
        if name.is_empty() || !naming::is_section(section) {
            continue;
        }
        let Some(target) = xref.best_match(name, section, &from.suite, &from.language) else {
            continue;
        };

        if name_start > plain_start {
            out.push(Segment::Text(&text[plain_start..name_start]));
        }
        out.push(Segment::Ref {
            text: &text[name_start..=close],
            href: target.href(),
        });
        plain_start = close + 1;
        pos = plain_start;
    }

    if plain_start < text.len() {
        out.push(Segment::Text(&text[plain_start..]));
    }
    out
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b':' | b'+')
}

// ============================================================================
// HTML Components
// ============================================================================

fn base_document(title: &str, breadcrumb: Markup, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (CSS) }
            }
            body {
                header.site-header {
                    nav.breadcrumb { (breadcrumb) }
                }
                (content)
                footer.site-footer {
                    "Rendered by manrender " (env!("CARGO_PKG_VERSION"))
                }
            }
        }
    }
}

fn package_label(meta: &DocumentMeta) -> String {
    match &meta.version {
        Some(v) => format!("{} {}", meta.package, v),
        None => meta.package.clone(),
    }
}

/// Navigation block listing every variant; `current` is highlighted.
fn variants_nav(current: &Arc<DocumentMeta>, variants: &[Arc<DocumentMeta>]) -> Markup {
    html! {
        nav.variants {
            h2 { "Variants" }
            ul {
                @for v in variants {
                    @let is_current = Arc::ptr_eq(v, current);
                    li class=[is_current.then_some("current")] {
                        a href=(v.href()) {
                            (v.suite) " · " (v.title()) " · " (v.language)
                        }
                        " (" (package_label(v)) ")"
                    }
                }
            }
        }
    }
}

fn document_body(text: &str, meta: &DocumentMeta, xref: &CrossReferenceIndex) -> Markup {
    html! {
        pre {
            @for segment in segments(text, meta, xref) {
                @match segment {
                    Segment::Text(t) => { (t) },
                    Segment::Ref { text, href } => { a href=(href) { (text) } },
                }
            }
        }
    }
}

fn error_body(error: &io::Error) -> Markup {
    html! {
        div.render-error {
            p { "This page could not be rendered." }
            pre { (error.to_string()) }
        }
    }
}

fn document_page(meta: &Arc<DocumentMeta>, variants: &[Arc<DocumentMeta>], body: Markup) -> Markup {
    let breadcrumb = html! {
        a href={ "/contents-" (meta.suite) ".html" } { (meta.suite) }
        " › "
        a href={ "/" (meta.suite) "/" (meta.package) "/index.html" } { (package_label(meta)) }
        " › "
        (meta.title())
    };
    let heading = if meta.language == DEFAULT_LANGUAGE {
        meta.title()
    } else {
        format!("{} [{}]", meta.title(), meta.language)
    };

    let content = html! {
        div.page {
            (variants_nav(meta, variants))
            main.document {
                h1 { (heading) }
                (body)
            }
        }
    };
    base_document(&heading, breadcrumb, content)
}

fn index_page(dest: &Path, documents: &BTreeMap<String, Arc<DocumentMeta>>) -> Markup {
    let (suite, package) = match documents.values().next() {
        Some(m) => (m.suite.clone(), package_label(m)),
        None => (String::new(), dir_name(dest)),
    };
    let title = format!("{suite}/{package}");

    let breadcrumb = html! {
        a href={ "/contents-" (suite) ".html" } { (suite) }
        " › "
        (package)
    };
    let content = html! {
        main.listing {
            h1 { (title) }
            ul {
                @for meta in documents.values() {
                    li {
                        a href=(meta.href()) { (meta.title()) }
                        @if meta.language != DEFAULT_LANGUAGE {
                            " [" (meta.language) "]"
                        }
                    }
                }
            }
        }
    };
    base_document(&title, breadcrumb, content)
}

fn dir_name(dest: &Path) -> String {
    dest.parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn listing_page(suite: &str, packages: &[String]) -> Markup {
    let title = format!("Contents of {suite}");
    let content = html! {
        main.listing {
            h1 { (title) }
            ul {
                @for package in packages {
                    li {
                        a href={ "/" (suite) "/" (package) "/index.html" } { (package) }
                    }
                }
            }
        }
    };
    base_document(&title, html! { (suite) }, content)
}
