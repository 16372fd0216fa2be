//! CLI output formatting for render and check runs.
//!
//! Diagnostics (per-page progress, warnings) are logged through `tracing`
//! to stderr. What ends up on stdout is the human-facing result of a
//! command, formatted here.
//!
//! # Output Format
//!
//! ## Render
//!
//! ```text
//! Only rendering: coreutils, grep
//! Rendered 3 pages, 1 index, 1 listing in 12 directories
//! ```
//!
//! ## Check
//!
//! ```text
//! bookworm (412 directories)
//!     Pages: 3 stale
//!     Indexes: 1 stale
//!     Listing: stale
//! trixie (398 directories)
//!     Up to date
//!
//! 3 stale pages, 1 stale index
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::pipeline::{CheckReport, RenderOptions, RunStats, SuitePlan};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 page`, `3 pages`.
fn count(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Render output
// ============================================================================

/// Lines describing the run's restrictions, if any.
pub fn format_run_header(options: &RenderOptions) -> Vec<String> {
    match &options.only_render {
        Some(only) => {
            let names: Vec<&str> = only.iter().map(String::as_str).collect();
            vec![format!("Only rendering: {}", names.join(", "))]
        }
        None => Vec::new(),
    }
}

/// One-line summary of a completed render pass.
pub fn format_run_summary(stats: &RunStats) -> Vec<String> {
    let mut lines = Vec::new();
    if stats.is_noop() {
        lines.push(format!(
            "Everything up to date in {}",
            count(stats.directories, "directory", "directories")
        ));
    } else {
        lines.push(format!(
            "Rendered {}, {}, {} in {}",
            count(stats.rendered, "page", "pages"),
            count(stats.indexes, "index", "indexes"),
            count(stats.listings, "listing", "listings"),
            count(stats.directories, "directory", "directories"),
        ));
    }
    if stats.skipped > 0 {
        lines.push(format!(
            "{}Skipped {} with unparseable names (see log)",
            indent(1),
            count(stats.skipped, "entry", "entries")
        ));
    }
    lines
}

pub fn print_run_summary(options: &RenderOptions, stats: &RunStats) {
    for line in format_run_header(options)
        .into_iter()
        .chain(format_run_summary(stats))
    {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

fn format_suite_plan(plan: &SuitePlan) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({})",
        plan.suite,
        count(plan.directories, "directory", "directories")
    )];
    if plan.is_up_to_date() {
        lines.push(format!("{}Up to date", indent(1)));
    } else {
        if plan.stale_documents > 0 {
            lines.push(format!("{}Pages: {} stale", indent(1), plan.stale_documents));
        }
        if plan.stale_indexes > 0 {
            lines.push(format!("{}Indexes: {} stale", indent(1), plan.stale_indexes));
        }
        if plan.listing_stale {
            lines.push(format!("{}Listing: stale", indent(1)));
        }
    }
    if plan.skipped > 0 {
        lines.push(format!("{}Skipped: {}", indent(1), plan.skipped));
    }
    lines
}

/// Per-suite breakdown of a dry run followed by a total line.
pub fn format_check_output(report: &CheckReport) -> Vec<String> {
    let mut lines: Vec<String> = report.suites.iter().flat_map(format_suite_plan).collect();
    if !lines.is_empty() {
        lines.push(String::new());
    }
    if report.is_up_to_date() {
        lines.push("Everything up to date".to_string());
    } else {
        lines.push(format!(
            "{}, {}",
            count(report.stale_documents(), "stale page", "stale pages"),
            count(report.stale_indexes(), "stale index", "stale indexes"),
        ));
    }
    lines
}

pub fn print_check_output(report: &CheckReport) {
    for line in format_check_output(report) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(suite: &str, directories: usize) -> SuitePlan {
        SuitePlan {
            suite: suite.into(),
            directories,
            ..Default::default()
        }
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn count_pluralizes() {
        assert_eq!(count(1, "index", "indexes"), "1 index");
        assert_eq!(count(0, "index", "indexes"), "0 indexes");
    }

    // =========================================================================
    // Render summary
    // =========================================================================

    #[test]
    fn run_summary_with_work() {
        let stats = RunStats {
            directories: 12,
            rendered: 3,
            skipped: 0,
            indexes: 1,
            listings: 1,
        };
        assert_eq!(
            format_run_summary(&stats),
            vec!["Rendered 3 pages, 1 index, 1 listing in 12 directories"]
        );
    }

    #[test]
    fn run_summary_noop() {
        let stats = RunStats {
            directories: 1,
            ..Default::default()
        };
        assert_eq!(
            format_run_summary(&stats),
            vec!["Everything up to date in 1 directory"]
        );
    }

    #[test]
    fn run_summary_mentions_skipped() {
        let stats = RunStats {
            directories: 2,
            rendered: 1,
            skipped: 2,
            indexes: 1,
            listings: 0,
        };
        let lines = format_run_summary(&stats);
        assert_eq!(lines[1], "    Skipped 2 entries with unparseable names (see log)");
    }

    #[test]
    fn run_header_lists_whitelist() {
        let options = RenderOptions::new(1).with_only_render(&["grep".into(), "coreutils".into()]);
        assert_eq!(format_run_header(&options), vec!["Only rendering: coreutils, grep"]);
        assert!(format_run_header(&RenderOptions::new(1)).is_empty());
    }

    // =========================================================================
    // Check report
    // =========================================================================

    #[test]
    fn check_output_per_suite() {
        let report = CheckReport {
            suites: vec![
                SuitePlan {
                    stale_documents: 3,
                    stale_indexes: 1,
                    listing_stale: true,
                    ..plan("bookworm", 412)
                },
                plan("trixie", 398),
            ],
        };
        assert_eq!(
            format_check_output(&report),
            vec![
                "bookworm (412 directories)",
                "    Pages: 3 stale",
                "    Indexes: 1 stale",
                "    Listing: stale",
                "trixie (398 directories)",
                "    Up to date",
                "",
                "3 stale pages, 1 stale index",
            ]
        );
    }

    #[test]
    fn check_output_up_to_date() {
        let report = CheckReport {
            suites: vec![plan("bookworm", 1)],
        };
        let lines = format_check_output(&report);
        assert_eq!(lines.last().unwrap(), "Everything up to date");
        assert_eq!(lines[0], "bookworm (1 directory)");
    }

    #[test]
    fn check_output_empty_report() {
        assert_eq!(
            format_check_output(&CheckReport::default()),
            vec!["Everything up to date"]
        );
    }
}
