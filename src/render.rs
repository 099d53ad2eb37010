//! Presentation of a [`ResultSet`] as a markdown table or JSON.

use std::fmt::Write as _;

use midstac_search::{ResultRecord, ResultSet, Source};

use crate::error::{MidstacError, Result};

/// Longest description shown in a table cell, in characters.
const TABLE_DESCRIPTION_CHARS: usize = 160;

/// Render as a markdown table with columns `Source | ID | Title | Description`,
/// one section of rows per source, followed by a summary of failed backends.
pub fn to_markdown(set: &ResultSet) -> String {
    let mut out = String::new();
    if set.is_empty() {
        out.push_str("No results found.\n");
    } else {
        out.push_str("| Source | ID | Title | Description |\n");
        out.push_str("|--------|----|-------|-------------|\n");
        for source in Source::all() {
            for record in set.records_for(*source) {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} |",
                    record.source,
                    id_cell(record),
                    cell(&record.title, usize::MAX),
                    cell(&record.description, TABLE_DESCRIPTION_CHARS),
                );
            }
        }
    }

    let failures: Vec<_> = set.failures().collect();
    if !failures.is_empty() {
        out.push_str("\n**Unavailable sources:**\n");
        for report in failures {
            let _ = writeln!(out, "- {} ({}): {}", report.backend, report.source, report.status);
        }
    }

    let partial: Vec<_> = set.partial_failures().collect();
    if !partial.is_empty() {
        out.push_str("\n**Incomplete sources:**\n");
        for report in partial {
            let _ = writeln!(
                out,
                "- {} ({}): {} interval queries failed",
                report.backend, report.source, report.failed_queries
            );
        }
    }
    out
}

/// Render as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`MidstacError::Serialize`] if serialization fails.
pub fn to_json(set: &ResultSet) -> Result<String> {
    serde_json::to_string_pretty(set).map_err(|e| MidstacError::Serialize(e.to_string()))
}

fn id_cell(record: &ResultRecord) -> String {
    let id = cell(&record.id, usize::MAX);
    if record.link.is_empty() {
        id
    } else {
        format!("[{id}]({})", record.link.replace(' ', "%20").replace(')', "%29"))
    }
}

/// Collapse whitespace, escape pipes and cut to `max` characters.
fn cell(text: &str, max: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let escaped = collapsed.replace('|', "\\|");
    if escaped.chars().count() <= max {
        escaped
    } else {
        let mut cut: String = escaped.chars().take(max).collect();
        cut.push('…');
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midstac_search::{BackendReport, BackendStatus};

    fn record(source: Source, id: &str, link: &str) -> ResultRecord {
        ResultRecord {
            source,
            id: id.into(),
            title: format!("Title of {id}"),
            description: "line one\nline | two".into(),
            link: link.into(),
            links: vec![],
        }
    }

    #[test]
    fn cell_escapes_and_collapses() {
        assert_eq!(cell("a  |\n b", usize::MAX), "a \\| b");
        assert_eq!(cell("abcdef", 3), "abc…");
    }

    #[test]
    fn id_is_linked_when_link_present() {
        let linked = record(Source::Cmr, "C1", "https://doi.org/10.5067/X");
        assert_eq!(id_cell(&linked), "[C1](https://doi.org/10.5067/X)");
        let bare = record(Source::Stac, "s1", "");
        assert_eq!(id_cell(&bare), "s1");
    }

    #[test]
    fn empty_set_says_so() {
        assert_eq!(to_markdown(&ResultSet::default()), "No results found.\n");
    }

    #[test]
    fn failure_summary_lists_failed_backends() {
        let set = ResultSet {
            records: vec![record(Source::Stac, "s1", "")],
            reports: vec![
                BackendReport {
                    backend: "cmr".into(),
                    source: Source::Cmr,
                    status: BackendStatus::TimedOut,
                    records: 0,
                    skipped: 0,
                    failed_queries: 0,
                },
                BackendReport {
                    backend: "stac:maap".into(),
                    source: Source::Stac,
                    status: BackendStatus::Ok,
                    records: 1,
                    skipped: 0,
                    failed_queries: 0,
                },
            ],
            bbox: None,
        };
        let md = to_markdown(&set);
        assert!(md.contains("| STAC | s1 | Title of s1 | line one line \\| two |"));
        assert!(md.contains("- cmr (CMR): timed out"));
        assert!(!md.contains("stac:maap"));
    }

    #[test]
    fn incomplete_sources_listed_separately() {
        let set = ResultSet {
            records: vec![record(Source::Cmr, "C1", "")],
            reports: vec![BackendReport {
                backend: "cmr".into(),
                source: Source::Cmr,
                status: BackendStatus::Ok,
                records: 1,
                skipped: 0,
                failed_queries: 1,
            }],
            bbox: None,
        };
        let md = to_markdown(&set);
        assert!(!md.contains("Unavailable sources"));
        assert!(md.contains("**Incomplete sources:**\n- cmr (CMR): 1 interval queries failed"));
    }
}
