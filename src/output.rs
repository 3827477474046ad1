//! CLI output formatting.
//!
//! Every command displays contacts the same way: a header line with the
//! contact id and display name, then indented detail lines. Versions are
//! listed by their 3-digit version number.
//!
//! # Output Format
//!
//! ## History
//!
//! ```text
//! w1 Alice (2 versions)
//! 001 2025-01-28 10:00:00 formal
//!     Greeting: 新年快乐
//!     Poem: 晴空万里映朝阳,岁岁平安人安康
//!     Idioms: 福满人间,万事胜意,喜乐安康
//!     Wishes: 愿你顺遂
//!     Template: 1
//!     Image: generate_img/w1.png
//! 002 2025-01-28 10:05:12 custom
//!     Prompt: 写给老同学
//!     ...
//! ```
//!
//! ## Compare
//!
//! ```text
//! w1 Alice: 001 → 002
//!     style: formal → custom
//!     wishes: 愿你顺遂 → 天天开心
//! ```
//!
//! ## Card batch
//!
//! ```text
//! [1] w1 rendering
//! [1] w1 → 001 generate_img/w1.png
//! [2] w2 failed: Template not found: template/template_9.html
//! Rendered 1, failed 1, cancelled 0
//! ```
//!
//! ## Check
//!
//! ```text
//! Ledgers
//! w1 Alice (2 versions)
//!     migrated from legacy format
//! Skipped
//!     version_history/w3.json: expected a JSON array or object
//! Loaded 1 ledger, 2 versions
//! ```
//!
//! ## Export
//!
//! ```text
//! w1 exported to export/Alice
//! w2 exported to export/Bob (no card image)
//! w3 failed: No versions recorded for w3
//! w4 cancelled
//! Exported 2, failed 1, cancelled 1
//! ```
//!
//! Each `format_*` function returns `Vec<String>` and has no side effects;
//! `print_*` wrappers write to stdout.

use crate::batch::{BatchEvent, BatchSummary};
use crate::compare::FieldChange;
use crate::export::ExportOutcome;
use crate::store::LoadReport;
use crate::types::Version;
use std::collections::BTreeMap;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a version number as 3-digit zero-padded.
fn format_index(pos: u32) -> String {
    format!("{:0>3}", pos)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Contact header: id and display name, with an optional version count.
///
/// ```text
/// w1 Alice (3 versions)
/// w1 Alice
/// ```
fn contact_header(id: &str, name: &str, count: Option<usize>) -> String {
    let label = if name.is_empty() {
        id.to_string()
    } else {
        format!("{id} {name}")
    };
    match count {
        Some(n) => format!("{label} ({})", plural(n, "version", "versions")),
        None => label,
    }
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Collapse line breaks so a multi-line field fits on one detail line.
fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// History
// ============================================================================

pub fn format_history(contact_id: &str, versions: &[Version]) -> Vec<String> {
    let Some(latest) = versions.last() else {
        return vec![format!("{contact_id}: no versions")];
    };
    let mut lines = vec![contact_header(
        contact_id,
        &latest.contact.display_name,
        Some(versions.len()),
    )];
    for v in versions {
        lines.push(format!(
            "{} {} {}",
            format_index(v.version_number),
            v.create_time,
            v.style
        ));
        if let Some(prompt) = &v.custom_prompt {
            lines.push(format!("{}Prompt: {}", indent(1), truncate(&one_line(prompt), 60)));
        }
        for (label, value) in [
            ("Greeting", &v.greeting),
            ("Poem", &v.poem),
            ("Idioms", &v.idioms),
            ("Wishes", &v.wishes),
        ] {
            if !value.is_empty() {
                lines.push(format!("{}{label}: {}", indent(1), truncate(&one_line(value), 60)));
            }
        }
        lines.push(format!("{}Template: {}", indent(1), v.template_number));
        if !v.image_path.is_empty() {
            lines.push(format!("{}Image: {}", indent(1), v.image_path));
        }
    }
    lines
}

pub fn print_history(contact_id: &str, versions: &[Version]) {
    for line in format_history(contact_id, versions) {
        println!("{}", line);
    }
}

// ============================================================================
// Compare
// ============================================================================

pub fn format_compare(a: &Version, b: &Version, changes: &[FieldChange]) -> Vec<String> {
    let mut lines = vec![format!(
        "{}: {} → {}",
        contact_header(&b.contact.id, &b.contact.display_name, None),
        format_index(a.version_number),
        format_index(b.version_number)
    )];
    if changes.is_empty() {
        lines.push(format!("{}no differences", indent(1)));
    }
    for change in changes {
        lines.push(format!(
            "{}{}: {} → {}",
            indent(1),
            change.field,
            truncate(&one_line(&change.before), 40),
            truncate(&one_line(&change.after), 40)
        ));
    }
    lines
}

pub fn print_compare(a: &Version, b: &Version, changes: &[FieldChange]) {
    for line in format_compare(a, b, changes) {
        println!("{}", line);
    }
}

// ============================================================================
// Card batch
// ============================================================================

/// Format a single progress event. Job positions are shown 1-based.
pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    let line = match event {
        BatchEvent::Started { index, contact_id } => {
            format!("[{}] {} rendering", index + 1, contact_id)
        }
        BatchEvent::Rendered {
            index,
            contact_id,
            version_number,
            image_path,
        } => format!(
            "[{}] {} → {} {}",
            index + 1,
            contact_id,
            format_index(*version_number),
            image_path
        ),
        BatchEvent::Failed {
            index,
            contact_id,
            error,
        } => format!("[{}] {} failed: {}", index + 1, contact_id, error),
        BatchEvent::Cancelled { index, contact_id } => {
            format!("[{}] {} cancelled", index + 1, contact_id)
        }
    };
    vec![line]
}

pub fn format_batch_summary(summary: &BatchSummary) -> Vec<String> {
    vec![format!(
        "Rendered {}, failed {}, cancelled {}",
        summary.rendered(),
        summary.failed(),
        summary.cancelled()
    )]
}

// ============================================================================
// Check
// ============================================================================

pub fn format_load_report(report: &LoadReport, ledgers: &BTreeMap<String, Vec<Version>>) -> Vec<String> {
    let mut lines = Vec::new();
    if !ledgers.is_empty() {
        lines.push("Ledgers".to_string());
    }
    for (id, versions) in ledgers {
        let name = versions
            .last()
            .map(|v| v.contact.display_name.as_str())
            .unwrap_or_default();
        lines.push(contact_header(id, name, Some(versions.len())));
        if report.migrated.iter().any(|m| m == id) {
            lines.push(format!("{}migrated from legacy format", indent(1)));
        }
    }
    if !report.skipped.is_empty() {
        lines.push("Skipped".to_string());
        for skipped in &report.skipped {
            lines.push(format!(
                "{}{}: {}",
                indent(1),
                skipped.path.display(),
                skipped.reason
            ));
        }
    }
    lines.push(format!(
        "Loaded {}, {}",
        plural(report.ledgers, "ledger", "ledgers"),
        plural(report.versions, "version", "versions")
    ));
    lines
}

pub fn print_load_report(report: &LoadReport, ledgers: &BTreeMap<String, Vec<Version>>) {
    for line in format_load_report(report, ledgers) {
        println!("{}", line);
    }
}

// ============================================================================
// Export
// ============================================================================

pub fn format_export(outcomes: &[ExportOutcome]) -> Vec<String> {
    let (mut exported, mut failed, mut cancelled) = (0, 0, 0);
    let mut lines: Vec<String> = outcomes
        .iter()
        .map(|outcome| match outcome {
            ExportOutcome::Exported(e) => {
                exported += 1;
                let note = if e.image_path.is_none() { " (no card image)" } else { "" };
                format!("{} exported to {}{}", e.contact_id, e.folder.display(), note)
            }
            ExportOutcome::Failed { contact_id, error } => {
                failed += 1;
                format!("{contact_id} failed: {error}")
            }
            ExportOutcome::Cancelled { contact_id } => {
                cancelled += 1;
                format!("{contact_id} cancelled")
            }
        })
        .collect();
    lines.push(format!(
        "Exported {exported}, failed {failed}, cancelled {cancelled}"
    ));
    lines
}

pub fn print_export(outcomes: &[ExportOutcome]) {
    for line in format_export(outcomes) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchOutcome;
    use crate::export::{ExportError, ExportedContact};
    use crate::store::SkippedLedger;
    use crate::test_helpers::sample_version;
    use crate::types::Style;
    use std::path::PathBuf;

    fn numbered(n: u32) -> Version {
        let mut v = sample_version("w1", "Alice");
        v.version_number = n;
        v.create_time = format!("2025-01-28 10:0{n}:00");
        v
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("新年快乐万事如意", 4), "新年快乐...");
        assert_eq!(truncate("短", 4), "短");
        assert_eq!(truncate("", 4), "");
    }

    #[test]
    fn one_line_collapses_breaks() {
        assert_eq!(one_line("愿你\n  顺遂\n"), "愿你 顺遂");
    }

    #[test]
    fn contact_header_without_name() {
        assert_eq!(contact_header("w1", "", Some(1)), "w1 (1 version)");
        assert_eq!(contact_header("w1", "Alice", None), "w1 Alice");
    }

    // =========================================================================
    // History
    // =========================================================================

    #[test]
    fn history_lists_each_version() {
        let lines = format_history("w1", &[numbered(1), numbered(2)]);
        assert_eq!(lines[0], "w1 Alice (2 versions)");
        assert_eq!(lines[1], "001 2025-01-28 10:01:00 formal");
        assert_eq!(lines[2], "    Greeting: 新年快乐");
        assert!(lines.contains(&"    Template: 1".to_string()));
        assert!(lines.contains(&"    Image: generate_img/w1.png".to_string()));
        assert!(lines.contains(&"002 2025-01-28 10:02:00 formal".to_string()));
    }

    #[test]
    fn history_shows_custom_prompt() {
        let mut v = numbered(1);
        v.style = Style::Custom;
        v.custom_prompt = Some("写给老同学".into());
        let lines = format_history("w1", &[v]);
        assert_eq!(lines[2], "    Prompt: 写给老同学");
    }

    #[test]
    fn history_empty() {
        assert_eq!(format_history("w9", &[]), vec!["w9: no versions"]);
    }

    // =========================================================================
    // Compare
    // =========================================================================

    #[test]
    fn compare_lists_changes() {
        let changes = vec![FieldChange {
            field: "wishes",
            before: "愿你顺遂".into(),
            after: "天天开心".into(),
        }];
        let lines = format_compare(&numbered(1), &numbered(2), &changes);
        assert_eq!(
            lines,
            vec!["w1 Alice: 001 → 002", "    wishes: 愿你顺遂 → 天天开心"]
        );
    }

    #[test]
    fn compare_without_changes() {
        let lines = format_compare(&numbered(1), &numbered(1), &[]);
        assert_eq!(lines[1], "    no differences");
    }

    // =========================================================================
    // Batch
    // =========================================================================

    #[test]
    fn batch_events() {
        let rendered = BatchEvent::Rendered {
            index: 0,
            contact_id: "w1".into(),
            version_number: 3,
            image_path: "generate_img/w1.png".into(),
        };
        assert_eq!(
            format_batch_event(&rendered),
            vec!["[1] w1 → 003 generate_img/w1.png"]
        );
        let failed = BatchEvent::Failed {
            index: 1,
            contact_id: "w2".into(),
            error: "boom".into(),
        };
        assert_eq!(format_batch_event(&failed), vec!["[2] w2 failed: boom"]);
        let cancelled = BatchEvent::Cancelled {
            index: 2,
            contact_id: "w3".into(),
        };
        assert_eq!(format_batch_event(&cancelled), vec!["[3] w3 cancelled"]);
    }

    #[test]
    fn batch_summary_counts() {
        let summary = BatchSummary {
            outcomes: vec![BatchOutcome::Cancelled, BatchOutcome::Cancelled],
        };
        assert_eq!(
            format_batch_summary(&summary),
            vec!["Rendered 0, failed 0, cancelled 2"]
        );
    }

    // =========================================================================
    // Check
    // =========================================================================

    #[test]
    fn load_report_lists_ledgers_and_skips() {
        let mut ledgers = BTreeMap::new();
        ledgers.insert("w1".to_string(), vec![numbered(1), numbered(2)]);
        let report = LoadReport {
            ledgers: 1,
            versions: 2,
            migrated: vec!["w1".into()],
            skipped: vec![SkippedLedger {
                path: PathBuf::from("version_history/w3.json"),
                reason: "bad json".into(),
            }],
        };

        let lines = format_load_report(&report, &ledgers);

        assert_eq!(
            lines,
            vec![
                "Ledgers",
                "w1 Alice (2 versions)",
                "    migrated from legacy format",
                "Skipped",
                "    version_history/w3.json: bad json",
                "Loaded 1 ledger, 2 versions",
            ]
        );
    }

    #[test]
    fn load_report_empty_store() {
        let lines = format_load_report(&LoadReport::default(), &BTreeMap::new());
        assert_eq!(lines, vec!["Loaded 0 ledgers, 0 versions"]);
    }

    // =========================================================================
    // Export
    // =========================================================================

    #[test]
    fn export_outcomes_and_totals() {
        let outcomes = vec![
            ExportOutcome::Exported(ExportedContact {
                contact_id: "w1".into(),
                folder: PathBuf::from("export/Alice"),
                ledger_path: PathBuf::from("export/Alice/Alice.json"),
                image_path: Some(PathBuf::from("export/Alice/w1.png")),
            }),
            ExportOutcome::Exported(ExportedContact {
                contact_id: "w2".into(),
                folder: PathBuf::from("export/Bob"),
                ledger_path: PathBuf::from("export/Bob/Bob.json"),
                image_path: None,
            }),
            ExportOutcome::Failed {
                contact_id: "w3".into(),
                error: ExportError::NoVersions("w3".into()),
            },
            ExportOutcome::Cancelled {
                contact_id: "w4".into(),
            },
        ];

        assert_eq!(
            format_export(&outcomes),
            vec![
                "w1 exported to export/Alice",
                "w2 exported to export/Bob (no card image)",
                "w3 failed: No versions recorded for w3",
                "w4 cancelled",
                "Exported 2, failed 1, cancelled 1",
            ]
        );
    }
}
