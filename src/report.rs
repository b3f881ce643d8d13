//! Report formatting for run results.
//!
//! Rendering is pure: (RunReport, OutputFormat) → String. Only
//! [`write_problem_report`] touches the filesystem.

use std::fs;
use std::path::Path;

use humansize::{format_size, BINARY};
use serde::Serialize;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::types::{CatalogEntry, EntryOutcome, Outcome, OutputFormat, RunReport, RunSummary};

/// Format a run report for output.
pub fn format_report(report: &RunReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Human => format_human(report),
        OutputFormat::Json => format_json(report),
    }
}

// ============================================================================
// PROBLEM REPORT
// ============================================================================

/// One line per problem entry, in catalog order.
///
/// Byte-identical for identical input.
pub fn render_problems(report: &RunReport) -> String {
    let mut out = String::new();
    for entry in report.problems() {
        out.push_str(&problem_line(entry));
        out.push('\n');
    }
    out
}

/// Write [`render_problems`] to `path`, replacing any previous report.
///
/// # Errors
/// Returns `ReportUnwritable` if the file cannot be written.
pub fn write_problem_report(report: &RunReport, path: &Path) -> Result<()> {
    fs::write(path, render_problems(report)).map_err(|source| Error::ReportUnwritable {
        path: path.to_path_buf(),
        source,
    })
}

fn problem_line(entry: &EntryOutcome) -> String {
    let name = &entry.name;
    let expected = &entry.expected;

    match &entry.outcome {
        Outcome::MissingSource => name.clone(),
        Outcome::HashMismatch { found } => {
            let source = entry
                .source
                .as_deref()
                .map(|p| format!(" ({})", p.display()))
                .unwrap_or_default();
            format!(
                "{}: source has unexpected hash, expected {} found {}{}",
                name, expected, found, source
            )
        }
        Outcome::DestinationDiffers { found } => {
            let found = found
                .map(|h| h.to_hex())
                .unwrap_or_else(|| "unreadable".to_string());
            format!(
                "{}: destination has unexpected hash, expected {} found {}",
                name, expected, found
            )
        }
        Outcome::Unreadable { path, reason } => {
            format!("{}: unreadable source {}: {}", name, path.display(), reason)
        }
        Outcome::CopyFailed { reason } => format!("{}: copy failed: {}", name, reason),
        Outcome::Copied | Outcome::AlreadyCorrect | Outcome::Overwritten => {
            format!("{}: ok", name)
        }
    }
}

// ============================================================================
// HUMAN FORMAT
// ============================================================================

fn format_human(report: &RunReport) -> String {
    let mut out = String::new();

    section(
        &mut out,
        "=== Missing (no source file found) ===",
        report,
        |o| matches!(o, Outcome::MissingSource),
    );
    section(
        &mut out,
        "=== Source Hash Mismatch (not copied) ===",
        report,
        |o| matches!(o, Outcome::HashMismatch { .. }),
    );
    section(
        &mut out,
        "=== Destination Differs (use --force to replace) ===",
        report,
        |o| matches!(o, Outcome::DestinationDiffers { .. }),
    );
    section(
        &mut out,
        "=== Failed ===",
        report,
        |o| matches!(o, Outcome::Unreadable { .. } | Outcome::CopyFailed { .. }),
    );

    out.push_str(&format_summary(&report.summary(), report.dry_run));
    out
}

fn section<P>(out: &mut String, title: &str, report: &RunReport, pick: P)
where
    P: Fn(&Outcome) -> bool,
{
    let mut entries = report.outcomes.iter().filter(|e| pick(&e.outcome)).peekable();
    if entries.peek().is_none() {
        return;
    }

    out.push_str(title);
    out.push('\n');
    for entry in entries {
        out.push_str(&format!("  {}\n", problem_line(entry)));
    }
    out.push('\n');
}

fn format_summary(summary: &RunSummary, dry_run: bool) -> String {
    let mut out = String::new();
    if dry_run {
        out.push_str("=== Summary (dry run, nothing written) ===\n");
    } else {
        out.push_str("=== Summary ===\n");
    }
    out.push_str(&format!("Catalog entries:     {}\n", summary.total()));
    out.push_str(&format!("Copied:              {}\n", summary.copied));
    out.push_str(&format!("Overwritten:         {}\n", summary.overwritten));
    out.push_str(&format!("Already correct:     {}\n", summary.already_correct));
    out.push_str(&format!("Missing:             {}\n", summary.missing));
    out.push_str(&format!("Hash mismatch:       {}\n", summary.mismatched));
    out.push_str(&format!("Destination differs: {}\n", summary.destination_differs));
    if summary.failed > 0 {
        out.push_str(&format!("Failed:              {}\n", summary.failed));
    }
    out.push_str(&format!(
        "Data copied:         {}\n",
        format_size(summary.bytes_copied, BINARY)
    ));

    out
}

// ============================================================================
// JSON FORMAT
// ============================================================================

#[derive(Serialize)]
struct JsonReport<'a> {
    dry_run: bool,
    summary: RunSummary,
    outcomes: &'a [EntryOutcome],
}

fn format_json(report: &RunReport) -> String {
    let json = JsonReport {
        dry_run: report.dry_run,
        summary: report.summary(),
        outcomes: &report.outcomes,
    };
    serde_json::to_string_pretty(&json).unwrap_or_else(|e| {
        // String keys and plain values only; cannot fail
        panic!("Failed to serialize report to JSON: {}", e)
    })
}

// ============================================================================
// CATALOG LISTING
// ============================================================================

#[derive(Serialize)]
struct JsonCatalog<'a> {
    entries: &'a [CatalogEntry],
    malformed: usize,
    duplicates: usize,
}

/// Format the loaded catalog, one `<hash>  <name>` line per entry.
pub fn format_catalog(catalog: &Catalog, format: OutputFormat) -> String {
    match format {
        OutputFormat::Human => {
            let mut out = String::new();
            for entry in catalog.entries() {
                out.push_str(&format!("{}  {}\n", entry.expected, entry.name));
            }
            out.push_str(&format!(
                "\n{} entries ({} malformed lines skipped, {} duplicate names)\n",
                catalog.len(),
                catalog.malformed,
                catalog.duplicates
            ));
            out
        }
        OutputFormat::Json => {
            let json = JsonCatalog {
                entries: catalog.entries(),
                malformed: catalog.malformed,
                duplicates: catalog.duplicates,
            };
            serde_json::to_string_pretty(&json).unwrap_or_else(|e| {
                panic!("Failed to serialize catalog to JSON: {}", e)
            })
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::parse_catalog;
    use crate::types::ContentHash;
    use std::io::Cursor;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn hash(byte: u8) -> ContentHash {
        ContentHash([byte; 32])
    }

    fn entry(name: &str, outcome: Outcome) -> EntryOutcome {
        EntryOutcome {
            name: name.to_string(),
            expected: hash(0xaa),
            source: None,
            outcome,
        }
    }

    fn sample_report() -> RunReport {
        RunReport {
            outcomes: vec![
                entry("a.zip", Outcome::Copied),
                entry("b.zip", Outcome::MissingSource),
                EntryOutcome {
                    source: Some(PathBuf::from("/roms/c.zip")),
                    ..entry("c.zip", Outcome::HashMismatch { found: hash(0xbb) })
                },
                entry("d.zip", Outcome::DestinationDiffers { found: Some(hash(0xcc)) }),
                entry("e.zip", Outcome::AlreadyCorrect),
                entry(
                    "f.zip",
                    Outcome::CopyFailed {
                        reason: "No space left on device".to_string(),
                    },
                ),
            ],
            bytes_copied: 1024 * 1024 * 3,
            dry_run: false,
        }
    }

    // --- problem report ---

    #[test]
    fn test_problems_list_only_problem_entries_in_order() {
        let text = render_problems(&sample_report());
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "b.zip");
        assert!(lines[1].starts_with("c.zip: source has unexpected hash"));
        assert!(lines[1].contains(&hash(0xbb).to_hex()));
        assert!(lines[1].ends_with("(/roms/c.zip)"));
        assert!(lines[2].starts_with("d.zip: destination has unexpected hash"));
        assert!(lines[2].contains(&format!("expected {}", hash(0xaa))));
        assert_eq!(lines[3], "f.zip: copy failed: No space left on device");
    }

    #[test]
    fn test_problems_render_is_deterministic() {
        let report = sample_report();
        assert_eq!(render_problems(&report), render_problems(&report));
        assert_eq!(
            format_report(&report, OutputFormat::Human),
            format_report(&report, OutputFormat::Human)
        );
    }

    #[test]
    fn test_problems_empty_when_all_ok() {
        let report = RunReport {
            outcomes: vec![entry("a.zip", Outcome::Copied)],
            ..Default::default()
        };
        assert_eq!(render_problems(&report), "");
    }

    #[test]
    fn test_unreadable_destination_is_labelled() {
        let report = RunReport {
            outcomes: vec![entry("d.zip", Outcome::DestinationDiffers { found: None })],
            ..Default::default()
        };
        assert!(render_problems(&report).contains("found unreadable"));
    }

    #[test]
    fn test_write_report_overwrites_previous_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.txt");
        fs::write(&path, "stale line\nanother stale line\n").unwrap();

        write_problem_report(&sample_report(), &path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, render_problems(&sample_report()));
        assert!(!written.contains("stale"));
    }

    #[test]
    fn test_write_report_to_missing_dir_is_unwritable() {
        let err = write_problem_report(&sample_report(), Path::new("/nonexistent/dir/missing.txt"))
            .unwrap_err();
        assert!(matches!(err, Error::ReportUnwritable { .. }));
    }

    // --- human format ---

    #[test]
    fn test_human_format_has_sections() {
        let output = format_report(&sample_report(), OutputFormat::Human);

        assert!(output.contains("=== Missing (no source file found) ===\n  b.zip\n"));
        assert!(output.contains("=== Source Hash Mismatch"));
        assert!(output.contains("=== Destination Differs"));
        assert!(output.contains("=== Failed ==="));
    }

    #[test]
    fn test_human_format_summary() {
        let output = format_report(&sample_report(), OutputFormat::Human);

        assert!(output.contains("=== Summary ===\n"));
        assert!(output.contains("Catalog entries:     6"));
        assert!(output.contains("Copied:              1"));
        assert!(output.contains("Already correct:     1"));
        assert!(output.contains("Missing:             1"));
        assert!(output.contains("Hash mismatch:       1"));
        assert!(output.contains("Destination differs: 1"));
        assert!(output.contains("Failed:              1"));
        assert!(output.contains("3 MiB"));
    }

    #[test]
    fn test_human_format_clean_run_has_only_summary() {
        let report = RunReport {
            outcomes: vec![entry("a.zip", Outcome::Copied)],
            dry_run: true,
            ..Default::default()
        };
        let output = format_report(&report, OutputFormat::Human);

        assert!(output.starts_with("=== Summary (dry run, nothing written) ==="));
        assert!(!output.contains("Failed:"));
    }

    // --- JSON format ---

    #[test]
    fn test_json_format_has_summary_and_outcomes() {
        let output = format_report(&sample_report(), OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["dry_run"], false);
        assert_eq!(parsed["summary"]["copied"], 1);
        assert_eq!(parsed["summary"]["missing"], 1);
        assert_eq!(parsed["summary"]["bytes_copied"], 3 * 1024 * 1024);
        assert_eq!(parsed["outcomes"].as_array().unwrap().len(), 6);
        assert_eq!(parsed["outcomes"][1]["status"], "missing_source");
        assert_eq!(parsed["outcomes"][2]["source"], "/roms/c.zip");
        assert_eq!(parsed["outcomes"][2]["found"], hash(0xbb).to_hex());
    }

    // --- catalog listing ---

    #[test]
    fn test_catalog_listing_human_and_json() {
        let text = format!("{}  a.zip\nbroken line\n", hash(0x01));
        let catalog = parse_catalog(Cursor::new(text)).unwrap();

        let human = format_catalog(&catalog, OutputFormat::Human);
        assert!(human.starts_with(&format!("{}  a.zip\n", hash(0x01))));
        assert!(human.contains("1 entries (1 malformed lines skipped, 0 duplicate names)"));

        let json: serde_json::Value =
            serde_json::from_str(&format_catalog(&catalog, OutputFormat::Json)).unwrap();
        assert_eq!(json["entries"][0]["name"], "a.zip");
        assert_eq!(json["malformed"], 1);
    }
}
