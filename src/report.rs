//! The status report file: written after every reconciliation pass and
//! re-read at startup as the bootstrap default. The section headers are part
//! of the format contract and must stay byte-compatible across runs.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;

pub const HEADER_ERRORS: &str = "Errors:";
pub const HEADER_COMPLETED: &str = "Completed Searches:";
pub const HEADER_FAILED: &str = "Failed Searches:";
pub const HEADER_BLACKLISTED: &str = "Blacklisted Searches (404):";
pub const HEADER_PENDING: &str = "Pending Searches:";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub errors: Vec<String>,
    pub completed: BTreeSet<String>,
    pub failed: BTreeSet<String>,
    pub blacklisted: BTreeSet<String>,
    pub pending: BTreeSet<String>,
}

pub fn write_report(report: &StatusReport, path: &Path) -> Result<()> {
    let mut out = String::new();
    out.push_str("Search Status Report\n");
    out.push_str(&format!("Generated: {}\n\n", Local::now().format("%Y-%m-%d %H:%M:%S")));

    out.push_str(HEADER_ERRORS);
    out.push('\n');
    for line in &report.errors {
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');

    for (header, names) in [
        (HEADER_COMPLETED, &report.completed),
        (HEADER_FAILED, &report.failed),
        (HEADER_BLACKLISTED, &report.blacklisted),
        (HEADER_PENDING, &report.pending),
    ] {
        out.push_str(header);
        out.push('\n');
        for name in names {
            out.push_str(name);
            out.push('\n');
        }
        out.push('\n');
    }

    std::fs::write(path, out)
        .with_context(|| format!("cannot write status report {}", path.display()))
}

/// Read a previously written report. A missing file is an empty report.
pub fn read_report(path: &Path) -> Result<StatusReport> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(StatusReport::default())
        }
        Err(e) => {
            return Err(e).with_context(|| format!("cannot read report {}", path.display()))
        }
    };

    #[derive(PartialEq, Clone, Copy)]
    enum Section {
        None,
        Errors,
        Completed,
        Failed,
        Blacklisted,
        Pending,
    }

    let mut report = StatusReport::default();
    let mut section = Section::None;
    for line in text.lines() {
        section = match line {
            HEADER_ERRORS => Section::Errors,
            HEADER_COMPLETED => Section::Completed,
            HEADER_FAILED => Section::Failed,
            HEADER_BLACKLISTED => Section::Blacklisted,
            HEADER_PENDING => Section::Pending,
            _ => {
                let entry = line.trim();
                if !entry.is_empty()
                    && !entry.starts_with("Search Status Report")
                    && !entry.starts_with("Generated:")
                {
                    match section {
                        Section::Errors => report.errors.push(line.to_string()),
                        Section::Completed => {
                            report.completed.insert(entry.to_string());
                        }
                        Section::Failed => {
                            report.failed.insert(entry.to_string());
                        }
                        Section::Blacklisted => {
                            report.blacklisted.insert(entry.to_string());
                        }
                        Section::Pending => {
                            report.pending.insert(entry.to_string());
                        }
                        Section::None => {}
                    }
                }
                section
            }
        };
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StatusReport {
        let mut r = StatusReport::default();
        r.errors.push("[2025-01-01 00:00:00] ERROR executor failed for Jane Roe".into());
        r.completed.insert("John Doe".into());
        r.failed.insert("Jane Roe".into());
        r.blacklisted.insert("Gone Person".into());
        r.pending.insert("Still Waiting".into());
        r
    }

    #[test]
    fn report_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search_status.txt");
        let report = sample();
        write_report(&report, &path).unwrap();
        let reread = read_report(&path).unwrap();
        assert_eq!(reread, report);
    }

    #[test]
    fn missing_report_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let report = read_report(&dir.path().join("search_status.txt")).unwrap();
        assert_eq!(report, StatusReport::default());
    }

    #[test]
    fn section_headers_are_always_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search_status.txt");
        write_report(&StatusReport::default(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        for header in [
            HEADER_ERRORS,
            HEADER_COMPLETED,
            HEADER_FAILED,
            HEADER_BLACKLISTED,
            HEADER_PENDING,
        ] {
            assert!(text.contains(header), "missing {}", header);
        }
    }
}
