//! Log-derived status reconciliation. Given the immutable task list and the
//! append-only execution trace, recompute from scratch which names are
//! completed, failed or blacklisted. No other persisted state is trusted, so
//! a crash mid-run loses at most the in-flight task.

use std::collections::BTreeSet;

use crate::report::StatusReport;
use crate::tasks::Task;

pub const MARKER_ERROR: &str = "ERROR";
pub const MARKER_START: &str = "Starting search for ";
pub const MARKER_NO_RESULTS: &str = "No results found";
pub const MARKER_SAVED: &str = "Saved results to ";
pub const MARKER_BLACKLIST: &str = "Added to blacklist: ";

pub const RESULT_PREFIX: &str = "zaba_results_";

/// Recover "First Last" from a result filename. Spaces inside a name survive
/// the round trip because only underscores were inserted on the way in.
pub fn name_from_filename(filename: &str) -> Option<String> {
    let stem = filename
        .strip_prefix(RESULT_PREFIX)?
        .strip_suffix(".txt")?;
    if stem.is_empty() {
        return None;
    }
    Some(stem.replace('_', " "))
}

/// Classify every log line by its marker and derive the status of every task.
/// Pure and deterministic: identical input always yields an identical report.
pub fn reconcile(tasks: &[Task], log_lines: &[String]) -> StatusReport {
    let mut report = StatusReport::default();
    let mut last_started: Option<String> = None;

    for line in log_lines {
        if line.contains(MARKER_ERROR) {
            report.errors.push(line.clone());
            last_started = None;
            continue;
        }
        if let Some(idx) = line.find(MARKER_START) {
            last_started = Some(line[idx + MARKER_START.len()..].trim().to_string());
            continue;
        }
        if line.contains(MARKER_NO_RESULTS) {
            // Only counts as a failure for the search it directly follows.
            if let Some(name) = last_started.take() {
                report.failed.insert(name);
            }
            continue;
        }
        if let Some(idx) = line.find(MARKER_SAVED) {
            let filename = line[idx + MARKER_SAVED.len()..].trim();
            let filename = filename.rsplit('/').next().unwrap_or(filename);
            if let Some(name) = name_from_filename(filename) {
                report.completed.insert(name);
            }
            last_started = None;
            continue;
        }
        if let Some(idx) = line.find(MARKER_BLACKLIST) {
            let name = line[idx + MARKER_BLACKLIST.len()..].trim();
            if !name.is_empty() {
                report.blacklisted.insert(name.to_string());
            }
            last_started = None;
        }
    }

    // A later successful save supersedes an earlier no-results failure.
    report.failed = &report.failed - &report.completed;

    report.pending = tasks
        .iter()
        .map(Task::full_name)
        .filter(|name| {
            !report.completed.contains(name)
                && !report.failed.contains(name)
                && !report.blacklisted.contains(name)
        })
        .collect::<BTreeSet<String>>();

    report
}
