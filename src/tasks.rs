use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

/// One lookup unit drawn from the input list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub first_name: String,
    pub last_name: String,
    pub city: String,
    pub state: String,
    /// 1-based line number in the input file, for diagnostics.
    pub source_line: usize,
}

impl Task {
    /// Identity key used by reconciliation, the blacklist and the retry cap.
    /// Duplicate names in the input collapse under this key.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Deterministic result filename for this task.
    pub fn result_filename(&self) -> String {
        format!("zaba_results_{}_{}.txt", self.first_name, self.last_name)
    }
}

/// Read the task list: newline records, tab- or comma-delimited, optional
/// header row. Lines with fewer than 2 fields are skipped, not fatal.
/// An unreadable file is the one fatal setup error of the whole run.
pub fn load_tasks(path: &Path) -> Result<Vec<Task>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read task list {}", path.display()))?;

    let mut tasks = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("First Name") || line.starts_with("first_name") {
            continue;
        }
        let delimiter = if line.contains('\t') { '\t' } else { ',' };
        let parts: Vec<&str> = line.split(delimiter).map(str::trim).collect();
        if parts.len() < 2 {
            warn!("skipping malformed task line {}: {:?}", idx + 1, line);
            continue;
        }
        tasks.push(Task {
            first_name: parts[0].to_string(),
            last_name: parts[1].to_string(),
            city: parts.get(2).copied().unwrap_or("").to_string(),
            state: parts.get(3).copied().unwrap_or("").to_string(),
            source_line: idx + 1,
        });
    }
    Ok(tasks)
}
