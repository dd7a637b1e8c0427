//! The append-only execution trace. These files — not any cached status —
//! are the durable source of truth that reconciliation recomputes from, so
//! every state transition the runner makes must pass through `RunLog::line`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::warn;

/// Appender for the current invocation's log file.
pub struct RunLog {
    file: File,
    path: PathBuf,
}

impl RunLog {
    /// Open `logs_dir/run_YYYYMMDD_HHMMSS.log` for append, creating the
    /// directory if needed.
    pub fn create(logs_dir: &Path) -> Result<RunLog> {
        std::fs::create_dir_all(logs_dir)
            .with_context(|| format!("cannot create log dir {}", logs_dir.display()))?;
        let name = format!("run_{}.log", Local::now().format("%Y%m%d_%H%M%S"));
        let path = logs_dir.join(name);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("cannot open run log {}", path.display()))?;
        Ok(RunLog { file, path })
    }

    /// Append one timestamped line and flush so a crash loses at most the
    /// in-flight task.
    pub fn line(&mut self, msg: &str) {
        if let Err(e) = writeln!(self.file, "[{}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), msg)
            .and_then(|_| self.file.flush())
        {
            warn!("failed to append to run log {}: {}", self.path.display(), e);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The exact set of log records a reconciliation pass scans, decided once
/// per run and passed down explicitly.
pub enum LogSource {
    /// Every run log under the directory, in filename (= chronological) order.
    AllRuns(PathBuf),
    /// A single log file.
    File(PathBuf),
}

impl LogSource {
    /// Collect log lines. Unreadable or missing logs are never fatal; they
    /// reconcile as an empty history.
    pub fn lines(&self) -> Vec<String> {
        match self {
            LogSource::AllRuns(dir) => {
                let Ok(entries) = std::fs::read_dir(dir) else {
                    return Vec::new();
                };
                let mut paths: Vec<PathBuf> = entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| {
                        p.extension().is_some_and(|ext| ext == "log")
                            && p.file_name()
                                .and_then(|n| n.to_str())
                                .is_some_and(|n| n.starts_with("run_"))
                    })
                    .collect();
                paths.sort();
                paths.iter().flat_map(|p| read_lines(p)).collect()
            }
            LogSource::File(path) => read_lines(path),
        }
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => text.lines().map(str::to_string).collect(),
        Err(e) => {
            warn!("cannot read log {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appended_lines_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let mut log = RunLog::create(dir.path()).unwrap();
            log.line("Starting search for John Doe");
            log.line("Saved results to zaba_results_John_Doe.txt");
            log.path().to_path_buf()
        };
        let lines = LogSource::File(path).lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("Starting search for John Doe"));
    }

    #[test]
    fn all_runs_reads_every_log_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("run_20250101_000000.log"), "first\n").unwrap();
        std::fs::write(dir.path().join("run_20250102_000000.log"), "second\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored\n").unwrap();
        let lines = LogSource::AllRuns(dir.path().to_path_buf()).lines();
        assert_eq!(lines, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn missing_dir_reconciles_as_empty() {
        let src = LogSource::AllRuns(PathBuf::from("/nonexistent/logs"));
        assert!(src.lines().is_empty());
    }
}
