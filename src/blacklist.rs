use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Append-only skip-list of names known to yield nothing. Membership is
/// re-read from disk on every query, so correctness never depends on an
/// in-memory cache surviving a restart. Duplicate appends are harmless.
pub struct Blacklist {
    path: PathBuf,
}

impl Blacklist {
    pub fn new(path: PathBuf) -> Self {
        Blacklist { path }
    }

    pub fn add(&self, name: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("cannot open blacklist {}", self.path.display()))?;
        writeln!(file, "{}", name)?;
        Ok(())
    }

    /// Case-insensitive membership. Missing file means empty blacklist.
    pub fn contains(&self, name: &str) -> bool {
        let Ok(text) = std::fs::read_to_string(&self.path) else {
            return false;
        };
        let needle = name.to_lowercase();
        text.lines().any(|l| l.trim().to_lowercase() == needle)
    }
}
