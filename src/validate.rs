use std::path::Path;

use tracing::info;

/// Byte size of the site's generic error page. Exact match only — any other
/// size, including near-matches, is treated as real content.
pub const JUNK_FILE_SIZE: u64 = 2252;

/// Banner phrases that only ever appear on error / no-results pages.
const JUNK_PATTERNS: &[&str] = &[
    "Status: 404, NOT FOUND",
    "Search Error",
    "Please try again",
    "No records found",
    "No matches found",
];

pub fn is_junk_content(content: &str) -> bool {
    JUNK_PATTERNS.iter().any(|p| content.contains(p))
}

/// Size heuristic against a persisted artifact. Unreadable metadata counts
/// as non-junk; the content heuristic gets its own chance at the bytes.
pub fn is_junk_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.len() == JUNK_FILE_SIZE)
        .unwrap_or(false)
}

/// Pre-clean a stale result file before a fresh query: if either heuristic
/// fires, delete it. Returns true when a file was removed.
pub fn remove_if_junk(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    let by_size = is_junk_file(path);
    let by_content = std::fs::read_to_string(path)
        .map(|c| is_junk_content(&c))
        .unwrap_or(false);
    if by_size || by_content {
        info!("removing junk file {}", path.display());
        let _ = std::fs::remove_file(path);
        return true;
    }
    false
}
