//! Geographic join: parsed person records against the ZIP/county index.
//! Operates on the accumulated result files, independent of any live run.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::Local;
use rayon::prelude::*;
use regex::Regex;
use tracing::{info, warn};

use super::index::ZipIndex;
use crate::record::{parse_records, PersonRecord};

static FIVE_DIGIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{5}\b").unwrap());

/// One person's addresses resolved through the index.
#[derive(Debug, Clone)]
pub struct PersonGeo {
    pub name: String,
    pub age: String,
    pub aka: Vec<String>,
    pub phones: Vec<String>,
    pub emails: Vec<String>,
    pub current_address: Option<String>,
    pub current_zip: Option<String>,
    pub current_county: String,
    /// Addresses whose county resolved (and matched the target, if any).
    pub matched_addresses: Vec<String>,
    /// None when no target county filter is active.
    pub in_target_county: Option<bool>,
}

impl PersonGeo {
    /// A record passes the filter when no target is set, or at least one
    /// address resolved to the target county.
    pub fn matches(&self) -> bool {
        self.in_target_county.unwrap_or(true)
    }
}

pub fn analyze_person(record: &PersonRecord, index: &ZipIndex, target: Option<&str>) -> PersonGeo {
    let mut matched = Vec::new();
    let addresses = record
        .past_addresses
        .iter()
        .chain(record.current_address.iter());

    for address in addresses {
        let Some(zip) = first_zip(address) else {
            continue;
        };
        let Some(entry) = index.lookup(&zip) else {
            continue;
        };
        let county_ok = target.is_none_or(|t| entry.county.eq_ignore_ascii_case(t));
        if county_ok {
            matched.push(address.clone());
        }
    }

    let current_zip = record.current_address.as_deref().and_then(first_zip);
    let current_county = current_zip
        .as_deref()
        .and_then(|z| index.lookup(z))
        .map(|e| e.county.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let in_target_county = target.map(|_| !matched.is_empty());

    PersonGeo {
        name: record.name.clone().unwrap_or_else(|| "unknown".to_string()),
        age: record.age.clone().unwrap_or_else(|| "unknown".to_string()),
        aka: record.aka.clone(),
        phones: record.phones.clone(),
        emails: record.emails.clone(),
        current_address: record.current_address.clone(),
        current_zip,
        current_county,
        matched_addresses: matched,
        in_target_county,
    }
}

fn first_zip(address: &str) -> Option<String> {
    FIVE_DIGIT_RE.find(address).map(|m| m.as_str().to_string())
}

/// Walk every stored result file, classify every record, and write one
/// aggregated filtered report. Returns the report path and the grand total.
pub fn analyze_directory(
    results_dir: &Path,
    output_dir: &Path,
    index: &ZipIndex,
    target: Option<&str>,
) -> Result<(PathBuf, usize)> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("cannot create {}", output_dir.display()))?;

    let mut files: Vec<PathBuf> = std::fs::read_dir(results_dir)
        .with_context(|| format!("cannot read results dir {}", results_dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();

    // Parse and classify in parallel; unreadable files are skipped.
    let per_file: Vec<(String, Vec<PersonGeo>)> = files
        .par_iter()
        .filter_map(|path| {
            let filename = path.file_name()?.to_string_lossy().into_owned();
            let text = match std::fs::read_to_string(path) {
                Ok(t) => t,
                Err(e) => {
                    warn!("skipping unreadable result file {}: {}", path.display(), e);
                    return None;
                }
            };
            let matches: Vec<PersonGeo> = parse_records(&text)
                .iter()
                .map(|r| analyze_person(r, index, target))
                .filter(PersonGeo::matches)
                .collect();
            Some((filename, matches))
        })
        .collect();

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let output_name = match target {
        Some(county) => format!(
            "filtered_results_{}_{}.txt",
            county.replace(' ', "_"),
            timestamp
        ),
        None => format!("filtered_results_{}.txt", timestamp),
    };
    let output_path = output_dir.join(output_name);

    let mut out = String::new();
    out.push_str("Filtered Results Report\n");
    out.push_str(&format!(
        "Generated: {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    if let Some(county) = target {
        out.push_str(&format!("Filter County: {}\n", county));
    }
    out.push_str(&"=".repeat(80));
    out.push_str("\n\n");

    let mut total_matches = 0;
    for (filename, matches) in &per_file {
        if matches.is_empty() {
            continue;
        }
        out.push_str(&format!("\nFile: {}\n", filename));
        out.push_str(&"-".repeat(60));
        out.push('\n');
        for person in matches {
            out.push_str(&format_person(person));
            out.push('\n');
        }
        out.push_str(&format!("\nFound {} matches in {}\n", matches.len(), filename));
        total_matches += matches.len();
    }

    if total_matches > 0 {
        out.push('\n');
        out.push_str(&"=".repeat(80));
        out.push('\n');
        out.push_str(&format!("TOTAL MATCHES FOUND: {}\n", total_matches));
        if let Some(county) = target {
            out.push_str(&format!("Filtered by county: {}\n", county));
        }
    } else {
        out.push_str("\nNo matches found with the current filters.\n");
    }

    std::fs::write(&output_path, out)
        .with_context(|| format!("cannot write report {}", output_path.display()))?;
    info!(
        "wrote filtered report {} ({} matches)",
        output_path.display(),
        total_matches
    );
    Ok((output_path, total_matches))
}

fn format_person(person: &PersonGeo) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str(&"=".repeat(80));
    out.push('\n');
    out.push_str(&format!("Name: {}\n", person.name));
    out.push_str(&format!("Age: {}\n", person.age));

    if !person.aka.is_empty() {
        out.push_str(&format!("\nAKA: {}\n", person.aka.join(", ")));
    }

    out.push_str("\nPhone Numbers:\n");
    for phone in &person.phones {
        out.push_str(&format!("  - {}\n", phone));
    }

    out.push_str("\nEmail Addresses:\n");
    for email in &person.emails {
        out.push_str(&format!("  - {}\n", email));
    }

    out.push_str(&format!(
        "\nCurrent Address: {}\n",
        person.current_address.as_deref().unwrap_or("unknown")
    ));
    out.push_str(&format!(
        "Current ZIP: {}\n",
        person.current_zip.as_deref().unwrap_or("unknown")
    ));
    out.push_str(&format!("Current County: {}\n", person.current_county));

    if let Some(hit) = person.in_target_county {
        out.push_str(&format!(
            "\nIn Target County: {}\n",
            if hit { "YES" } else { "NO" }
        ));
    }
    out
}
