//! ZIP/county reference index: zip → {city, county, type} plus derived
//! city and county side tables. Built once per analysis run, read-only after.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

static ZIP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{5}").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    pub city: String,
    pub county: String,
    pub kind: String,
}

pub struct ZipIndex {
    zips: HashMap<String, ZipEntry>,
    city_to_zips: HashMap<String, Vec<String>>,
    county_counts: BTreeMap<String, usize>,
}

impl ZipIndex {
    /// Parse the tab-delimited reference table (zip, city, county, type).
    /// Rows with fewer than 4 columns or no 5-digit token are skipped;
    /// a repeated zip code keeps the later row.
    pub fn load(path: &Path) -> Result<ZipIndex> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read zip database {}", path.display()))?;
        Ok(ZipIndex::from_str(&text))
    }

    fn from_str(text: &str) -> ZipIndex {
        let mut zips = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() < 4 {
                continue;
            }
            let Some(zip) = ZIP_RE.find(parts[0]) else {
                continue;
            };
            zips.insert(
                zip.as_str().to_string(),
                ZipEntry {
                    city: parts[1].trim().to_string(),
                    county: parts[2].trim().to_string(),
                    kind: parts[3].trim().to_string(),
                },
            );
        }

        // Side tables are derived after the overwrite pass so they reflect
        // the surviving rows only.
        let mut city_to_zips: HashMap<String, Vec<String>> = HashMap::new();
        let mut county_counts: BTreeMap<String, usize> = BTreeMap::new();
        for (zip, entry) in &zips {
            city_to_zips
                .entry(entry.city.to_lowercase())
                .or_default()
                .push(zip.clone());
            *county_counts.entry(entry.county.clone()).or_default() += 1;
        }
        for zips in city_to_zips.values_mut() {
            zips.sort();
        }

        ZipIndex {
            zips,
            city_to_zips,
            county_counts,
        }
    }

    pub fn lookup(&self, zip: &str) -> Option<&ZipEntry> {
        self.zips.get(zip)
    }

    /// Zip codes for a city, matched case-insensitively. The city side table
    /// is derived from the reference dataset alongside the county counts and
    /// is part of the index's query surface.
    pub fn zips_for_city(&self, city: &str) -> &[String] {
        self.city_to_zips
            .get(&city.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// County → number of zip entries, sorted by county name.
    pub fn county_counts(&self) -> &BTreeMap<String, usize> {
        &self.county_counts
    }

    pub fn len(&self) -> usize {
        self.zips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zips.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "60601\tChicago\tCook\tStandard\n\
                          60602\tChicago\tCook\tStandard\n\
                          62704\tSpringfield\tSangamon\tStandard\n";

    #[test]
    fn lookup_and_counts() {
        let index = ZipIndex::from_str(SAMPLE);
        assert_eq!(index.len(), 3);
        assert_eq!(index.lookup("60601").unwrap().county, "Cook");
        assert_eq!(index.county_counts()["Cook"], 2);
        assert_eq!(index.county_counts()["Sangamon"], 1);
        assert!(index.lookup("99999").is_none());
    }

    #[test]
    fn later_row_overwrites_earlier_for_same_zip() {
        let text = "60601\tChicago\tCook\tStandard\n\
                    60601\tChicago\tDuPage\tPO Box\n";
        let index = ZipIndex::from_str(text);
        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("60601").unwrap().county, "DuPage");
        assert_eq!(index.county_counts().get("Cook"), None);
    }

    #[test]
    fn zip_token_is_regex_extracted() {
        let text = "ZIP 60601 (IL)\tChicago\tCook\tStandard\n";
        let index = ZipIndex::from_str(text);
        assert!(index.lookup("60601").is_some());
    }

    #[test]
    fn short_rows_are_skipped() {
        let text = "60601\tChicago\n60602\tChicago\tCook\tStandard\n";
        let index = ZipIndex::from_str(text);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn city_index_is_case_insensitive() {
        let index = ZipIndex::from_str(SAMPLE);
        assert_eq!(index.zips_for_city("CHICAGO"), ["60601", "60602"]);
        assert!(index.zips_for_city("nowhere").is_empty());
    }
}
