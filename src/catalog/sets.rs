//! JSON set-list catalog provider
//!
//! Reads the multi-set format: an object keyed by set code whose values hold
//! the set metadata and its `cards` array.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{CatalogEntry, CatalogProvider, FrameEra};

#[derive(Debug, Deserialize)]
struct SetRecord {
    name: String,
    code: String,
    #[serde(rename = "releaseDate", default)]
    release_date: Option<String>,
    #[serde(rename = "onlineOnly", default)]
    online_only: bool,
    #[serde(default)]
    cards: Vec<CardRecord>,
}

#[derive(Debug, Deserialize)]
struct CardRecord {
    name: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "multiverseid", default)]
    multiverse_id: Option<u32>,
    #[serde(default)]
    number: Option<String>,
}

/// Catalog provider backed by a JSON set list on disk
#[derive(Debug, Clone)]
pub struct JsonSetsProvider {
    path: PathBuf,
}

impl JsonSetsProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse a set list document into catalog entries, oldest set first
    pub fn parse(json: &str) -> Result<Vec<CatalogEntry>> {
        let sets: BTreeMap<String, SetRecord> =
            serde_json::from_str(json).context("Invalid set list JSON")?;

        let mut sets: Vec<SetRecord> = sets.into_values().collect();
        sets.sort_by(|a, b| {
            a.release_date
                .as_deref()
                .unwrap_or("")
                .cmp(b.release_date.as_deref().unwrap_or(""))
                .then_with(|| a.code.cmp(&b.code))
        });

        let mut entries = Vec::new();
        for set in sets {
            let era = set
                .release_date
                .as_deref()
                .map(FrameEra::from_release_date)
                .unwrap_or(FrameEra::M15);

            debug!("Set {} ({}): {} cards, {} frame", set.code, set.name, set.cards.len(), era);

            for (index, card) in set.cards.into_iter().enumerate() {
                entries.push(CatalogEntry {
                    id: card.id.unwrap_or_else(|| format!("{}-{}", set.code, index)),
                    name: card.name,
                    multiverse_id: card.multiverse_id,
                    number: card.number,
                    set_code: set.code.clone(),
                    set_name: set.name.clone(),
                    release_date: set.release_date.clone(),
                    online_only: set.online_only,
                    era,
                });
            }
        }

        Ok(entries)
    }
}

impl CatalogProvider for JsonSetsProvider {
    fn entries(&self) -> Result<Vec<CatalogEntry>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read catalog {:?}", self.path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse catalog {:?}", self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"{
        "M15": {
            "name": "Magic 2015 Core Set",
            "code": "M15",
            "releaseDate": "2014-07-18",
            "cards": [
                { "name": "Forest", "id": "m15-forest", "multiverseid": 383244, "number": "269" }
            ]
        },
        "LEA": {
            "name": "Limited Edition Alpha",
            "code": "LEA",
            "releaseDate": "1993-08-05",
            "cards": [
                { "name": "Forest", "id": "lea-forest", "multiverseid": 288 },
                { "name": "Black Lotus", "multiverseid": 3 }
            ]
        },
        "PZ1": {
            "name": "Legendary Cube",
            "code": "PZ1",
            "releaseDate": "2015-11-02",
            "onlineOnly": true
        }
    }"#;

    #[test]
    fn test_parse_set_list() {
        let entries = JsonSetsProvider::parse(SAMPLE).unwrap();
        assert_eq!(entries.len(), 3);

        // Oldest set first
        assert_eq!(entries[0].set_code, "LEA");
        assert_eq!(entries[0].era, FrameEra::Original);
        assert_eq!(entries[1].name, "Black Lotus");
        assert_eq!(entries[1].id, "LEA-1");
        assert_eq!(entries[2].era, FrameEra::Modern);
        assert_eq!(entries[2].number.as_deref(), Some("269"));
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(JsonSetsProvider::parse("[1, 2, 3]").is_err());
        assert!(JsonSetsProvider::parse("not json").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", SAMPLE).unwrap();

        let provider = JsonSetsProvider::new(temp_file.path());
        let catalog = Catalog::load(&provider).unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.printings("forest"), vec!["LEA", "M15"]);
        assert_eq!(catalog.find_by_multiverse_id(3).map(|e| e.name.as_str()), Some("Black Lotus"));
    }

    #[test]
    fn test_load_missing_file() {
        let provider = JsonSetsProvider::new("/nonexistent/AllSets.json");
        assert!(Catalog::load(&provider).is_err());
    }
}
