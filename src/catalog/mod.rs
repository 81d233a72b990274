//! Card Catalog
//!
//! Read-only collection of every known printing. Built once from a
//! [`CatalogProvider`] and shared behind an `Arc` by every search.

pub mod sets;

pub use sets::JsonSetsProvider;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Print-era layout of a card face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameEra {
    /// Light name printed above the art, no title box
    Original,
    /// 2003 frame
    Modern,
    /// 2014 frame, dark name inside a title box
    M15,
}

/// Last release date printed with the original frame
const ORIGINAL_FRAME_UNTIL: &str = "2003-07-29";
/// Last release date printed with the 2003 frame
const MODERN_FRAME_UNTIL: &str = "2014-07-18";

impl FrameEra {
    /// Era of a set from its `YYYY-MM-DD` release date. Unparsable dates are
    /// treated as recent.
    pub fn from_release_date(date: &str) -> Self {
        let date = date.trim();
        let iso = date.len() == 10
            && date
                .char_indices()
                .all(|(i, c)| if i == 4 || i == 7 { c == '-' } else { c.is_ascii_digit() });

        if !iso {
            return FrameEra::M15;
        }

        // ISO dates order lexicographically
        if date <= ORIGINAL_FRAME_UNTIL {
            FrameEra::Original
        } else if date <= MODERN_FRAME_UNTIL {
            FrameEra::Modern
        } else {
            FrameEra::M15
        }
    }
}

impl fmt::Display for FrameEra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FrameEra::Original => "original",
            FrameEra::Modern => "modern",
            FrameEra::M15 => "m15",
        };
        f.write_str(label)
    }
}

/// One printing of a card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Printed card name
    pub name: String,
    /// Unique printing identifier
    pub id: String,
    /// Gatherer multiverse id
    pub multiverse_id: Option<u32>,
    /// Collector number within the set
    pub number: Option<String>,
    /// Set code (e.g. "LEA")
    pub set_code: String,
    /// Set name
    pub set_name: String,
    /// Set release date, `YYYY-MM-DD`
    pub release_date: Option<String>,
    /// Printed only for online play
    pub online_only: bool,
    /// Frame layout of this printing
    pub era: FrameEra,
}

impl CatalogEntry {
    /// Minimal entry with just a name, used for ad-hoc catalogs
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.to_lowercase().replace(' ', "-"),
            name,
            multiverse_id: None,
            number: None,
            set_code: String::new(),
            set_name: String::new(),
            release_date: None,
            online_only: false,
            era: FrameEra::M15,
        }
    }
}

/// Source of catalog entries (file, database, fixture)
pub trait CatalogProvider {
    /// Load every printing
    fn entries(&self) -> Result<Vec<CatalogEntry>>;
}

/// Immutable, shareable card catalog
#[derive(Debug, Default)]
pub struct Catalog {
    entries: Vec<Arc<CatalogEntry>>,
    /// Lowercased name -> indices into `entries`
    by_name: HashMap<String, Vec<usize>>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        let entries: Vec<Arc<CatalogEntry>> = entries.into_iter().map(Arc::new).collect();
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, entry) in entries.iter().enumerate() {
            by_name.entry(entry.name.to_lowercase()).or_default().push(idx);
        }

        Self { entries, by_name }
    }

    /// Catalog holding one entry per name
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        Self::new(names.iter().map(|n| CatalogEntry::named(n.as_ref())).collect())
    }

    /// Load through a provider
    pub fn load(provider: &dyn CatalogProvider) -> Result<Self> {
        let catalog = Self::new(provider.entries()?);
        info!(
            "Loaded catalog: {} printings, {} distinct names",
            catalog.len(),
            catalog.distinct_names()
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn distinct_names(&self) -> usize {
        self.by_name.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CatalogEntry>> {
        self.entries.iter()
    }

    /// All printings with this name, ignoring case
    pub fn find_by_name(&self, name: &str) -> Vec<&Arc<CatalogEntry>> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(|indices| indices.iter().map(|&i| &self.entries[i]).collect())
            .unwrap_or_default()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Arc<CatalogEntry>> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn find_by_multiverse_id(&self, multiverse_id: u32) -> Option<&Arc<CatalogEntry>> {
        self.entries.iter().find(|e| e.multiverse_id == Some(multiverse_id))
    }

    /// Printings matching a card name, a catalog id or a multiverse id, tried in that order
    pub fn lookup(&self, query: &str) -> Vec<&Arc<CatalogEntry>> {
        let by_name = self.find_by_name(query);
        if !by_name.is_empty() {
            return by_name;
        }

        let query = query.trim();
        if let Some(entry) = self.find_by_id(query) {
            return vec![entry];
        }
        query
            .parse()
            .ok()
            .and_then(|multiverse_id| self.find_by_multiverse_id(multiverse_id))
            .into_iter()
            .collect()
    }

    /// Set codes a card name was printed in, in catalog order
    pub fn printings(&self, name: &str) -> Vec<String> {
        let mut codes: Vec<String> = Vec::new();
        for entry in self.find_by_name(name) {
            if !codes.contains(&entry.set_code) {
                codes.push(entry.set_code.clone());
            }
        }
        codes
    }

    /// Closest distinct names to free text, best first
    pub fn suggest(&self, text: &str, limit: usize) -> Vec<(String, f64)> {
        let query = text.trim().to_lowercase();
        let mut scored: Vec<(String, f64)> = self
            .by_name
            .values()
            .filter_map(|indices| indices.first())
            .map(|&i| {
                let name = &self.entries[i].name;
                (name.clone(), strsim::normalized_levenshtein(&query, &name.to_lowercase()))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(limit);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn printing(name: &str, set_code: &str, date: &str, multiverse_id: u32) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            id: format!("{}-{}", set_code, multiverse_id),
            multiverse_id: Some(multiverse_id),
            number: None,
            set_code: set_code.to_string(),
            set_name: set_code.to_string(),
            release_date: Some(date.to_string()),
            online_only: false,
            era: FrameEra::from_release_date(date),
        }
    }

    fn sample() -> Catalog {
        Catalog::new(vec![
            printing("Forest", "LEA", "1993-08-05", 288),
            printing("Island", "LEA", "1993-08-05", 293),
            printing("Forest", "M15", "2014-07-18", 383244),
            printing("Forest", "KTK", "2014-09-26", 386536),
        ])
    }

    #[test]
    fn test_frame_era_from_release_date() {
        assert_eq!(FrameEra::from_release_date("1993-08-05"), FrameEra::Original);
        assert_eq!(FrameEra::from_release_date("2003-07-29"), FrameEra::Original);
        assert_eq!(FrameEra::from_release_date("2003-07-30"), FrameEra::Modern);
        assert_eq!(FrameEra::from_release_date("2014-07-18"), FrameEra::Modern);
        assert_eq!(FrameEra::from_release_date("2014-07-19"), FrameEra::M15);
        assert_eq!(FrameEra::from_release_date("someday"), FrameEra::M15);
    }

    #[test]
    fn test_find_by_name_ignores_case() {
        let catalog = sample();
        assert_eq!(catalog.find_by_name("forest").len(), 3);
        assert_eq!(catalog.find_by_name("  ISLAND ").len(), 1);
        assert!(catalog.find_by_name("Swamp").is_empty());
        assert_eq!(catalog.distinct_names(), 2);
    }

    #[test]
    fn test_lookups() {
        let catalog = sample();
        assert_eq!(catalog.find_by_multiverse_id(293).map(|e| e.name.as_str()), Some("Island"));
        assert!(catalog.find_by_multiverse_id(1).is_none());
        assert_eq!(catalog.find_by_id("KTK-386536").map(|e| e.set_code.as_str()), Some("KTK"));
        assert_eq!(catalog.printings("Forest"), vec!["LEA", "M15", "KTK"]);
    }

    #[test]
    fn test_lookup_accepts_name_or_id() {
        let catalog = sample();
        let names = |query: &str| catalog.lookup(query).iter().map(|e| e.name.clone()).collect::<Vec<_>>();

        assert_eq!(catalog.lookup("forest").len(), 3);
        assert_eq!(names(" KTK-386536 "), vec!["Forest"]);
        assert_eq!(names("293"), vec!["Island"]);
        assert!(catalog.lookup("1").is_empty());
        assert!(catalog.lookup("Swamp").is_empty());
    }

    #[test]
    fn test_suggest() {
        let catalog = sample();
        let suggestions = catalog.suggest("forrest", 5);
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].0, "Forest");
        assert!(suggestions[0].1 > suggestions[1].1);
    }

    #[test]
    fn test_from_names() {
        let catalog = Catalog::from_names(&["Forest", "Island", "Mountain"]);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.iter().next().map(|e| e.name.as_str()), Some("Forest"));
    }

    #[test]
    fn test_catalog_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Catalog>();
    }
}
