//! CardScan - trading card identification from photographs
//!
//! Finds cards in a photo, locates each card's title, reads it with OCR and
//! resolves it against a card catalog with an OCR-aware edit distance.

pub mod catalog;
pub mod config;
pub mod error;
pub mod storage;
pub mod vision;

pub use catalog::{Catalog, CatalogEntry, CatalogProvider, FrameEra, JsonSetsProvider};
pub use error::{ScanError, ScanResult};
pub use vision::{CardScanner, LocatedItem, ScannerConfig};
