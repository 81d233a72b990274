//! Application Configuration
//!
//! Scanner settings stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Card catalog settings
    pub catalog: CatalogSettings,
    /// OCR program settings
    pub ocr: OcrSettings,
    /// Search tuning
    pub search: SearchSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Where the card catalog is read from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// JSON set list; defaults to `AllSets.json` in the data directory
    pub path: Option<PathBuf>,
}

/// OCR program settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Executable to run
    pub program: PathBuf,
    /// Tesseract language code
    pub language: String,
    /// Tesseract page segmentation mode (7 = single text line)
    pub page_segmentation_mode: u32,
    /// Alternate tessdata directory
    pub tessdata_dir: Option<PathBuf>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            page_segmentation_mode: 7,
            tessdata_dir: None,
        }
    }
}

/// Search tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Raw edit distance below which a match ends the search immediately
    pub short_circuit_distance: f64,
    /// Smallest card side, in pixels, worth reading
    pub min_card_side: f32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            short_circuit_distance: 1.0,
            min_card_side: 500.0,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Maximum level: error, warn, info, debug or trace
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write config {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert!(config.catalog.path.is_none());

        assert_eq!(config.ocr.program, PathBuf::from("tesseract"));
        assert_eq!(config.ocr.language, "eng");
        assert_eq!(config.ocr.page_segmentation_mode, 7);
        assert!(config.ocr.tessdata_dir.is_none());

        assert!((config.search.short_circuit_distance - 1.0).abs() < f64::EPSILON);
        assert!((config.search.min_card_side - 500.0).abs() < 0.01);

        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.catalog.path = Some(PathBuf::from("/data/AllSets.json"));
        config.ocr.tessdata_dir = Some(PathBuf::from("./tessdata"));
        config.search.short_circuit_distance = 0.5;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.catalog.path, config.catalog.path);
        assert_eq!(parsed.ocr.tessdata_dir, config.ocr.tessdata_dir);
        assert!((parsed.search.short_circuit_distance - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str("[ocr]\nlanguage = \"fra\"\n").unwrap();

        assert_eq!(parsed.ocr.language, "fra");
        assert_eq!(parsed.ocr.page_segmentation_mode, 7);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.logging.level = "debug".to_string();

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(loaded.logging.level, "debug");
        assert_eq!(loaded.ocr.program, config.ocr.program);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
