//! Vision Layer
//!
//! Locates trading cards in a photo and reads their names:
//! - [`card_field`] finds card-shaped outlines in the scene
//! - [`card_image`] finds the title on each card
//! - [`title`] reads the title with OCR and ranks it against the catalog

pub mod card_field;
pub mod card_image;
pub mod contour_cache;
pub mod contours;
pub mod edges;
pub mod image;
pub mod levenshtein;
pub mod observer;
pub mod ocr;
pub mod params;
pub mod symbol;
pub mod title;

use std::sync::Arc;
use std::time::Instant;

use ::image::DynamicImage;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::config::SearchSettings;
use crate::error::ScanResult;

pub use card_field::{CardField, CardFieldConfig, FindCards};
pub use card_image::{LocatedItem, TitleSearchConfig};
pub use self::image::DerivedImage;
pub use levenshtein::MatchResult;
pub use observer::{DumpObserver, ImageKind, ImageObserver, NoopObserver, Observation, TracingObserver};
pub use ocr::{TesseractOcr, TextRecognizer};
pub use params::{BinarizeParams, EdgeParams, GradientNorm, KernelSize};
pub use title::{NameRegion, TitleReadConfig};

/// Shared, read-only collaborators of one search
#[derive(Clone, Copy)]
pub struct SearchContext<'a> {
    pub catalog: &'a Catalog,
    pub ocr: &'a dyn TextRecognizer,
    pub observer: &'a dyn ImageObserver,
}

/// Configuration for the scanning pipeline
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    pub field: CardFieldConfig,
    pub title: TitleSearchConfig,
}

impl ScannerConfig {
    /// Default search grids with the tunables from the settings file
    pub fn from_settings(settings: &SearchSettings) -> Self {
        let mut config = Self::default();
        config.field.min_side = settings.min_card_side;
        config.title.read.short_circuit_distance = settings.short_circuit_distance;
        config
    }
}

/// Card scanning pipeline
pub struct CardScanner {
    catalog: Arc<Catalog>,
    ocr: Box<dyn TextRecognizer>,
    observer: Box<dyn ImageObserver>,
    config: ScannerConfig,
}

impl CardScanner {
    /// Create a scanner with the default search grids
    pub fn new(catalog: Arc<Catalog>, ocr: Box<dyn TextRecognizer>) -> Self {
        Self::with_config(catalog, ocr, ScannerConfig::default())
    }

    pub fn with_config(catalog: Arc<Catalog>, ocr: Box<dyn TextRecognizer>, config: ScannerConfig) -> Self {
        info!("Card scanner ready with {} catalog entries", catalog.len());
        Self {
            catalog,
            ocr,
            observer: Box::new(NoopObserver),
            config,
        }
    }

    /// Report intermediate images to `observer`
    pub fn with_observer(mut self, observer: Box<dyn ImageObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    fn context(&self) -> SearchContext<'_> {
        SearchContext {
            catalog: &self.catalog,
            ocr: self.ocr.as_ref(),
            observer: self.observer.as_ref(),
        }
    }

    /// Locate and read the first card in a photo
    pub fn scan(&self, image: &DynamicImage) -> ScanResult<Option<LocatedItem>> {
        let start = Instant::now();
        let scan_id = Uuid::new_v4();
        if is_empty(image) {
            debug!("Scan {} skipped an empty {}x{} image", scan_id, image.width(), image.height());
            return Ok(None);
        }
        let mut field = CardField::new(DerivedImage::from_dynamic(image)?);

        let item = field
            .find_cards(scan_id, self.context(), &self.config.field, &self.config.title)
            .next()
            .transpose()?;

        match &item {
            Some(card) => info!(
                "Scan {} found {:?} ({:.0}%) in {:?}",
                scan_id,
                card.name(),
                card.confidence(),
                start.elapsed()
            ),
            None => info!("Scan {} found no card in {:?}", scan_id, start.elapsed()),
        }
        Ok(item)
    }

    /// Locate and read every card in a photo
    pub fn scan_all(&self, image: &DynamicImage) -> ScanResult<Vec<LocatedItem>> {
        let start = Instant::now();
        let scan_id = Uuid::new_v4();
        if is_empty(image) {
            debug!("Scan {} skipped an empty {}x{} image", scan_id, image.width(), image.height());
            return Ok(Vec::new());
        }
        let mut field = CardField::new(DerivedImage::from_dynamic(image)?);

        let items = field
            .find_cards(scan_id, self.context(), &self.config.field, &self.config.title)
            .collect::<ScanResult<Vec<_>>>()?;

        debug!("Names: {:?}", items.iter().map(LocatedItem::name).collect::<Vec<_>>());
        info!("Scan {} found {} card(s) in {:?}", scan_id, items.len(), start.elapsed());
        Ok(items)
    }
}

/// A scene without pixels holds no cards
fn is_empty(image: &DynamicImage) -> bool {
    image.width() == 0 || image.height() == 0
}
