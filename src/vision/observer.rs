//! Debug observation sinks
//!
//! The search reports intermediate images (contoured maps, crops, filtered
//! title renderings) to an injected observer. Observers only look; they never
//! steer the search.

use anyhow::{Context, Result};
use image::{GrayImage, RgbImage};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};
use uuid::Uuid;

use super::params::{BinarizeParams, EdgeParams};

/// Pipeline stage that produced an observed image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    /// Scene with traced outlines drawn
    FieldContoured,
    /// Candidate card cut out of the scene
    CardCropped,
    /// Card with traced outlines drawn
    CardContoured,
    /// Candidate title region
    TitleCropped,
    /// Art box used to place an unboxed title
    ArtCropped,
    /// Title rendering prepared for OCR
    TitleFiltered,
    TitleEroded,
    TitleDilated,
    /// Expansion symbol region
    SetSymbol,
}

impl ImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::FieldContoured => "field_contoured",
            ImageKind::CardCropped => "card_cropped",
            ImageKind::CardContoured => "card_contoured",
            ImageKind::TitleCropped => "title_cropped",
            ImageKind::ArtCropped => "art_cropped",
            ImageKind::TitleFiltered => "title_filtered",
            ImageKind::TitleEroded => "title_eroded",
            ImageKind::TitleDilated => "title_dilated",
            ImageKind::SetSymbol => "set_symbol",
        }
    }
}

/// Borrowed pixels of an observation
#[derive(Debug, Clone, Copy)]
pub enum ObservedImage<'a> {
    Gray(&'a GrayImage),
    Rgb(&'a RgbImage),
}

impl ObservedImage<'_> {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            ObservedImage::Gray(image) => image.dimensions(),
            ObservedImage::Rgb(image) => image.dimensions(),
        }
    }
}

/// One reported intermediate image and where it came from
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub kind: ImageKind,
    pub image: ObservedImage<'a>,
    /// Card the image belongs to
    pub card_id: Uuid,
    /// Sub-region (title candidate) id, equal to `card_id` for card-level images
    pub region_id: Uuid,
    /// Rotation applied before the image was produced, in degrees
    pub angle: f64,
    /// Position of the region in its parent image
    pub center: (f32, f32),
    pub edges: Option<EdgeParams>,
    pub binarize: Option<BinarizeParams>,
}

impl<'a> Observation<'a> {
    pub fn new(kind: ImageKind, image: ObservedImage<'a>, card_id: Uuid) -> Self {
        Self {
            kind,
            image,
            card_id,
            region_id: card_id,
            angle: 0.0,
            center: (0.0, 0.0),
            edges: None,
            binarize: None,
        }
    }

    pub fn region(mut self, region_id: Uuid) -> Self {
        self.region_id = region_id;
        self
    }

    pub fn angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    pub fn center(mut self, x: f32, y: f32) -> Self {
        self.center = (x, y);
        self
    }

    pub fn edges(mut self, params: EdgeParams) -> Self {
        self.edges = Some(params);
        self
    }

    pub fn binarize(mut self, params: BinarizeParams) -> Self {
        self.binarize = Some(params);
        self
    }
}

/// Receiver of intermediate images
///
/// Called inline on the searching thread; implementations must return promptly.
pub trait ImageObserver: Send + Sync {
    /// When false the pipeline skips rendering debug-only images
    fn enabled(&self) -> bool {
        true
    }

    fn observe(&self, observation: &Observation<'_>);
}

/// Default sink that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ImageObserver for NoopObserver {
    fn enabled(&self) -> bool {
        false
    }

    fn observe(&self, _observation: &Observation<'_>) {}
}

/// Logs every observation at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ImageObserver for TracingObserver {
    fn observe(&self, observation: &Observation<'_>) {
        let (width, height) = observation.image.dimensions();
        debug!(
            kind = observation.kind.as_str(),
            card = %observation.card_id,
            region = %observation.region_id,
            angle = observation.angle,
            "{}x{} at ({:.0}, {:.0}) {} {}",
            width,
            height,
            observation.center.0,
            observation.center.1,
            observation.edges.map(|e| e.to_string()).unwrap_or_default(),
            observation.binarize.map(|b| b.to_string()).unwrap_or_default(),
        );
    }
}

/// Writes every observed image as a PNG into a directory
#[derive(Debug)]
pub struct DumpObserver {
    dir: PathBuf,
    counter: AtomicUsize,
}

impl DumpObserver {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create dump directory {:?}", dir))?;
        Ok(Self {
            dir,
            counter: AtomicUsize::new(0),
        })
    }

    fn file_name(&self, observation: &Observation<'_>) -> PathBuf {
        let index = self.counter.fetch_add(1, Ordering::Relaxed);
        let card = observation.card_id.simple().to_string();
        self.dir.join(format!(
            "{:05}_{}_{}.png",
            index,
            &card[..8],
            observation.kind.as_str()
        ))
    }
}

impl ImageObserver for DumpObserver {
    fn observe(&self, observation: &Observation<'_>) {
        let path = self.file_name(observation);
        let saved = match observation.image {
            ObservedImage::Gray(image) => image.save(&path),
            ObservedImage::Rgb(image) => image.save(&path),
        };
        if let Err(e) = saved {
            warn!("Failed to write {:?}: {}", path, e);
        }
    }
}
