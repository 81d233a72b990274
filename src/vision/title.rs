//! Title reading
//!
//! A candidate name region is binarized at several cutoffs, reduced to the
//! pixels OCR should see, and read as-is, eroded and dilated. Every reading is
//! ranked against the catalog with the OCR-aware edit distance.

use std::borrow::Cow;

use image::imageops::{crop_imm, replace};
use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use tracing::{debug, warn};
use uuid::Uuid;

use super::contours::PixelRect;
use super::image::DerivedImage;
use super::levenshtein::{closest_entries, confidence, keep_minimum, resolved_name, MatchResult};
use super::observer::{ImageKind, Observation, ObservedImage};
use super::params::{BinarizeParams, EdgeParams, GradientNorm};
use super::SearchContext;
use crate::catalog::FrameEra;
use crate::error::ScanResult;

/// Binarization cutoffs tried on every title, darkest first
const CUTOFFS: [u8; 5] = [75, 100, 130, 170, 200];

/// Settings for reading one title region
#[derive(Debug, Clone)]
pub struct TitleReadConfig {
    pub binarize: Vec<BinarizeParams>,
    /// Edge settings used to find glyph outlines in each threshold map
    pub edges: Vec<EdgeParams>,
    /// Raw distance below which a reading is accepted without further attempts
    pub short_circuit_distance: f64,
}

impl Default for TitleReadConfig {
    fn default() -> Self {
        Self {
            binarize: CUTOFFS.iter().map(|&cutoff| BinarizeParams::new(cutoff, 255)).collect(),
            edges: vec![
                EdgeParams::sobel3(150.0, 75.0, GradientNorm::L2),
                EdgeParams::sobel3(200.0, 100.0, GradientNorm::L2),
                EdgeParams::sobel3(100.0, 50.0, GradientNorm::L2),
            ],
            short_circuit_distance: 1.0,
        }
    }
}

impl TitleReadConfig {
    /// Upper bound on recognizer calls for one region
    pub fn attempts(&self) -> usize {
        self.binarize.len() * self.edges.len() * Variant::ALL.len()
    }
}

/// A located card name and the catalog printings it matched
#[derive(Debug, Clone)]
pub struct NameRegion {
    pub id: Uuid,
    /// Title crop from the card rotated by `angle`
    pub image: RgbImage,
    pub era: FrameEra,
    /// Rotation of the card, in degrees, at which the title was found
    pub angle: f64,
    /// Title bounds within the rotated card
    pub bounds: PixelRect,
    pub matches: Vec<MatchResult>,
}

impl NameRegion {
    /// The matched name, when every match agrees on one
    pub fn name(&self) -> Option<&str> {
        resolved_name(&self.matches)
    }

    pub fn confidence(&self) -> f64 {
        confidence(&self.matches)
    }

    pub fn matches(&self) -> &[MatchResult] {
        &self.matches
    }

    /// Smallest normalized distance among the matches
    pub fn best_distance(&self) -> Option<f64> {
        self.matches
            .iter()
            .map(|m| m.normalized)
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// How a filtered rendering is altered before it is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    AsIs,
    Eroded,
    Dilated,
}

impl Variant {
    const ALL: [Variant; 3] = [Variant::AsIs, Variant::Eroded, Variant::Dilated];

    fn kind(self) -> ImageKind {
        match self {
            Variant::AsIs => ImageKind::TitleFiltered,
            Variant::Eroded => ImageKind::TitleEroded,
            Variant::Dilated => ImageKind::TitleDilated,
        }
    }
}

/// Value assumed outside the region during erosion and dilation. Boxed
/// titles sit on a light bar, older titles on dark art.
fn border_value(era: FrameEra) -> u8 {
    match era {
        FrameEra::M15 => 255,
        FrameEra::Original | FrameEra::Modern => 0,
    }
}

type MorphologyOp = fn(&GrayImage, Norm, u8) -> GrayImage;

/// Apply one 3x3 morphology pass with a constant border
fn morph(image: &GrayImage, border: u8, op: MorphologyOp) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut padded = GrayImage::from_pixel(width + 2, height + 2, Luma([border]));
    replace(&mut padded, image, 1, 1);

    let out = op(&padded, Norm::LInf, 1);
    crop_imm(&out, 1, 1, width, height).to_image()
}

pub(crate) fn erode(image: &GrayImage, border: u8) -> GrayImage {
    morph(image, border, morphology::erode)
}

pub(crate) fn dilate(image: &GrayImage, border: u8) -> GrayImage {
    morph(image, border, morphology::dilate)
}

/// Recognizer output with line breaks removed and surrounding blanks trimmed
fn clean_text(raw: &str) -> String {
    raw.replace(['\n', '\r'], "").trim().to_string()
}

/// Read a title region and rank the readings against the catalog
///
/// Returns the single match that ended the search early, or every match at
/// the minimum normalized distance over all readings. Recognizer failures
/// count as empty readings.
pub fn read_title(
    region: &mut DerivedImage,
    era: FrameEra,
    card_id: Uuid,
    region_id: Uuid,
    ctx: SearchContext<'_>,
    config: &TitleReadConfig,
) -> ScanResult<Vec<MatchResult>> {
    let border = border_value(era);
    let mut pooled: Vec<MatchResult> = Vec::new();

    for &binarize in &config.binarize {
        for edges in &config.edges {
            let filtered = region.filtered(era, 0.0, binarize, edges)?;

            for variant in Variant::ALL {
                let rendering: Cow<'_, GrayImage> = match variant {
                    Variant::AsIs => Cow::Borrowed(&filtered),
                    Variant::Eroded => Cow::Owned(erode(&filtered, border)),
                    Variant::Dilated => Cow::Owned(dilate(&filtered, border)),
                };

                ctx.observer.observe(
                    &Observation::new(variant.kind(), ObservedImage::Gray(&rendering), card_id)
                        .region(region_id)
                        .edges(*edges)
                        .binarize(binarize),
                );

                let text = match ctx.ocr.recognize(&rendering) {
                    Ok(raw) => clean_text(&raw),
                    Err(e) => {
                        warn!("OCR failed on title {}: {:#}", region_id, e);
                        continue;
                    }
                };
                if text.is_empty() {
                    continue;
                }

                let matches = closest_entries(ctx.catalog, &text, config.short_circuit_distance);
                debug!(
                    "Read {:?} ({} {} {:?}): {} match(es)",
                    text,
                    binarize,
                    edges,
                    variant,
                    matches.len()
                );

                if let Some(hit) = matches
                    .iter()
                    .find(|m| m.distance < config.short_circuit_distance)
                {
                    debug!("Short-circuit on {:?} at distance {:.2}", hit.name(), hit.distance);
                    return Ok(vec![hit.clone()]);
                }
                pooled.extend(matches);
            }
        }
    }

    Ok(keep_minimum(pooled))
}
