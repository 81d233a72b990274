//! Card title search
//!
//! A candidate card is rotated through a small grid of angles around upright
//! and upside down. At each angle its outlines are tested against two title
//! layouts: a boxed name bar near the top, or a name printed above the art
//! box. Every title found is read, and the best reading wins.

use image::RgbImage;
use tracing::debug;
use uuid::Uuid;

use super::contour_cache::ContourCache;
use super::contours::{OrientedBox, PixelRect};
use super::image::{crop_rect, DerivedImage};
use super::levenshtein::distinct_names;
use super::observer::{ImageKind, ImageObserver, Observation, ObservedImage};
use super::params::{EdgeParams, GradientNorm};
use super::symbol::symbol_rect;
use super::title::{read_title, NameRegion, TitleReadConfig};
use super::SearchContext;
use crate::catalog::FrameEra;
use crate::error::ScanResult;

/// Test angles in degrees: upright, upside down, and half-degree skews of both
const TITLE_ANGLES: [f64; 10] = [0.0, 180.0, 359.5, 0.5, 180.5, 179.5, 359.0, 1.0, 181.0, 179.0];

/// Height-to-width ratios accepted for a title outline; candidates are tried
/// closest to the middle first
const MIN_TITLE_ASPECT: f64 = 0.84;
const MAX_TITLE_ASPECT: f64 = 1.0;

/// Settings for locating a title on a card
#[derive(Debug, Clone)]
pub struct TitleSearchConfig {
    pub angles: Vec<f64>,
    pub edges: Vec<EdgeParams>,
    pub read: TitleReadConfig,
}

impl Default for TitleSearchConfig {
    fn default() -> Self {
        Self {
            angles: TITLE_ANGLES.to_vec(),
            edges: vec![
                EdgeParams::sobel3(200.0, 100.0, GradientNorm::L2),
                EdgeParams::sobel3(100.0, 50.0, GradientNorm::L2),
                EdgeParams::sobel3(150.0, 75.0, GradientNorm::L2),
                EdgeParams::sobel3(250.0, 125.0, GradientNorm::L2),
            ],
            read: TitleReadConfig::default(),
        }
    }
}

/// An outline accepted as a title location
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TitleCandidate {
    pub era: FrameEra,
    /// Region to read, in rotated-card coordinates
    pub title: PixelRect,
    /// Art box the title was placed above, for unboxed titles
    pub art: Option<PixelRect>,
}

fn title_sort_key(oriented: &OrientedBox) -> f64 {
    if oriented.width <= 0.0 {
        return f64::INFINITY;
    }
    let optimal = (MAX_TITLE_ASPECT - MIN_TITLE_ASPECT) / 2.0 + MIN_TITLE_ASPECT;
    ((oriented.height / oriented.width) as f64 - optimal).abs()
}

/// Test an outline against the boxed-title and above-art layouts
pub fn classify_title_box(oriented: &OrientedBox, card_width: u32, card_height: u32) -> Option<TitleCandidate> {
    if oriented.height < 1.0 {
        return None;
    }

    let rect = oriented.bounding_rect();
    if !rect.fits_within(card_width, card_height) {
        return None;
    }

    let (w, h) = (card_width as f64, card_height as f64);
    let relative_center_y = oriented.center.1 as f64 / h;

    if relative_center_y < 0.15 {
        // Name bar boxed across the top of the card
        let width_ratio = rect.width as f64 / w;
        let height_ratio = oriented.height as f64 / h;
        if width_ratio < 0.80 || !(0.048..=0.077).contains(&height_ratio) {
            return None;
        }

        debug!(
            "Boxed title at ({:.0}, {:.0}) {}x{}",
            oriented.center.0, oriented.center.1, rect.width, rect.height
        );
        Some(TitleCandidate {
            era: FrameEra::M15,
            title: rect,
            art: None,
        })
    } else if relative_center_y < 0.50 {
        // The outline is the art box; the name sits between it and the top
        let aspect = rect.height as f64 / rect.width as f64;
        let relative_area = rect.area() as f64 / (w * h);
        if !(0.75..=0.85).contains(&aspect) || relative_area < 0.35 {
            return None;
        }

        let border = (rect.y as f64 * 0.45) as i32;
        let title = PixelRect::new(rect.x, border, rect.width, rect.y - border);
        let height_ratio = title.height as f64 / h;
        if !(0.050..=0.065).contains(&height_ratio) {
            return None;
        }

        debug!(
            "Title above art at ({}, {}) {}x{}",
            title.x, title.y, title.width, title.height
        );
        Some(TitleCandidate {
            era: FrameEra::Original,
            title,
            art: Some(rect),
        })
    } else {
        None
    }
}

/// Pick the region whose name alone reaches the minimum distance
///
/// `None` when no region matched anything or when several names tie.
fn select_title(candidates: Vec<NameRegion>) -> Option<NameRegion> {
    let min = candidates
        .iter()
        .filter_map(NameRegion::best_distance)
        .min_by(|a, b| a.total_cmp(b))?;

    let best: Vec<_> = candidates
        .iter()
        .flat_map(|c| c.matches.iter())
        .filter(|m| m.normalized == min)
        .cloned()
        .collect();

    let name = match distinct_names(&best).as_slice() {
        [name] => name.to_string(),
        names => {
            debug!("No single title: {} name(s) at {:.3}", names.len(), min);
            return None;
        }
    };

    let mut winner = candidates
        .into_iter()
        .find(|c| c.matches.iter().any(|m| m.name() == name))?;
    winner.matches.retain(|m| m.name() == name && m.normalized == min);
    Some(winner)
}

/// Search a card crop for its title and read it
///
/// `center` is where the card sits in the scene and is only reported to the
/// observer.
pub fn find_best_title(
    card: &mut DerivedImage,
    card_id: Uuid,
    center: (f32, f32),
    ctx: SearchContext<'_>,
    config: &TitleSearchConfig,
) -> ScanResult<Option<NameRegion>> {
    let (width, height) = (card.width(), card.height());
    let mut visited = ContourCache::new();
    let mut candidates: Vec<NameRegion> = Vec::new();

    for &angle in &config.angles {
        for params in &config.edges {
            debug!("Title search {} at {}°", params, angle);

            if ctx.observer.enabled() {
                let contoured = card.contoured(angle, params)?;
                ctx.observer.observe(
                    &Observation::new(ImageKind::CardContoured, ObservedImage::Rgb(&contoured), card_id)
                        .angle(angle)
                        .center(center.0, center.1)
                        .edges(*params),
                );
            }

            let mut boundaries = card.boundaries(angle, params)?;
            boundaries.sort_by(|a, b| title_sort_key(&a.oriented).total_cmp(&title_sort_key(&b.oriented)));

            for boundary in boundaries {
                if !visited.insert(&boundary.oriented, angle) {
                    continue;
                }
                let Some(candidate) = classify_title_box(&boundary.oriented, width, height) else {
                    continue;
                };
                let Some(title_image) = card.crop_rotated(angle, &candidate.title)? else {
                    continue;
                };

                let region_id = Uuid::new_v4();
                let title = candidate.title;
                ctx.observer.observe(
                    &Observation::new(ImageKind::TitleCropped, ObservedImage::Rgb(&title_image), card_id)
                        .region(region_id)
                        .angle(angle)
                        .center(title.x as f32, title.y as f32)
                        .edges(*params),
                );

                if let Some(art) = candidate.art {
                    if let Some(art_image) = card.crop_rotated(angle, &art)? {
                        ctx.observer.observe(
                            &Observation::new(ImageKind::ArtCropped, ObservedImage::Rgb(&art_image), card_id)
                                .region(region_id)
                                .angle(angle)
                                .center(art.x as f32, art.y as f32)
                                .edges(*params),
                        );
                    }
                }

                let mut region = DerivedImage::new(title_image.clone())?;
                let matches = read_title(&mut region, candidate.era, card_id, region_id, ctx, &config.read)?;
                region.release();

                if matches.is_empty() {
                    continue;
                }

                let short_circuit = matches
                    .iter()
                    .any(|m| m.distance < config.read.short_circuit_distance);
                let name_region = NameRegion {
                    id: region_id,
                    image: title_image,
                    era: candidate.era,
                    angle,
                    bounds: title,
                    matches,
                };

                if short_circuit {
                    return Ok(Some(name_region));
                }
                candidates.push(name_region);
            }
        }
    }

    debug!("Title search found {} candidate region(s)", candidates.len());
    Ok(select_title(candidates))
}

/// A card found in a scene, with its title read
#[derive(Debug)]
pub struct LocatedItem {
    pub id: Uuid,
    /// Identifier of the scan that produced the card
    pub scan_id: Uuid,
    /// Card crop with its long side vertical
    pub image: DerivedImage,
    /// Rotation, in degrees, that turns `image` upright
    pub angle: f64,
    /// Card center in scene coordinates
    pub center: (f32, f32),
    pub title: NameRegion,
}

impl LocatedItem {
    pub fn name(&self) -> Option<&str> {
        self.title.name()
    }

    pub fn confidence(&self) -> f64 {
        self.title.confidence()
    }

    pub fn era(&self) -> FrameEra {
        self.title.era
    }

    /// The card crop rotated upright
    pub fn upright_image(&mut self) -> ScanResult<RgbImage> {
        self.image.rotated(self.angle)
    }

    /// Crop of the expansion-symbol area of the upright card
    pub fn set_symbol_region(&mut self, observer: &dyn ImageObserver) -> ScanResult<Option<RgbImage>> {
        let upright = self.upright_image()?;
        let rect = symbol_rect(self.era(), upright.width(), upright.height());
        let symbol = crop_rect(&upright, &rect);

        if let Some(symbol) = &symbol {
            observer.observe(
                &Observation::new(ImageKind::SetSymbol, ObservedImage::Rgb(symbol), self.scan_id)
                    .region(self.id)
                    .angle(self.angle)
                    .center(
                        rect.x as f32 + rect.width as f32 / 2.0,
                        rect.y as f32 + rect.height as f32 / 2.0,
                    ),
            );
        }
        Ok(symbol)
    }
}
