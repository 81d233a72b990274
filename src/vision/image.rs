//! Derived-image cache
//!
//! [`DerivedImage`] owns one source raster and lazily computes rotated,
//! grayscale, edge, threshold, OCR-filtered and contoured variants of it.
//! Every variant lives in a single-slot cache keyed by the parameters that
//! produced it: asking again with the same parameters is free, asking with
//! different ones replaces the slot. Public accessors hand out copies.

use image::imageops::{crop_imm, grayscale};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

use super::contours::{draw_boundaries, trace_boundaries, Boundary, PixelRect};
use super::edges::detect_edges;
use super::params::{BinarizeParams, EdgeParams};
use crate::catalog::FrameEra;
use crate::error::{ScanError, ScanResult};

/// Outlines smaller than this are left off contoured renderings
const CONTOURED_MIN_AREA: f32 = 5000.0;

/// Hit/miss counters of one cache slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// Representation kinds held by a [`DerivedImage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    Rotated,
    Gray,
    Edges,
    Threshold,
    Filtered,
    Contoured,
}

/// Single-slot cache: one value and the key that produced it
#[derive(Debug)]
struct CachedImage<K, I> {
    slot: Option<(K, I)>,
    stats: CacheStats,
}

impl<K: PartialEq, I> CachedImage<K, I> {
    fn new() -> Self {
        Self {
            slot: None,
            stats: CacheStats::default(),
        }
    }

    /// Whether the slot holds a value for `key`; counts a hit or a miss
    fn is_current(&mut self, key: &K) -> bool {
        let current = matches!(&self.slot, Some((k, _)) if k == key);
        if current {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        current
    }

    fn store(&mut self, key: K, value: I) {
        self.slot = Some((key, value));
    }

    fn current(&self) -> Option<&I> {
        self.slot.as_ref().map(|(_, value)| value)
    }

    /// Drop the value; returns how many were freed (0 or 1)
    fn release(&mut self) -> usize {
        self.slot.take().map_or(0, |_| 1)
    }
}

/// What an edge map was computed from
#[derive(Debug, Clone, Copy, PartialEq)]
enum EdgeSource {
    Gray,
    Threshold(BinarizeParams),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct EdgeKey {
    angle: f64,
    source: EdgeSource,
    params: EdgeParams,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FilterKey {
    era: FrameEra,
    angle: f64,
    binarize: BinarizeParams,
    edges: EdgeParams,
}

/// A source raster and its memoized derived representations
#[derive(Debug)]
pub struct DerivedImage {
    source: RgbImage,
    rotated: CachedImage<f64, RgbImage>,
    gray: CachedImage<f64, GrayImage>,
    edges: CachedImage<EdgeKey, GrayImage>,
    threshold: CachedImage<(f64, BinarizeParams), GrayImage>,
    filtered: CachedImage<FilterKey, GrayImage>,
    contoured: CachedImage<(f64, EdgeParams), RgbImage>,
    released: bool,
}

impl DerivedImage {
    pub fn new(source: RgbImage) -> ScanResult<Self> {
        let (width, height) = source.dimensions();
        if width == 0 || height == 0 {
            return Err(ScanError::EmptyImage { width, height });
        }

        Ok(Self {
            source,
            rotated: CachedImage::new(),
            gray: CachedImage::new(),
            edges: CachedImage::new(),
            threshold: CachedImage::new(),
            filtered: CachedImage::new(),
            contoured: CachedImage::new(),
            released: false,
        })
    }

    pub fn from_gray(source: &GrayImage) -> ScanResult<Self> {
        Self::new(DynamicImage::ImageLuma8(source.clone()).to_rgb8())
    }

    pub fn from_dynamic(source: &DynamicImage) -> ScanResult<Self> {
        Self::new(source.to_rgb8())
    }

    pub fn width(&self) -> u32 {
        self.source.width()
    }

    pub fn height(&self) -> u32 {
        self.source.height()
    }

    /// Width divided by height
    pub fn aspect_ratio(&self) -> f64 {
        self.width() as f64 / self.height() as f64
    }

    pub fn area(&self) -> f64 {
        self.width() as f64 * self.height() as f64
    }

    fn ensure_live(&self) -> ScanResult<()> {
        if self.released {
            Err(ScanError::Released)
        } else {
            Ok(())
        }
    }

    /// Copy of the source raster
    pub fn source(&self) -> ScanResult<RgbImage> {
        self.ensure_live()?;
        Ok(self.source.clone())
    }

    pub(crate) fn source_ref(&self) -> &RgbImage {
        &self.source
    }

    fn rotated_ref(&mut self, angle: f64) -> ScanResult<&RgbImage> {
        if !(0.0..360.0).contains(&angle) {
            return Err(ScanError::InvalidAngle(angle));
        }
        self.ensure_live()?;

        if !self.rotated.is_current(&angle) {
            let rotated = rotate(&self.source, angle);
            self.rotated.store(angle, rotated);
        }
        self.rotated.current().ok_or(ScanError::Released)
    }

    fn gray_ref(&mut self, angle: f64) -> ScanResult<&GrayImage> {
        // Validate before touching the gray slot so bad angles leave no trace
        self.rotated_ref(angle)?;

        if !self.gray.is_current(&angle) {
            let gray = grayscale(self.rotated_ref(angle)?);
            self.gray.store(angle, gray);
        }
        self.gray.current().ok_or(ScanError::Released)
    }

    fn threshold_ref(&mut self, angle: f64, params: BinarizeParams) -> ScanResult<&GrayImage> {
        self.rotated_ref(angle)?;

        let key = (angle, params);
        if !self.threshold.is_current(&key) {
            let threshold = binarize_inverted(self.gray_ref(angle)?, params);
            self.threshold.store(key, threshold);
        }
        self.threshold.current().ok_or(ScanError::Released)
    }

    fn edges_ref(&mut self, angle: f64, source: EdgeSource, params: &EdgeParams) -> ScanResult<&GrayImage> {
        self.rotated_ref(angle)?;

        let key = EdgeKey {
            angle,
            source,
            params: *params,
        };
        if !self.edges.is_current(&key) {
            let edges = match source {
                EdgeSource::Gray => detect_edges(self.gray_ref(angle)?, params),
                EdgeSource::Threshold(binarize) => detect_edges(self.threshold_ref(angle, binarize)?, params),
            };
            self.edges.store(key, edges);
        }
        self.edges.current().ok_or(ScanError::Released)
    }

    /// Source rotated counter-clockwise about its center by `angle` degrees,
    /// which must lie in [0, 360)
    pub fn rotated(&mut self, angle: f64) -> ScanResult<RgbImage> {
        self.rotated_ref(angle).cloned()
    }

    /// Grayscale of the rotated source
    pub fn gray(&mut self, angle: f64) -> ScanResult<GrayImage> {
        self.gray_ref(angle).cloned()
    }

    /// Edge map of the rotated grayscale image
    pub fn edges(&mut self, angle: f64, params: &EdgeParams) -> ScanResult<GrayImage> {
        self.edges_ref(angle, EdgeSource::Gray, params).cloned()
    }

    /// Edge map of a threshold map
    pub fn threshold_edges(&mut self, angle: f64, binarize: BinarizeParams, params: &EdgeParams) -> ScanResult<GrayImage> {
        self.edges_ref(angle, EdgeSource::Threshold(binarize), params).cloned()
    }

    /// Inverted binarization of the rotated grayscale image
    pub fn threshold(&mut self, angle: f64, params: BinarizeParams) -> ScanResult<GrayImage> {
        self.threshold_ref(angle, params).cloned()
    }

    /// Region of the rotated source, clipped to the image
    pub fn crop_rotated(&mut self, angle: f64, rect: &PixelRect) -> ScanResult<Option<RgbImage>> {
        Ok(crop_rect(self.rotated_ref(angle)?, rect))
    }

    /// Region of the rotated grayscale image, clipped to the image
    pub fn crop_gray(&mut self, angle: f64, rect: &PixelRect) -> ScanResult<Option<GrayImage>> {
        Ok(crop_rect(self.gray_ref(angle)?, rect))
    }

    /// Outlines traced in the grayscale edge map
    pub fn boundaries(&mut self, angle: f64, params: &EdgeParams) -> ScanResult<Vec<Boundary>> {
        Ok(trace_boundaries(self.edges_ref(angle, EdgeSource::Gray, params)?))
    }

    /// Threshold map reduced to what OCR should read for a frame era
    ///
    /// For boxed titles only glyph-sized outlines of the threshold map are
    /// kept, over black. Other eras keep the whole threshold map.
    pub fn filtered(
        &mut self,
        era: FrameEra,
        angle: f64,
        binarize: BinarizeParams,
        edges: &EdgeParams,
    ) -> ScanResult<GrayImage> {
        self.rotated_ref(angle)?;

        let key = FilterKey {
            era,
            angle,
            binarize,
            edges: *edges,
        };
        if !self.filtered.is_current(&key) {
            let filtered = if era == FrameEra::M15 {
                let boundaries = trace_boundaries(self.edges_ref(angle, EdgeSource::Threshold(binarize), edges)?);
                keep_glyphs(self.threshold_ref(angle, binarize)?, &boundaries)
            } else {
                self.threshold_ref(angle, binarize)?.clone()
            };
            self.filtered.store(key, filtered);
        }
        self.filtered.current().cloned().ok_or(ScanError::Released)
    }

    /// Grayscale image with every large traced outline drawn on it
    pub fn contoured(&mut self, angle: f64, params: &EdgeParams) -> ScanResult<RgbImage> {
        self.rotated_ref(angle)?;

        let key = (angle, *params);
        if !self.contoured.is_current(&key) {
            let boundaries = self.boundaries(angle, params)?;
            let canvas = draw_boundaries(self.gray_ref(angle)?, &boundaries, CONTOURED_MIN_AREA);
            self.contoured.store(key, canvas);
        }
        self.contoured.current().cloned().ok_or(ScanError::Released)
    }

    pub fn stats(&self, representation: Representation) -> CacheStats {
        match representation {
            Representation::Rotated => self.rotated.stats,
            Representation::Gray => self.gray.stats,
            Representation::Edges => self.edges.stats,
            Representation::Threshold => self.threshold.stats,
            Representation::Filtered => self.filtered.stats,
            Representation::Contoured => self.contoured.stats,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Free every materialized representation. Returns how many were freed;
    /// releasing again frees nothing.
    pub fn release(&mut self) -> usize {
        if self.released {
            return 0;
        }
        self.released = true;

        self.rotated.release()
            + self.gray.release()
            + self.edges.release()
            + self.threshold.release()
            + self.filtered.release()
            + self.contoured.release()
    }
}

/// Counter-clockwise rotation about the center, bicubic, black fill
fn rotate(source: &RgbImage, angle: f64) -> RgbImage {
    if angle == 0.0 {
        return source.clone();
    }
    // imageproc turns clockwise for positive theta
    rotate_about_center(
        source,
        -(angle as f32).to_radians(),
        Interpolation::Bicubic,
        Rgb([0, 0, 0]),
    )
}

/// Copy of `rect` clipped to the image; `None` when nothing is left
pub(crate) fn crop_rect<P>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
    rect: &PixelRect,
) -> Option<ImageBuffer<P, Vec<P::Subpixel>>>
where
    P: Pixel + 'static,
{
    let x0 = rect.x.max(0) as i64;
    let y0 = rect.y.max(0) as i64;
    let x1 = (rect.right() as i64).min(image.width() as i64);
    let y1 = (rect.bottom() as i64).min(image.height() as i64);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(crop_imm(image, x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32).to_image())
}

/// Pixels above the cutoff become 0, the rest the ceiling
pub(crate) fn binarize_inverted(gray: &GrayImage, params: BinarizeParams) -> GrayImage {
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > params.cutoff { 0 } else { params.ceiling };
    }
    out
}

/// Whether an outline's bounds look like one title glyph
fn is_glyph_box(rect: &PixelRect, width: u32, height: u32) -> bool {
    let (w, h) = (width as f64, height as f64);
    let rel_x = rect.x as f64 / w;
    let rel_y = rect.y as f64 / h;
    let rel_right = rect.right() as f64 / w;
    let rel_bottom = rect.bottom() as f64 / h;
    let rel_width = rect.width as f64 / w;
    let rel_height = rect.height as f64 / h;

    rel_y > 0.10
        && rel_y < 0.80
        && rel_bottom > 0.30
        && rel_bottom < 0.95
        && rel_right > 0.025
        && rel_x < 0.95
        && rel_width < 0.09
        && rel_height > 0.07
}

/// Copy glyph-sized regions of the threshold map onto black
fn keep_glyphs(threshold: &GrayImage, boundaries: &[Boundary]) -> GrayImage {
    let (width, height) = threshold.dimensions();
    let mut out = GrayImage::from_pixel(width, height, Luma([0]));

    for rect in boundaries
        .iter()
        .map(Boundary::pixel_bounds)
        .filter(|r| is_glyph_box(r, width, height))
    {
        let x0 = rect.x.max(0) as u32;
        let y0 = rect.y.max(0) as u32;
        let x1 = (rect.right().max(0) as u32).min(width);
        let y1 = (rect.bottom().max(0) as u32).min(height);
        for y in y0..y1 {
            for x in x0..x1 {
                out.put_pixel(x, y, *threshold.get_pixel(x, y));
            }
        }
    }

    out
}
