//! Card location in a scene
//!
//! The whole scene is tried as a card first. After that, outlines traced at a
//! sweep of edge settings are tested largest first; card-shaped ones are
//! straightened, cropped and handed to the title search. Cards are produced
//! lazily so a caller that needs one card stops the search early.

use std::collections::VecDeque;

use image::imageops::rotate90;
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate, Interpolation};
use tracing::debug;
use uuid::Uuid;

use super::card_image::{find_best_title, LocatedItem, TitleSearchConfig};
use super::contour_cache::ContourCache;
use super::contours::{Boundary, OrientedBox, PixelRect};
use super::image::{crop_rect, DerivedImage};
use super::observer::{ImageKind, Observation, ObservedImage};
use super::params::{EdgeParams, GradientNorm};
use super::SearchContext;
use crate::error::ScanResult;

/// Hysteresis threshold pairs swept over the scene, strongest first
const FIELD_THRESHOLDS: [(f64, f64); 5] = [(250.0, 125.0), (170.0, 85.0), (200.0, 100.0), (100.0, 50.0), (50.0, 0.0)];

/// Settings for locating cards in a scene
#[derive(Debug, Clone)]
pub struct CardFieldConfig {
    pub edges: Vec<EdgeParams>,
    /// Shortest accepted card side, in pixels
    pub min_side: f32,
    /// Accepted short-to-long side ratio, inclusive
    pub min_aspect: f64,
    pub max_aspect: f64,
}

impl Default for CardFieldConfig {
    fn default() -> Self {
        let edges = FIELD_THRESHOLDS
            .iter()
            .flat_map(|&(high, low)| {
                [
                    EdgeParams::sobel3(high, low, GradientNorm::L2),
                    EdgeParams::sobel3(high, low, GradientNorm::L1),
                ]
            })
            .collect();

        Self {
            edges,
            min_side: 500.0,
            min_aspect: 0.70,
            max_aspect: 0.81,
        }
    }
}

impl CardFieldConfig {
    pub fn is_card_aspect(&self, ratio: f64) -> bool {
        (self.min_aspect..=self.max_aspect).contains(&ratio)
    }
}

/// A scene that may contain cards
#[derive(Debug)]
pub struct CardField {
    id: Uuid,
    image: DerivedImage,
}

impl CardField {
    pub fn new(image: DerivedImage) -> Self {
        Self {
            id: Uuid::new_v4(),
            image,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn image(&self) -> &DerivedImage {
        &self.image
    }

    /// Lazily locate every card whose title can be read
    pub fn find_cards<'a>(
        &'a mut self,
        scan_id: Uuid,
        ctx: SearchContext<'a>,
        config: &'a CardFieldConfig,
        title_config: &'a TitleSearchConfig,
    ) -> FindCards<'a> {
        FindCards {
            field: self,
            scan_id,
            ctx,
            config,
            title_config,
            stage: Stage::WholeImage,
            next_params: 0,
            pending: VecDeque::new(),
            visited: ContourCache::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    WholeImage,
    Sweep,
    Done,
}

/// Iterator over the cards of a [`CardField`], in search order
pub struct FindCards<'a> {
    field: &'a mut CardField,
    scan_id: Uuid,
    ctx: SearchContext<'a>,
    config: &'a CardFieldConfig,
    title_config: &'a TitleSearchConfig,
    stage: Stage,
    next_params: usize,
    pending: VecDeque<Boundary>,
    visited: ContourCache,
}

impl FindCards<'_> {
    fn advance(&mut self) -> ScanResult<Option<LocatedItem>> {
        loop {
            match self.stage {
                Stage::WholeImage => {
                    self.stage = Stage::Sweep;

                    let image = &self.field.image;
                    if self.config.is_card_aspect(image.aspect_ratio()) {
                        debug!("Trying whole {}x{} image as a card", image.width(), image.height());
                        let center = (image.width() as f32 / 2.0, image.height() as f32 / 2.0);
                        let card = image.source()?;
                        if let Some(item) = self.locate(card, 0.0, center)? {
                            return Ok(Some(item));
                        }
                    }
                }
                Stage::Sweep => {
                    if let Some(boundary) = self.pending.pop_front() {
                        if !self.visited.insert(&boundary.oriented, 0.0) {
                            continue;
                        }
                        let Some(card) = self.crop_card(&boundary.oriented) else {
                            continue;
                        };
                        if let Some(item) = self.locate(card, boundary.oriented.angle as f64, boundary.oriented.center)? {
                            return Ok(Some(item));
                        }
                        continue;
                    }

                    let Some(params) = self.config.edges.get(self.next_params).copied() else {
                        self.stage = Stage::Done;
                        continue;
                    };
                    self.next_params += 1;
                    debug!("Card search {}", params);

                    if self.ctx.observer.enabled() {
                        let contoured = self.field.image.contoured(0.0, &params)?;
                        self.ctx.observer.observe(
                            &Observation::new(ImageKind::FieldContoured, ObservedImage::Rgb(&contoured), self.scan_id)
                                .region(self.field.id)
                                .edges(params),
                        );
                    }

                    let mut boundaries = self.field.image.boundaries(0.0, &params)?;
                    boundaries.sort_by(|a, b| b.oriented.area().total_cmp(&a.oriented.area()));
                    self.pending = boundaries.into();
                }
                Stage::Done => return Ok(None),
            }
        }
    }

    /// Straighten and cut out a card-shaped outline, long side vertical
    fn crop_card(&self, oriented: &OrientedBox) -> Option<RgbImage> {
        let (width, height) = (oriented.width, oriented.height);
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        if width < self.config.min_side || height < self.config.min_side {
            return None;
        }

        let (short, long) = (f64::from(width.min(height)), f64::from(width.max(height)));
        let ratio = short / long;
        if !self.config.is_card_aspect(ratio) {
            return None;
        }

        debug!(
            "Card outline at ({:.0}, {:.0}) {:.0}x{:.0} angle {:.1} ratio {:.3}",
            oriented.center.0, oriented.center.1, width, height, oriented.angle, ratio
        );

        let source = self.field.image.source_ref();
        let (cx, cy) = oriented.center;
        let rect = PixelRect::new(
            (cx - width / 2.0).round() as i32,
            (cy - height / 2.0).round() as i32,
            width.round() as i32,
            height.round() as i32,
        );

        let cropped = if oriented.angle.abs() < f32::EPSILON {
            crop_rect(source, &rect)?
        } else {
            // imageproc turns clockwise for positive theta
            let straightened = rotate(
                source,
                oriented.center,
                -oriented.angle.to_radians(),
                Interpolation::Bicubic,
                Rgb([0, 0, 0]),
            );
            crop_rect(&straightened, &rect)?
        };

        if cropped.width() > cropped.height() {
            Some(rotate90(&cropped))
        } else {
            Some(cropped)
        }
    }

    /// Search a card crop for its title
    fn locate(&mut self, card: RgbImage, angle: f64, center: (f32, f32)) -> ScanResult<Option<LocatedItem>> {
        self.ctx.observer.observe(
            &Observation::new(ImageKind::CardCropped, ObservedImage::Rgb(&card), self.scan_id)
                .region(self.field.id)
                .angle(angle)
                .center(center.0, center.1),
        );

        let mut image = DerivedImage::new(card)?;
        match find_best_title(&mut image, self.scan_id, center, self.ctx, self.title_config)? {
            Some(title) => {
                debug!("Card at ({:.0}, {:.0}) reads {:?}", center.0, center.1, title.name());
                Ok(Some(LocatedItem {
                    id: Uuid::new_v4(),
                    scan_id: self.scan_id,
                    image,
                    angle: title.angle,
                    center,
                    title,
                }))
            }
            None => {
                image.release();
                Ok(None)
            }
        }
    }
}

impl Iterator for FindCards<'_> {
    type Item = ScanResult<LocatedItem>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => {
                self.stage = Stage::Done;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, FrameEra};
    use crate::vision::observer::{ImageObserver, NoopObserver};
    use crate::vision::test_support::{boxed_title_card, card_in_scene, ScriptedOcr};
    use std::sync::Mutex;

    #[derive(Default)]
    struct KindLog(Mutex<Vec<ImageKind>>);

    impl ImageObserver for KindLog {
        fn observe(&self, observation: &Observation<'_>) {
            if let Ok(mut kinds) = self.0.lock() {
                kinds.push(observation.kind);
            }
        }
    }

    #[test]
    fn test_default_sweep() {
        let config = CardFieldConfig::default();
        assert_eq!(config.edges.len(), 10);
        assert_eq!(config.edges[0], EdgeParams::sobel3(250.0, 125.0, GradientNorm::L2));
        assert_eq!(config.edges[1], EdgeParams::sobel3(250.0, 125.0, GradientNorm::L1));
        assert_eq!(config.edges[9].low(), 0.0);
    }

    #[test]
    fn test_card_aspect_window_is_closed() {
        let config = CardFieldConfig::default();
        assert!(config.is_card_aspect(0.70));
        assert!(config.is_card_aspect(0.81));
        assert!(config.is_card_aspect(0.75));
        assert!(!config.is_card_aspect(0.699));
        assert!(!config.is_card_aspect(0.811));
    }

    #[test]
    fn test_crop_card_rejects_small_and_square() {
        let catalog = Catalog::from_names(&["Forest"]);
        let ocr = ScriptedOcr::text("Forest");
        let ctx = SearchContext {
            catalog: &catalog,
            ocr: &ocr,
            observer: &NoopObserver,
        };
        let (field_config, title_config) = (CardFieldConfig::default(), TitleSearchConfig::default());
        let mut field = CardField::new(DerivedImage::new(RgbImage::new(1000, 1000)).unwrap());
        let cards = field.find_cards(Uuid::new_v4(), ctx, &field_config, &title_config);

        assert!(cards.crop_card(&OrientedBox::new((500.0, 500.0), 300.0, 400.0, 0.0)).is_none());
        assert!(cards.crop_card(&OrientedBox::new((500.0, 500.0), 700.0, 700.0, 0.0)).is_none());
        assert!(cards.crop_card(&OrientedBox::new((500.0, 500.0), 0.0, 700.0, 0.0)).is_none());

        let card = cards.crop_card(&OrientedBox::new((500.0, 500.0), 600.0, 800.0, 0.0)).unwrap();
        assert_eq!(card.dimensions(), (600, 800));
    }

    #[test]
    fn test_crop_card_aspect_limits_are_inclusive() {
        let catalog = Catalog::from_names(&["Forest"]);
        let ocr = ScriptedOcr::text("Forest");
        let ctx = SearchContext {
            catalog: &catalog,
            ocr: &ocr,
            observer: &NoopObserver,
        };
        let (field_config, title_config) = (CardFieldConfig::default(), TitleSearchConfig::default());
        let mut field = CardField::new(DerivedImage::new(RgbImage::new(1200, 1200)).unwrap());
        let cards = field.find_cards(Uuid::new_v4(), ctx, &field_config, &title_config);

        for width in [700.0, 810.0] {
            let card = cards.crop_card(&OrientedBox::new((600.0, 600.0), width, 1000.0, 0.0));
            assert_eq!(card.map(|c| c.dimensions()), Some((width as u32, 1000)));
        }
        for width in [699.0, 811.0] {
            assert!(cards.crop_card(&OrientedBox::new((600.0, 600.0), width, 1000.0, 0.0)).is_none());
        }
        let landscape = cards.crop_card(&OrientedBox::new((600.0, 600.0), 1000.0, 700.0, 0.0));
        assert_eq!(landscape.map(|c| c.dimensions()), Some((700, 1000)));
    }

    #[test]
    fn test_crop_card_turns_landscape_upright() {
        let catalog = Catalog::from_names(&["Forest"]);
        let ocr = ScriptedOcr::text("Forest");
        let ctx = SearchContext {
            catalog: &catalog,
            ocr: &ocr,
            observer: &NoopObserver,
        };
        let (field_config, title_config) = (CardFieldConfig::default(), TitleSearchConfig::default());
        let mut field = CardField::new(DerivedImage::new(RgbImage::new(1000, 1000)).unwrap());
        let cards = field.find_cards(Uuid::new_v4(), ctx, &field_config, &title_config);

        let card = cards.crop_card(&OrientedBox::new((500.0, 500.0), 800.0, 600.0, 0.0)).unwrap();
        assert_eq!(card.dimensions(), (600, 800));
    }

    #[test]
    fn test_whole_image_card() {
        let catalog = Catalog::from_names(&["Forest", "Island", "Mountain"]);
        let ocr = ScriptedOcr::text("Forest");
        let observer = KindLog::default();
        let ctx = SearchContext {
            catalog: &catalog,
            ocr: &ocr,
            observer: &observer,
        };
        let (field_config, title_config) = (CardFieldConfig::default(), TitleSearchConfig::default());
        let mut field = CardField::new(DerivedImage::new(boxed_title_card()).unwrap());
        let scan_id = Uuid::new_v4();

        let item = field
            .find_cards(scan_id, ctx, &field_config, &title_config)
            .next()
            .unwrap()
            .unwrap();

        assert_eq!(item.name(), Some("Forest"));
        assert_eq!(item.era(), FrameEra::M15);
        assert_eq!(item.scan_id, scan_id);
        assert_eq!(item.center, (300.0, 400.0));
        assert_eq!(ocr.calls(), 1);

        let kinds = observer.0.lock().unwrap();
        assert_eq!(kinds[0], ImageKind::CardCropped);
        assert!(kinds.contains(&ImageKind::CardContoured));
        assert!(kinds.contains(&ImageKind::TitleCropped));
        assert!(kinds.contains(&ImageKind::TitleFiltered));
        assert!(!kinds.contains(&ImageKind::FieldContoured));
    }

    #[test]
    fn test_card_found_by_outline() {
        let catalog = Catalog::from_names(&["Forest", "Island", "Mountain"]);
        let ocr = ScriptedOcr::text("Island");
        let ctx = SearchContext {
            catalog: &catalog,
            ocr: &ocr,
            observer: &NoopObserver,
        };
        let (field_config, title_config) = (CardFieldConfig::default(), TitleSearchConfig::default());
        let mut field = CardField::new(DerivedImage::new(card_in_scene()).unwrap());

        let items: Vec<_> = field
            .find_cards(Uuid::new_v4(), ctx, &field_config, &title_config)
            .collect::<ScanResult<_>>()
            .unwrap();

        assert!(!items.is_empty());
        let item = &items[0];
        assert_eq!(item.name(), Some("Island"));
        assert_eq!(item.image.height(), 800);
        assert!((item.center.0 - 500.0).abs() < 2.0);
        assert!((item.center.1 - 500.0).abs() < 2.0);
    }

    #[test]
    fn test_blank_scene_has_no_cards() {
        let catalog = Catalog::from_names(&["Forest"]);
        let ocr = ScriptedOcr::text("Forest");
        let ctx = SearchContext {
            catalog: &catalog,
            ocr: &ocr,
            observer: &NoopObserver,
        };
        let (field_config, title_config) = (CardFieldConfig::default(), TitleSearchConfig::default());
        let mut field = CardField::new(DerivedImage::new(RgbImage::new(300, 300)).unwrap());

        assert!(field.find_cards(Uuid::new_v4(), ctx, &field_config, &title_config).next().is_none());
        assert_eq!(ocr.calls(), 0);
    }
}
