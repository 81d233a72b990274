//! Expansion-symbol placement priors

use super::contours::PixelRect;
use crate::catalog::FrameEra;

/// Edges of the symbol area as fractions of the upright card
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolMargins {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

pub fn symbol_margins(era: FrameEra) -> SymbolMargins {
    match era {
        FrameEra::Original => SymbolMargins {
            left: 0.77,
            right: 0.925,
            top: 0.558,
            bottom: 0.605,
        },
        FrameEra::Modern => SymbolMargins {
            left: 0.80,
            right: 0.948,
            top: 0.573,
            bottom: 0.62,
        },
        FrameEra::M15 => SymbolMargins {
            left: 0.820,
            right: 0.943,
            top: 0.573,
            bottom: 0.615,
        },
    }
}

/// Pixel bounds of the symbol area on a `width` x `height` card
pub fn symbol_rect(era: FrameEra, width: u32, height: u32) -> PixelRect {
    let margins = symbol_margins(era);
    let (w, h) = (width as f64, height as f64);

    let x = (margins.left * w) as i32;
    let y = (margins.top * h) as i32;
    let right = (margins.right * w) as i32;
    let bottom = (margins.bottom * h) as i32;
    PixelRect::new(x, y, right - x, bottom - y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_rect_m15() {
        let rect = symbol_rect(FrameEra::M15, 1000, 1000);
        assert_eq!(rect, PixelRect::new(820, 573, 123, 42));
    }

    #[test]
    fn test_symbol_rect_inside_card() {
        for era in [FrameEra::Original, FrameEra::Modern, FrameEra::M15] {
            let rect = symbol_rect(era, 630, 880);
            assert!(rect.fits_within(630, 880), "{:?} {:?}", era, rect);
        }
    }
}
