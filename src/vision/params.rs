//! Edge detection and binarization parameter records
//!
//! These are the cache keys of the derived-image slots, so both are `Copy`
//! and compare by value.

use std::fmt;

use crate::error::{ScanError, ScanResult};

/// Derivative kernel used by the edge detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelSize {
    /// Sobel kernel of odd size 3, 5 or 7
    Sobel(u8),
    /// 3x3 Scharr kernel
    Auto,
}

impl KernelSize {
    pub fn sobel(size: u8) -> ScanResult<Self> {
        match size {
            3 | 5 | 7 => Ok(KernelSize::Sobel(size)),
            other => Err(ScanError::InvalidKernelSize(other)),
        }
    }

    /// Side length of the convolution window
    pub fn width(&self) -> usize {
        match self {
            KernelSize::Sobel(size) => *size as usize,
            KernelSize::Auto => 3,
        }
    }
}

/// How the per-pixel gradient magnitude is combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GradientNorm {
    /// |gx| + |gy|
    L1,
    /// sqrt(gx^2 + gy^2)
    L2,
}

/// Edge detector settings: hysteresis thresholds, gradient norm and kernel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeParams {
    high: f64,
    low: f64,
    norm: GradientNorm,
    kernel: KernelSize,
}

impl EdgeParams {
    /// Build a parameter set. The thresholds may be given in either order.
    pub fn new(threshold1: f64, threshold2: f64, norm: GradientNorm, kernel: KernelSize) -> ScanResult<Self> {
        if let KernelSize::Sobel(size) = kernel {
            KernelSize::sobel(size)?;
        }

        Ok(Self {
            high: threshold1.max(threshold2),
            low: threshold1.min(threshold2),
            norm,
            kernel,
        })
    }

    /// 3x3 Sobel parameters, which every built-in search uses
    pub(crate) fn sobel3(threshold1: f64, threshold2: f64, norm: GradientNorm) -> Self {
        Self {
            high: threshold1.max(threshold2),
            low: threshold1.min(threshold2),
            norm,
            kernel: KernelSize::Sobel(3),
        }
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn norm(&self) -> GradientNorm {
        self.norm
    }

    pub fn kernel(&self) -> KernelSize {
        self.kernel
    }
}

impl fmt::Display for EdgeParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kernel = match self.kernel {
            KernelSize::Sobel(size) => size.to_string(),
            KernelSize::Auto => "auto".to_string(),
        };
        write!(f, "edges({}/{} {:?} k{})", self.high, self.low, self.norm, kernel)
    }
}

/// Inverted binarization: pixels above `cutoff` become 0, the rest `ceiling`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BinarizeParams {
    pub cutoff: u8,
    pub ceiling: u8,
}

impl BinarizeParams {
    pub fn new(cutoff: u8, ceiling: u8) -> Self {
        Self { cutoff, ceiling }
    }
}

impl fmt::Display for BinarizeParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "threshold({}/{})", self.cutoff, self.ceiling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_sizes() {
        for size in [3u8, 5, 7] {
            assert_eq!(KernelSize::sobel(size).unwrap(), KernelSize::Sobel(size));
        }
        for size in [0u8, 1, 2, 4, 6, 9] {
            assert_eq!(KernelSize::sobel(size), Err(ScanError::InvalidKernelSize(size)));
        }
    }

    #[test]
    fn test_edge_params_validation() {
        assert!(EdgeParams::new(200.0, 100.0, GradientNorm::L2, KernelSize::Auto).is_ok());
        assert!(EdgeParams::new(200.0, 100.0, GradientNorm::L1, KernelSize::Sobel(7)).is_ok());
        assert!(EdgeParams::new(200.0, 100.0, GradientNorm::L2, KernelSize::Sobel(4)).is_err());
        assert!(EdgeParams::new(200.0, 100.0, GradientNorm::L2, KernelSize::Sobel(9)).is_err());
    }

    #[test]
    fn test_edge_params_threshold_order() {
        let a = EdgeParams::new(100.0, 50.0, GradientNorm::L2, KernelSize::Sobel(3)).unwrap();
        let b = EdgeParams::new(50.0, 100.0, GradientNorm::L2, KernelSize::Sobel(3)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.high(), 100.0);
        assert_eq!(a.low(), 50.0);
    }

    #[test]
    fn test_edge_params_equality() {
        let l2 = EdgeParams::sobel3(250.0, 125.0, GradientNorm::L2);
        let l1 = EdgeParams::sobel3(250.0, 125.0, GradientNorm::L1);
        assert_ne!(l2, l1);
        assert_eq!(l2, EdgeParams::new(250.0, 125.0, GradientNorm::L2, KernelSize::Sobel(3)).unwrap());
    }
}
