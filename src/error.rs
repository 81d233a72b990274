//! Scan errors
//!
//! Invalid configuration is rejected when it is constructed or used. A candidate
//! failing geometric checks, or text that matches nothing, is not an error.

use thiserror::Error;

/// Errors raised for malformed parameters or misuse of an image cache
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScanError {
    /// Rotation angle outside [0, 360)
    #[error("rotation angle {0} is outside [0, 360)")]
    InvalidAngle(f64),

    /// Edge kernel size that is even or outside [3, 7]
    #[error("edge kernel size {0} must be 3, 5 or 7")]
    InvalidKernelSize(u8),

    /// Source image with zero width or height
    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    /// Accessor used after the cached representations were released
    #[error("image cache has been released")]
    Released,
}

pub type ScanResult<T> = std::result::Result<T, ScanError>;
