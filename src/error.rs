use thiserror::Error;

/// Fatal errors raised while coding a single code-block.
///
/// None of these leave shared state behind: a coder that returned an error
/// can be reused for the next block.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum T1Error {
    #[error("Malformed segment {index}: {reason}")]
    MalformedSegment { index: usize, reason: &'static str },
    #[error("Code-block of {width}x{height} samples exceeds addressable memory")]
    AllocationOverflow { width: u32, height: u32 },
    #[error("Unsupported coding mode: {0}")]
    UnsupportedMode(&'static str),
    #[error("Invalid code-block dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Coefficient plane holds {actual} samples, expected {expected}")]
    PlaneSizeMismatch { expected: usize, actual: usize },
    #[error("Magnitude needs {0} bit-planes, at most 31 are supported")]
    TooManyBitplanes(u32),
    #[error("Invalid code-block file: {0}")]
    InvalidBlockFile(&'static str),
}

/// Non-fatal decode diagnostic: the segmentation symbol read after a cleanup
/// pass was not `1010`.
///
/// Decoding continues; the result is reported alongside the coefficients.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error(
    "Segmentation symbol mismatch after pass {pass} (bit-plane {bitplane}): read {symbol:#06b}"
)]
pub struct CorruptionWarning {
    pub pass: usize,
    pub bitplane: u8,
    pub symbol: u8,
}
