use crate::SubbandOrientation;
use crate::error::T1Error;
use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

bitflags! {
    /// Code-block coding style, laid out like the `SPcod`/`SPcoc` style byte
    /// of the COD and COC marker segments (Table A.19).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CodeBlockStyle: u8 {
        /// Selective arithmetic coding bypass (lazy mode).
        const BYPASS  = 0x01;
        /// Reset context probabilities after each pass.
        const RESET   = 0x02;
        /// Terminate the coder after each pass.
        const TERMALL = 0x04;
        /// Vertically stripe-causal context formation.
        const VSC     = 0x08;
        /// Predictable termination.
        const PTERM   = 0x10;
        /// Segmentation symbols after cleanup passes.
        const SEGSYM  = 0x20;
        /// High-throughput block coding (Part 15).
        const HT      = 0x40;
    }
}

/// Wavelet filter the coefficients came from, coded as in the COD
/// transformation byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum WaveletTransform {
    Irreversible97 = 0,
    #[default]
    Reversible53 = 1,
}

/// How the decoder fills in magnitude bits below the last decoded plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Reconstruction {
    /// Undecoded low-order bits are zero.
    #[default]
    Truncate,
    /// Undecoded low-order bits reconstruct to the middle of their interval.
    Midpoint,
}

impl Reconstruction {
    /// Integer coefficients of the 5-3 path keep drop-LSB semantics; 9-7
    /// coefficients are dequantized, so the interval midpoint is the better
    /// estimate.
    pub fn for_transform(transform: WaveletTransform) -> Self {
        match transform {
            WaveletTransform::Reversible53 => Self::Truncate,
            WaveletTransform::Irreversible97 => Self::Midpoint,
        }
    }
}

/// What the decoder does with a segment whose data is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MissingSegmentPolicy {
    /// Stop at the missing segment and return what was decoded before it.
    #[default]
    Truncate,
    /// Fail with [`T1Error::MalformedSegment`].
    Error,
}

/// Encoder configuration for one code-block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodingParameters {
    pub orientation: SubbandOrientation,
    pub style: CodeBlockStyle,
    pub transform: WaveletTransform,
    pub lossless: bool,
    /// Synthesis-filter norm times quantizer step size of the sub-band;
    /// scales the per-pass distortion estimates.
    pub distortion_weight: f64,
}

impl Default for CodingParameters {
    fn default() -> Self {
        Self {
            orientation: SubbandOrientation::LL,
            style: CodeBlockStyle::empty(),
            transform: WaveletTransform::Reversible53,
            lossless: false,
            distortion_weight: 1.0,
        }
    }
}

impl CodingParameters {
    pub fn validate(&self) -> Result<(), T1Error> {
        validate_style(self.style)?;
        if self.lossless && self.transform == WaveletTransform::Irreversible97 {
            return Err(T1Error::UnsupportedMode(
                "lossless coding with the irreversible 9-7 transform",
            ));
        }
        Ok(())
    }
}

/// Decoder configuration for one code-block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeParameters {
    pub width: u32,
    pub height: u32,
    pub orientation: SubbandOrientation,
    pub style: CodeBlockStyle,
    /// Magnitude bit-planes present in the block (sub-band precision minus
    /// the zero bit-planes signalled in the packet header).
    pub numbps: u8,
    pub reconstruction: Reconstruction,
    pub missing_segments: MissingSegmentPolicy,
}

impl DecodeParameters {
    pub fn new(width: u32, height: u32, numbps: u8) -> Self {
        Self {
            width,
            height,
            orientation: SubbandOrientation::LL,
            style: CodeBlockStyle::empty(),
            numbps,
            reconstruction: Reconstruction::Truncate,
            missing_segments: MissingSegmentPolicy::Truncate,
        }
    }

    pub fn validate(&self) -> Result<(), T1Error> {
        validate_style(self.style)
    }
}

fn validate_style(style: CodeBlockStyle) -> Result<(), T1Error> {
    if style.contains(CodeBlockStyle::HT) {
        return Err(T1Error::UnsupportedMode("high-throughput block coding"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_byte_layout() {
        let style = CodeBlockStyle::from_bits_truncate(0x3F);
        assert!(style.contains(CodeBlockStyle::BYPASS | CodeBlockStyle::SEGSYM));
        assert!(!style.contains(CodeBlockStyle::HT));
        assert_eq!(CodeBlockStyle::VSC.bits(), 0x08);
    }

    #[test]
    fn test_validate_rejects_ht() {
        let params = CodingParameters {
            style: CodeBlockStyle::HT,
            ..Default::default()
        };
        assert_eq!(
            params.validate(),
            Err(T1Error::UnsupportedMode("high-throughput block coding"))
        );
    }

    #[test]
    fn test_validate_rejects_lossless_97() {
        let params = CodingParameters {
            transform: WaveletTransform::Irreversible97,
            lossless: true,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(T1Error::UnsupportedMode(_))));

        let params = CodingParameters {
            lossless: true,
            ..Default::default()
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_transform_codes() {
        assert_eq!(WaveletTransform::try_from(1u8), Ok(WaveletTransform::Reversible53));
        assert_eq!(u8::from(WaveletTransform::Irreversible97), 0);
        assert!(WaveletTransform::try_from(2u8).is_err());
        assert_eq!(
            Reconstruction::for_transform(WaveletTransform::Irreversible97),
            Reconstruction::Midpoint
        );
    }
}
