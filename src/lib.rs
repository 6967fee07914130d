//! JPEG 2000 tier-1 entropy coding (EBCOT, ISO/IEC 15444-1 Annex D).
//!
//! A code-block of quantized wavelet coefficients is coded bit-plane by
//! bit-plane with three passes per plane (significance propagation,
//! magnitude refinement, cleanup). Decisions go through the MQ arithmetic
//! coder or, in lazy mode, a raw bit packer. The encoder reports the
//! cumulative rate and distortion reduction of every pass so that a rate
//! allocator can truncate the stream; the decoder reconstructs coefficients
//! from any prefix of it.
//!
//! ```
//! use ebcot_rs::{CodeBlockDecoder, CodeBlockEncoder, CodingParameters};
//!
//! let plane = [5, 0, -3, 1, 0, 0, 7, -2, 0];
//! let encoded = CodeBlockEncoder::new()
//!     .encode(&CodingParameters::default(), 3, 3, &plane)
//!     .unwrap();
//! let decoded = CodeBlockDecoder::new()
//!     .decode(&encoded.decode_parameters(), &encoded.segments())
//!     .unwrap();
//! assert_eq!(decoded.coefficients, plane);
//! ```

use num_enum::{IntoPrimitive, TryFromPrimitive};

pub mod block_file;
pub mod coding_parameters;
pub mod constants;
pub mod error;
pub mod jpeg2000;

pub use coding_parameters::{
    CodeBlockStyle, CodingParameters, DecodeParameters, MissingSegmentPolicy, Reconstruction,
    WaveletTransform,
};
pub use error::{CorruptionWarning, T1Error};
pub use jpeg2000::code_block::{CodingPass, DecodedCodeBlock, EncodedCodeBlock, PassKind, Segment};
pub use jpeg2000::decoder::CodeBlockDecoder;
pub use jpeg2000::encoder::CodeBlockEncoder;

/// Sub-band a code-block belongs to. Selects the zero-coding context table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SubbandOrientation {
    #[default]
    LL = 0,
    HL = 1,
    LH = 2,
    HH = 3,
}
