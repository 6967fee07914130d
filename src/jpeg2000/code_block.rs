use super::context_model::zc_table;
use super::flags::{FlagGrid, SIG, SIGN};
use crate::coding_parameters::{CodeBlockStyle, DecodeParameters, Reconstruction};
use crate::constants::STRIPE_HEIGHT;
use crate::error::{CorruptionWarning, T1Error};
use crate::SubbandOrientation;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Coding pass type, in the order passes occur within a bit-plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PassKind {
    Significance = 0,
    Refinement = 1,
    Cleanup = 2,
}

/// Rate/distortion record of one coding pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodingPass {
    pub kind: PassKind,
    pub bitplane: u8,
    /// Bytes of the code-block stream needed to decode up to and including
    /// this pass.
    pub rate: usize,
    /// Cumulative distortion decrease up to and including this pass.
    pub distortion: f64,
    /// The coder was flushed at the end of this pass.
    pub terminated: bool,
    /// Decisions were written by the raw bypass packer.
    pub raw: bool,
}

/// One codeword segment handed to the decoder.
///
/// `data` is the buffer the segment lives in (usually shared by all segments
/// of a code-block) and `offset..offset + len` its range in that buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub data: Option<&'a [u8]>,
    pub offset: usize,
    pub len: usize,
    pub num_passes: usize,
    pub raw: bool,
}

impl<'a> Segment<'a> {
    pub fn new(data: &'a [u8], num_passes: usize, raw: bool) -> Self {
        Self {
            data: Some(data),
            offset: 0,
            len: data.len(),
            num_passes,
            raw,
        }
    }

    /// A segment whose bytes never arrived.
    pub fn missing(num_passes: usize, raw: bool) -> Self {
        Self {
            data: None,
            offset: 0,
            len: 0,
            num_passes,
            raw,
        }
    }

    /// The segment's bytes, `None` when its data is absent.
    pub fn bytes(&self, index: usize) -> Result<Option<&'a [u8]>, T1Error> {
        let Some(data) = self.data else {
            return Ok(None);
        };
        let end = self
            .offset
            .checked_add(self.len)
            .filter(|&end| end <= data.len())
            .ok_or(T1Error::MalformedSegment {
                index,
                reason: "segment range exceeds its buffer",
            })?;
        Ok(Some(&data[self.offset..end]))
    }
}

/// Output of the code-block encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedCodeBlock {
    pub width: u32,
    pub height: u32,
    pub orientation: SubbandOrientation,
    pub style: CodeBlockStyle,
    pub numbps: u8,
    pub data: Vec<u8>,
    pub passes: Vec<CodingPass>,
}

impl EncodedCodeBlock {
    /// Segments covering every pass.
    pub fn segments(&self) -> Vec<Segment<'_>> {
        self.truncated_segments(self.passes.len())
    }

    /// Segments covering the first `num_passes` passes, cut at the rate of
    /// the last included pass.
    pub fn truncated_segments(&self, num_passes: usize) -> Vec<Segment<'_>> {
        let n = num_passes.min(self.passes.len());
        let mut segments = Vec::new();
        let mut first_pass = 0;
        let mut offset = 0;
        for (i, pass) in self.passes[..n].iter().enumerate() {
            if pass.terminated || i + 1 == n {
                let end = pass.rate.max(offset);
                segments.push(Segment {
                    data: Some(&self.data),
                    offset,
                    len: end - offset,
                    num_passes: i + 1 - first_pass,
                    raw: pass.raw,
                });
                offset = end;
                first_pass = i + 1;
            }
        }
        segments
    }

    /// Bytes needed for the first `num_passes` passes.
    pub fn truncated_len(&self, num_passes: usize) -> usize {
        match num_passes.min(self.passes.len()) {
            0 => 0,
            n => self.passes[n - 1].rate,
        }
    }

    pub fn decode_parameters(&self) -> DecodeParameters {
        DecodeParameters {
            orientation: self.orientation,
            style: self.style,
            ..DecodeParameters::new(self.width, self.height, self.numbps)
        }
    }
}

/// Output of the code-block decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCodeBlock {
    pub width: u32,
    pub height: u32,
    pub coefficients: Vec<i32>,
    pub passes_decoded: usize,
    pub warnings: Vec<CorruptionWarning>,
}

/// Scratch state for coding one block: the flag grid plus one magnitude per
/// sample. Encoding stores `|coefficient|`; decoding accumulates the
/// reconstruction at twice the coefficient scale so that the half-step of
/// the current uncertainty interval is representable.
#[derive(Default)]
pub struct CodeBlock {
    pub(crate) flags: FlagGrid,
    pub(crate) data: Vec<u32>,
    pub(crate) zc_table: usize,
    width: u32,
    height: u32,
}

impl CodeBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes and zeroes the scratch for a new block.
    pub fn reset(
        &mut self,
        width: u32,
        height: u32,
        orientation: SubbandOrientation,
        vsc: bool,
    ) -> Result<(), T1Error> {
        if width == 0 || height == 0 {
            return Err(T1Error::InvalidDimensions { width, height });
        }
        let overflow = T1Error::AllocationOverflow { width, height };
        let samples = (width as usize)
            .checked_mul(height as usize)
            .ok_or(overflow.clone())?;
        let padded = (width as usize)
            .checked_add(2)
            .zip((height as usize).checked_add(2))
            .and_then(|(w, h)| w.checked_mul(h))
            .ok_or(overflow.clone())?;
        let bytes = padded
            .checked_mul(size_of::<u32>())
            .filter(|&bytes| bytes <= isize::MAX as usize)
            .ok_or(overflow)?;
        log::trace!("code-block {}x{}: {} bytes of flags", width, height, bytes);

        self.width = width;
        self.height = height;
        self.zc_table = zc_table(orientation);
        self.flags.reset(width, height, padded, vsc);
        self.data.clear();
        self.data.resize(samples, 0);
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stripe_count(&self) -> u32 {
        self.height.div_ceil(STRIPE_HEIGHT)
    }

    #[inline(always)]
    pub(crate) fn sample(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Loads a coefficient plane for encoding and returns the largest
    /// magnitude. Signs go straight into the flag grid.
    pub(crate) fn load(&mut self, coefficients: &[i32]) -> u32 {
        let mut max = 0;
        for y in 0..self.height {
            for x in 0..self.width {
                let i = self.sample(x, y);
                let value = coefficients[i];
                let magnitude = value.unsigned_abs();
                self.data[i] = magnitude;
                max = max.max(magnitude);
                if value < 0 {
                    self.flags.set(x, y, SIGN);
                }
            }
        }
        max
    }

    /// Signed coefficients from the decoder's twice-scaled magnitudes.
    pub(crate) fn reconstruct(&self, reconstruction: Reconstruction) -> Vec<i32> {
        let mut out = Vec::with_capacity(self.data.len());
        for y in 0..self.height {
            for x in 0..self.width {
                let f = self.flags.get(x, y);
                if f & SIG == 0 {
                    out.push(0);
                    continue;
                }
                let doubled = self.data[self.sample(x, y)];
                let magnitude = match reconstruction {
                    // The lowest set bit is the half-step marker.
                    Reconstruction::Truncate => (doubled & (doubled - 1)) >> 1,
                    Reconstruction::Midpoint => doubled >> 1,
                } as i32;
                out.push(if f & SIGN != 0 { -magnitude } else { magnitude });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(kind: PassKind, bitplane: u8, rate: usize, terminated: bool, raw: bool) -> CodingPass {
        CodingPass {
            kind,
            bitplane,
            rate,
            distortion: 0.0,
            terminated,
            raw,
        }
    }

    fn block(passes: Vec<CodingPass>, len: usize) -> EncodedCodeBlock {
        EncodedCodeBlock {
            width: 4,
            height: 4,
            orientation: SubbandOrientation::LL,
            style: CodeBlockStyle::BYPASS,
            numbps: 6,
            data: (0..len as u8).collect(),
            passes,
        }
    }

    #[test]
    fn test_segments_split_at_terminated_passes() {
        use PassKind::*;
        let encoded = block(
            vec![
                pass(Cleanup, 5, 3, false, false),
                pass(Significance, 4, 5, false, false),
                pass(Refinement, 4, 6, false, false),
                pass(Cleanup, 4, 8, true, false),
                pass(Significance, 3, 9, false, true),
                pass(Refinement, 3, 10, true, true),
                pass(Cleanup, 3, 12, true, false),
            ],
            12,
        );
        let segments = encoded.segments();
        let shape: Vec<_> = segments
            .iter()
            .map(|s| (s.offset, s.len, s.num_passes, s.raw))
            .collect();
        assert_eq!(shape, vec![(0, 8, 4, false), (8, 2, 2, true), (10, 2, 1, false)]);

        let truncated = encoded.truncated_segments(5);
        let shape: Vec<_> = truncated
            .iter()
            .map(|s| (s.offset, s.len, s.num_passes, s.raw))
            .collect();
        assert_eq!(shape, vec![(0, 8, 4, false), (8, 1, 1, true)]);
        assert_eq!(encoded.truncated_len(5), 9);
        assert!(encoded.truncated_segments(0).is_empty());
    }

    #[test]
    fn test_segment_range_checked() {
        let data = [1u8, 2, 3];
        let segment = Segment {
            data: Some(&data),
            offset: 2,
            len: 2,
            num_passes: 1,
            raw: false,
        };
        assert_eq!(
            segment.bytes(7),
            Err(T1Error::MalformedSegment {
                index: 7,
                reason: "segment range exceeds its buffer"
            })
        );
        let segment = Segment { len: 1, ..segment };
        assert_eq!(segment.bytes(0), Ok(Some(&data[2..])));
        assert_eq!(Segment::missing(1, false).bytes(0), Ok(None));
    }

    #[test]
    fn test_reset_rejects_bad_sizes() {
        let mut cb = CodeBlock::new();
        assert_eq!(
            cb.reset(0, 4, SubbandOrientation::LL, false),
            Err(T1Error::InvalidDimensions { width: 0, height: 4 })
        );
        assert_eq!(
            cb.reset(u32::MAX, u32::MAX, SubbandOrientation::LL, false),
            Err(T1Error::AllocationOverflow {
                width: u32::MAX,
                height: u32::MAX
            })
        );
        assert!(cb.reset(64, 64, SubbandOrientation::HH, true).is_ok());
        assert_eq!(cb.stripe_count(), 16);
        assert_eq!(cb.zc_table, 2);
    }

    #[test]
    fn test_reconstruction_modes() {
        let mut cb = CodeBlock::new();
        cb.reset(2, 1, SubbandOrientation::LL, false).unwrap();
        // Significant at plane 3, refined with a 1 at plane 2.
        cb.flags.mark_significant(0, 0, true);
        cb.data[0] = (3 << 3) + (1 << 2);
        assert_eq!(cb.reconstruct(Reconstruction::Truncate), vec![-12, 0]);
        assert_eq!(cb.reconstruct(Reconstruction::Midpoint), vec![-14, 0]);
    }

    #[test]
    fn test_pass_kind_codes() {
        assert_eq!(PassKind::try_from(2u8), Ok(PassKind::Cleanup));
        assert_eq!(u8::from(PassKind::Refinement), 1);
        assert!(PassKind::try_from(3u8).is_err());
    }
}
