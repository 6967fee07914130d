//! Code-block decoder.
//!
//! Consumes codeword segments in order, each holding one or more consecutive
//! passes, and reconstructs the coefficients from however many passes
//! arrived.

use super::bit_io::RawDecoder;
use super::bit_plane_coder::{
    PassSchedule, decode_pass, is_raw_pass, is_terminated_pass, pass_count,
};
use super::code_block::{CodeBlock, DecodedCodeBlock, PassKind, Segment};
use super::mq_coder::MqDecoder;
use crate::coding_parameters::{CodeBlockStyle, DecodeParameters, MissingSegmentPolicy};
use crate::constants::{MAX_BITPLANES, SEGMENTATION_SYMBOL};
use crate::error::{CorruptionWarning, T1Error};

/// Reusable decoder. Scratch buffers are kept between blocks.
#[derive(Default)]
pub struct CodeBlockDecoder {
    block: CodeBlock,
}

impl CodeBlockDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(
        &mut self,
        params: &DecodeParameters,
        segments: &[Segment<'_>],
    ) -> Result<DecodedCodeBlock, T1Error> {
        params.validate()?;
        if params.numbps > MAX_BITPLANES {
            return Err(T1Error::TooManyBitplanes(params.numbps as u32));
        }
        let style = params.style;
        let numbps = params.numbps;
        self.block.reset(
            params.width,
            params.height,
            params.orientation,
            style.contains(CodeBlockStyle::VSC),
        )?;
        check_layout(style, numbps, segments)?;

        let mut schedule = PassSchedule::new(numbps);
        let mut mq = MqDecoder::new(&[]);
        let mut warnings = Vec::new();
        let mut passes_decoded = 0;

        for (index, segment) in segments.iter().enumerate() {
            let Some(bytes) = segment.bytes(index)? else {
                match params.missing_segments {
                    MissingSegmentPolicy::Error => {
                        return Err(T1Error::MalformedSegment {
                            index,
                            reason: "segment data is missing",
                        });
                    }
                    MissingSegmentPolicy::Truncate => {
                        log::warn!(
                            "segment {} is missing, stopping after {} passes",
                            index,
                            passes_decoded
                        );
                        break;
                    }
                }
            };
            if segment.num_passes == 0 {
                continue;
            }

            let mut raw = RawDecoder::new(bytes);
            if !segment.raw {
                mq.restart(bytes);
            }
            for (kind, bitplane) in schedule.by_ref().take(segment.num_passes) {
                if segment.raw {
                    decode_pass(&mut self.block, kind, bitplane, &mut raw);
                } else {
                    decode_pass(&mut self.block, kind, bitplane, &mut mq);
                }
                if kind == PassKind::Cleanup {
                    if style.contains(CodeBlockStyle::SEGSYM) {
                        let symbol = mq.segmentation_symbol();
                        if symbol != SEGMENTATION_SYMBOL {
                            let warning = CorruptionWarning {
                                pass: passes_decoded,
                                bitplane,
                                symbol,
                            };
                            log::warn!("{}", warning);
                            warnings.push(warning);
                        }
                    }
                    self.block.flags.clear_visited();
                }
                if style.contains(CodeBlockStyle::RESET) {
                    mq.reset_contexts();
                }
                passes_decoded += 1;
            }
            log::trace!(
                "segment {}: {} of {} bytes consumed",
                index,
                if segment.raw { raw.position() } else { mq.position() },
                bytes.len()
            );
        }

        log::debug!(
            "decoded {}x{} code-block: {} of {} passes",
            params.width,
            params.height,
            passes_decoded,
            pass_count(numbps)
        );
        Ok(DecodedCodeBlock {
            width: params.width,
            height: params.height,
            coefficients: self.block.reconstruct(params.reconstruction),
            passes_decoded,
            warnings,
        })
    }
}

/// Checks that the segments line up with the passes the style implies before
/// any data is touched.
fn check_layout(
    style: CodeBlockStyle,
    numbps: u8,
    segments: &[Segment<'_>],
) -> Result<(), T1Error> {
    let mut schedule = PassSchedule::new(numbps);
    let last = segments.iter().rposition(|segment| segment.num_passes > 0);
    for (index, segment) in segments.iter().enumerate() {
        for n in 0..segment.num_passes {
            let Some((kind, bitplane)) = schedule.next() else {
                return Err(T1Error::MalformedSegment {
                    index,
                    reason: "more passes than the block has bit-planes for",
                });
            };
            if is_raw_pass(style, numbps, kind, bitplane) != segment.raw {
                return Err(T1Error::MalformedSegment {
                    index,
                    reason: if segment.raw {
                        "raw segment holds an arithmetic-coded pass"
                    } else {
                        "arithmetic-coded segment holds a raw pass"
                    },
                });
            }
            let terminated = is_terminated_pass(style, numbps, kind, bitplane);
            let final_pass = n + 1 == segment.num_passes;
            if terminated && !final_pass {
                return Err(T1Error::MalformedSegment {
                    index,
                    reason: "segment continues past a terminated pass",
                });
            }
            if final_pass && !terminated && Some(index) != last {
                return Err(T1Error::MalformedSegment {
                    index,
                    reason: "segment ends on a pass that is not terminated",
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SubbandOrientation;
    use crate::coding_parameters::Reconstruction;

    // Worked examples of ISO/IEC 15444-1 J.10.4.
    #[test]
    fn test_decode_j10_ll_block() {
        let data = [0x01, 0x8f, 0x0d, 0xc8, 0x75, 0x5d];
        let params = DecodeParameters::new(1, 5, 6);
        let decoded = CodeBlockDecoder::new()
            .decode(&params, &[Segment::new(&data, 16, false)])
            .unwrap();
        assert_eq!(decoded.coefficients, vec![-26, -22, -30, -32, -19]);
        assert_eq!(decoded.passes_decoded, 16);
        assert!(decoded.warnings.is_empty());
    }

    #[test]
    fn test_decode_j10_lh_block() {
        let data = [0x0f, 0xb1, 0x76];
        let params = DecodeParameters {
            orientation: SubbandOrientation::LH,
            ..DecodeParameters::new(1, 4, 3)
        };
        let decoded = CodeBlockDecoder::new()
            .decode(&params, &[Segment::new(&data, 7, false)])
            .unwrap();
        assert_eq!(decoded.coefficients, vec![1, 5, 1, 0]);
    }

    #[test]
    fn test_partial_decode_of_j10_block() {
        let data = [0x01, 0x8f, 0x0d, 0xc8, 0x75, 0x5d];
        let params = DecodeParameters {
            reconstruction: Reconstruction::Midpoint,
            ..DecodeParameters::new(1, 5, 6)
        };
        // The first cleanup alone finds the sample with magnitude 32.
        let decoded = CodeBlockDecoder::new()
            .decode(&params, &[Segment::new(&data, 1, false)])
            .unwrap();
        assert_eq!(decoded.coefficients, vec![0, 0, 0, -48, 0]);
    }

    #[test]
    fn test_no_segments_gives_zeros() {
        let decoded = CodeBlockDecoder::new()
            .decode(&DecodeParameters::new(3, 2, 5), &[])
            .unwrap();
        assert_eq!(decoded.coefficients, vec![0; 6]);
        assert_eq!(decoded.passes_decoded, 0);
    }

    #[test]
    fn test_too_many_passes() {
        let params = DecodeParameters::new(4, 4, 2);
        let result = CodeBlockDecoder::new().decode(&params, &[Segment::new(&[0x00], 5, false)]);
        assert_eq!(
            result,
            Err(T1Error::MalformedSegment {
                index: 0,
                reason: "more passes than the block has bit-planes for"
            })
        );
    }

    #[test]
    fn test_raw_flag_must_match_style() {
        let params = DecodeParameters {
            style: CodeBlockStyle::BYPASS,
            ..DecodeParameters::new(4, 4, 6)
        };
        let data = [0u8; 4];
        let result = CodeBlockDecoder::new().decode(&params, &[Segment::new(&data, 1, true)]);
        assert!(matches!(result, Err(T1Error::MalformedSegment { index: 0, .. })));
    }

    #[test]
    fn test_segments_must_end_on_terminated_passes() {
        let params = DecodeParameters::new(4, 4, 3);
        let data = [0u8; 4];
        let result = CodeBlockDecoder::new().decode(
            &params,
            &[Segment::new(&data, 2, false), Segment::new(&data, 5, false)],
        );
        assert_eq!(
            result,
            Err(T1Error::MalformedSegment {
                index: 0,
                reason: "segment ends on a pass that is not terminated"
            })
        );

        let termall = DecodeParameters {
            style: CodeBlockStyle::TERMALL,
            ..params
        };
        let result = CodeBlockDecoder::new().decode(&termall, &[Segment::new(&data, 2, false)]);
        assert_eq!(
            result,
            Err(T1Error::MalformedSegment {
                index: 0,
                reason: "segment continues past a terminated pass"
            })
        );
    }

    #[test]
    fn test_missing_segment_policies() {
        let data = [0x01, 0x8f, 0x0d, 0xc8, 0x75, 0x5d];
        let params = DecodeParameters {
            style: CodeBlockStyle::TERMALL,
            ..DecodeParameters::new(1, 5, 6)
        };
        let segments = [Segment::new(&data, 1, false), Segment::missing(1, false)];

        let decoded = CodeBlockDecoder::new().decode(&params, &segments).unwrap();
        assert_eq!(decoded.passes_decoded, 1);

        let strict = DecodeParameters {
            missing_segments: MissingSegmentPolicy::Error,
            ..params
        };
        assert_eq!(
            CodeBlockDecoder::new().decode(&strict, &segments),
            Err(T1Error::MalformedSegment {
                index: 1,
                reason: "segment data is missing"
            })
        );
    }

    #[test]
    fn test_out_of_range_segment() {
        let data = [0u8; 2];
        let segment = Segment {
            offset: 1,
            len: 5,
            ..Segment::new(&data, 1, false)
        };
        let result = CodeBlockDecoder::new().decode(&DecodeParameters::new(2, 2, 1), &[segment]);
        assert!(matches!(result, Err(T1Error::MalformedSegment { index: 0, .. })));
    }

    #[test]
    fn test_parameter_errors() {
        let mut decoder = CodeBlockDecoder::new();
        let params = DecodeParameters::new(2, 2, 32);
        assert_eq!(decoder.decode(&params, &[]), Err(T1Error::TooManyBitplanes(32)));
        let params = DecodeParameters {
            style: CodeBlockStyle::HT,
            ..DecodeParameters::new(2, 2, 4)
        };
        assert!(matches!(decoder.decode(&params, &[]), Err(T1Error::UnsupportedMode(_))));
    }
}
