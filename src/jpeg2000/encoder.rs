//! Code-block encoder.
//!
//! Runs the pass schedule over one block of quantized coefficients, switches
//! between the MQ coder and the raw packer as the style requires and records
//! a rate/distortion point for every pass.

use super::bit_io::RawEncoder;
use super::bit_plane_coder::{
    PassSchedule, encode_pass, is_raw_pass, is_terminated_pass, pass_count,
};
use super::code_block::{CodeBlock, CodingPass, EncodedCodeBlock, PassKind};
use super::distortion;
use super::mq_coder::MqEncoder;
use crate::coding_parameters::{CodeBlockStyle, CodingParameters};
use crate::constants::MAX_BITPLANES;
use crate::error::T1Error;

/// Reusable encoder. Scratch buffers are kept between blocks.
#[derive(Default)]
pub struct CodeBlockEncoder {
    block: CodeBlock,
    mq: MqEncoder,
    raw: RawEncoder,
}

impl CodeBlockEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes a `width` x `height` plane of coefficients stored row by row.
    pub fn encode(
        &mut self,
        params: &CodingParameters,
        width: u32,
        height: u32,
        coefficients: &[i32],
    ) -> Result<EncodedCodeBlock, T1Error> {
        params.validate()?;
        let style = params.style;
        self.block
            .reset(width, height, params.orientation, style.contains(CodeBlockStyle::VSC))?;
        let expected = self.block.data.len();
        if coefficients.len() != expected {
            return Err(T1Error::PlaneSizeMismatch {
                expected,
                actual: coefficients.len(),
            });
        }

        let max = self.block.load(coefficients);
        let bits = u32::BITS - max.leading_zeros();
        if bits > MAX_BITPLANES as u32 {
            return Err(T1Error::TooManyBitplanes(bits));
        }
        let numbps = bits as u8;

        let mut data = Vec::new();
        let mut passes = Vec::with_capacity(pass_count(numbps));
        let predictable = style.contains(CodeBlockStyle::PTERM);
        let mut cumulative = 0.0;

        self.mq.reset_contexts();
        self.mq.restart();
        self.raw.restart();

        for (kind, bitplane) in PassSchedule::new(numbps) {
            let raw = is_raw_pass(style, numbps, kind, bitplane);
            let nmsedec = if raw {
                encode_pass(&mut self.block, kind, bitplane, &mut self.raw)
            } else {
                encode_pass(&mut self.block, kind, bitplane, &mut self.mq)
            };
            if kind == PassKind::Cleanup {
                if style.contains(CodeBlockStyle::SEGSYM) {
                    self.mq.segmentation_symbol();
                }
                self.block.flags.clear_visited();
            }
            cumulative += distortion::weighted(nmsedec, bitplane, params.distortion_weight);

            let terminated = is_terminated_pass(style, numbps, kind, bitplane);
            let rate = if terminated {
                if raw {
                    self.raw.flush(predictable);
                    data.extend_from_slice(self.raw.bytes());
                    self.raw.restart();
                } else {
                    if predictable {
                        self.mq.erterm();
                    } else {
                        self.mq.flush();
                    }
                    data.extend_from_slice(self.mq.bytes());
                    self.mq.restart();
                }
                data.len()
            } else if raw {
                data.len() + self.raw.num_bytes() + self.raw.extra_bytes(predictable)
            } else {
                data.len() + self.mq.open_segment_length()
            };

            log::trace!(
                "pass {:?} bit-plane {}: rate {} distortion {:.3}{}",
                kind,
                bitplane,
                rate,
                cumulative,
                if terminated { " (terminated)" } else { "" }
            );
            passes.push(CodingPass {
                kind,
                bitplane,
                rate,
                distortion: cumulative,
                terminated,
                raw,
            });

            if style.contains(CodeBlockStyle::RESET) {
                self.mq.reset_contexts();
            }
        }

        finalize_rates(&mut passes, &data);
        log::debug!(
            "encoded {}x{} code-block: {} bit-planes, {} passes, {} bytes",
            width,
            height,
            numbps,
            passes.len(),
            data.len()
        );

        Ok(EncodedCodeBlock {
            width,
            height,
            orientation: params.orientation,
            style,
            numbps,
            data,
            passes,
        })
    }
}

/// Makes open-pass rate estimates usable as truncation points: no rate
/// exceeds the stream or the rate of a later pass, and an open pass does not
/// end on a `0xFF` that the decoder would read as the start of a marker unless
/// dropping it would cut into the previous pass.
fn finalize_rates(passes: &mut [CodingPass], data: &[u8]) {
    let mut limit = data.len();
    for pass in passes.iter_mut().rev() {
        pass.rate = pass.rate.min(limit);
        limit = pass.rate;
    }
    let mut floor = 1;
    for pass in passes.iter_mut() {
        if !pass.terminated && pass.rate > floor && data[pass.rate - 1] == 0xFF {
            pass.rate -= 1;
        }
        floor = floor.max(pass.rate);
    }
}
