//! The three coding passes of the EBCOT tier-1 coder (ISO/IEC 15444-1 D.3).
//!
//! A block is scanned in stripes of four rows, column by column inside each
//! stripe. Every pass is written once against the [`BitEncoder`] and
//! [`BitDecoder`] seams, so the same code drives the MQ coder, the raw bypass
//! packer and the symbol recorders used in tests.

use super::code_block::{CodeBlock, PassKind};
use super::context_model::{mr_context, sc_context, zc_context};
use super::distortion;
use super::flags::{FlagGrid, REFINE, SIG, SIG_OTH, SIGN, VISIT};
use crate::coding_parameters::CodeBlockStyle;
use crate::constants::{BYPASS_MQ_BITPLANES, RUN_LENGTH_CONTEXT, STRIPE_HEIGHT, UNIFORM_CONTEXT};

/// Sink for binary decisions. `cx` is ignored by coders without modelling.
pub trait BitEncoder {
    fn encode_bit(&mut self, cx: u8, bit: u32);
}

/// Source of binary decisions.
pub trait BitDecoder {
    fn decode_bit(&mut self, cx: u8) -> u32;
}

/// Number of coding passes for `numbps` magnitude bit-planes.
pub fn pass_count(numbps: u8) -> usize {
    match numbps {
        0 => 0,
        n => 3 * n as usize - 2,
    }
}

/// Pass order: a cleanup on the top plane, then significance, refinement and
/// cleanup on each plane below it.
#[derive(Debug, Clone)]
pub struct PassSchedule {
    next: Option<(PassKind, u8)>,
}

impl PassSchedule {
    pub fn new(numbps: u8) -> Self {
        Self {
            next: numbps.checked_sub(1).map(|bp| (PassKind::Cleanup, bp)),
        }
    }
}

impl Iterator for PassSchedule {
    type Item = (PassKind, u8);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = match current {
            (PassKind::Cleanup, 0) => None,
            (PassKind::Cleanup, bp) => Some((PassKind::Significance, bp - 1)),
            (PassKind::Significance, bp) => Some((PassKind::Refinement, bp)),
            (PassKind::Refinement, bp) => Some((PassKind::Cleanup, bp)),
        };
        Some(current)
    }
}

/// Whether a pass is written with the raw packer. Only significance and
/// refinement passes below the four most significant planes qualify.
pub fn is_raw_pass(style: CodeBlockStyle, numbps: u8, kind: PassKind, bitplane: u8) -> bool {
    style.contains(CodeBlockStyle::BYPASS)
        && kind != PassKind::Cleanup
        && (bitplane as u32) + (BYPASS_MQ_BITPLANES as u32) < numbps as u32
}

/// Whether the coder is flushed at the end of a pass.
pub fn is_terminated_pass(style: CodeBlockStyle, numbps: u8, kind: PassKind, bitplane: u8) -> bool {
    if kind == PassKind::Cleanup && bitplane == 0 {
        return true;
    }
    if style.contains(CodeBlockStyle::TERMALL) {
        return true;
    }
    if !style.contains(CodeBlockStyle::BYPASS) {
        return false;
    }
    let plane = bitplane as u32 + BYPASS_MQ_BITPLANES as u32;
    let numbps = numbps as u32;
    // The last arithmetic-coded cleanup before the raw planes, then every
    // switch between raw and arithmetic coding.
    (kind == PassKind::Cleanup && plane == numbps)
        || (plane < numbps && kind != PassKind::Significance)
}

#[inline(always)]
fn stripe_rows(block: &CodeBlock, stripe: u32) -> (u32, u32) {
    let y0 = stripe * STRIPE_HEIGHT;
    (y0, (y0 + STRIPE_HEIGHT).min(block.height()))
}

#[inline(always)]
fn encode_sign<E: BitEncoder>(flags: &mut FlagGrid, x: u32, y: u32, f: u32, coder: &mut E) {
    let negative = f & SIGN != 0;
    let (cx, xor) = sc_context(f);
    coder.encode_bit(cx, negative as u32 ^ xor as u32);
    flags.mark_significant(x, y, negative);
}

#[inline(always)]
fn decode_sign<D: BitDecoder>(flags: &mut FlagGrid, x: u32, y: u32, f: u32, coder: &mut D) {
    let (cx, xor) = sc_context(f);
    let negative = coder.decode_bit(cx) ^ xor as u32 == 1;
    flags.mark_significant(x, y, negative);
}

/// Codes one pass over the whole block and returns its distortion estimate
/// in table units.
pub fn encode_pass<E: BitEncoder>(
    block: &mut CodeBlock,
    kind: PassKind,
    bitplane: u8,
    coder: &mut E,
) -> i64 {
    (0..block.stripe_count())
        .map(|stripe| encode_stripe(block, kind, stripe, bitplane, coder))
        .sum()
}

pub fn decode_pass<D: BitDecoder>(
    block: &mut CodeBlock,
    kind: PassKind,
    bitplane: u8,
    coder: &mut D,
) {
    for stripe in 0..block.stripe_count() {
        decode_stripe(block, kind, stripe, bitplane, coder);
    }
}

pub fn encode_stripe<E: BitEncoder>(
    block: &mut CodeBlock,
    kind: PassKind,
    stripe: u32,
    bitplane: u8,
    coder: &mut E,
) -> i64 {
    match kind {
        PassKind::Significance => encode_significance(block, stripe, bitplane, coder),
        PassKind::Refinement => encode_refinement(block, stripe, bitplane, coder),
        PassKind::Cleanup => encode_cleanup(block, stripe, bitplane, coder),
    }
}

pub fn decode_stripe<D: BitDecoder>(
    block: &mut CodeBlock,
    kind: PassKind,
    stripe: u32,
    bitplane: u8,
    coder: &mut D,
) {
    match kind {
        PassKind::Significance => decode_significance(block, stripe, bitplane, coder),
        PassKind::Refinement => decode_refinement(block, stripe, bitplane, coder),
        PassKind::Cleanup => decode_cleanup(block, stripe, bitplane, coder),
    }
}

fn encode_significance<E: BitEncoder>(
    block: &mut CodeBlock,
    stripe: u32,
    bp: u8,
    coder: &mut E,
) -> i64 {
    let (y0, y1) = stripe_rows(block, stripe);
    let mut nmsedec = 0;
    for x in 0..block.width() {
        for y in y0..y1 {
            let f = block.flags.get(x, y);
            if f & (SIG | VISIT) != 0 || f & SIG_OTH == 0 {
                continue;
            }
            let magnitude = block.data[block.sample(x, y)];
            let bit = (magnitude >> bp) & 1;
            coder.encode_bit(zc_context(block.zc_table, f), bit);
            if bit == 1 {
                encode_sign(&mut block.flags, x, y, f, coder);
                nmsedec += distortion::significance(magnitude, bp);
            }
            block.flags.set(x, y, VISIT);
        }
    }
    nmsedec
}

fn encode_refinement<E: BitEncoder>(
    block: &mut CodeBlock,
    stripe: u32,
    bp: u8,
    coder: &mut E,
) -> i64 {
    let (y0, y1) = stripe_rows(block, stripe);
    let mut nmsedec = 0;
    for x in 0..block.width() {
        for y in y0..y1 {
            let f = block.flags.get(x, y);
            if f & (SIG | VISIT) != SIG {
                continue;
            }
            let magnitude = block.data[block.sample(x, y)];
            coder.encode_bit(mr_context(f), (magnitude >> bp) & 1);
            nmsedec += distortion::refinement(magnitude, bp);
            block.flags.set(x, y, REFINE);
        }
    }
    nmsedec
}

/// Columns of a full stripe with no significance anywhere around them start
/// in run-length mode.
#[inline(always)]
fn run_mode(flags: &FlagGrid, x: u32, y0: u32, y1: u32) -> bool {
    y1 - y0 == STRIPE_HEIGHT && (y0..y1).all(|y| flags.get(x, y) & (SIG | VISIT | SIG_OTH) == 0)
}

fn encode_cleanup<E: BitEncoder>(block: &mut CodeBlock, stripe: u32, bp: u8, coder: &mut E) -> i64 {
    let (y0, y1) = stripe_rows(block, stripe);
    let mut nmsedec = 0;
    for x in 0..block.width() {
        let mut start = y0;
        if run_mode(&block.flags, x, y0, y1) {
            let first = (y0..y1).find(|&y| (block.data[block.sample(x, y)] >> bp) & 1 == 1);
            let Some(y) = first else {
                coder.encode_bit(RUN_LENGTH_CONTEXT, 0);
                continue;
            };
            let run = y - y0;
            coder.encode_bit(RUN_LENGTH_CONTEXT, 1);
            coder.encode_bit(UNIFORM_CONTEXT, run >> 1);
            coder.encode_bit(UNIFORM_CONTEXT, run & 1);

            let f = block.flags.get(x, y);
            encode_sign(&mut block.flags, x, y, f, coder);
            nmsedec += distortion::significance(block.data[block.sample(x, y)], bp);
            start = y + 1;
        }
        for y in start..y1 {
            let f = block.flags.get(x, y);
            if f & (SIG | VISIT) != 0 {
                continue;
            }
            let magnitude = block.data[block.sample(x, y)];
            let bit = (magnitude >> bp) & 1;
            coder.encode_bit(zc_context(block.zc_table, f), bit);
            if bit == 1 {
                encode_sign(&mut block.flags, x, y, f, coder);
                nmsedec += distortion::significance(magnitude, bp);
            }
        }
    }
    nmsedec
}

fn decode_significance<D: BitDecoder>(block: &mut CodeBlock, stripe: u32, bp: u8, coder: &mut D) {
    let (y0, y1) = stripe_rows(block, stripe);
    for x in 0..block.width() {
        for y in y0..y1 {
            let f = block.flags.get(x, y);
            if f & (SIG | VISIT) != 0 || f & SIG_OTH == 0 {
                continue;
            }
            if coder.decode_bit(zc_context(block.zc_table, f)) == 1 {
                decode_sign(&mut block.flags, x, y, f, coder);
                let i = block.sample(x, y);
                block.data[i] = 3 << bp;
            }
            block.flags.set(x, y, VISIT);
        }
    }
}

fn decode_refinement<D: BitDecoder>(block: &mut CodeBlock, stripe: u32, bp: u8, coder: &mut D) {
    let (y0, y1) = stripe_rows(block, stripe);
    for x in 0..block.width() {
        for y in y0..y1 {
            let f = block.flags.get(x, y);
            if f & (SIG | VISIT) != SIG {
                continue;
            }
            let i = block.sample(x, y);
            // The half-step bit moves down one plane either way.
            if coder.decode_bit(mr_context(f)) == 1 {
                block.data[i] += 1 << bp;
            } else {
                block.data[i] -= 1 << bp;
            }
            block.flags.set(x, y, REFINE);
        }
    }
}

fn decode_cleanup<D: BitDecoder>(block: &mut CodeBlock, stripe: u32, bp: u8, coder: &mut D) {
    let (y0, y1) = stripe_rows(block, stripe);
    for x in 0..block.width() {
        let mut start = y0;
        if run_mode(&block.flags, x, y0, y1) {
            if coder.decode_bit(RUN_LENGTH_CONTEXT) == 0 {
                continue;
            }
            let run = (coder.decode_bit(UNIFORM_CONTEXT) << 1) | coder.decode_bit(UNIFORM_CONTEXT);
            let y = y0 + run;
            let f = block.flags.get(x, y);
            decode_sign(&mut block.flags, x, y, f, coder);
            let i = block.sample(x, y);
            block.data[i] = 3 << bp;
            start = y + 1;
        }
        for y in start..y1 {
            let f = block.flags.get(x, y);
            if f & (SIG | VISIT) != 0 {
                continue;
            }
            if coder.decode_bit(zc_context(block.zc_table, f)) == 1 {
                decode_sign(&mut block.flags, x, y, f, coder);
                let i = block.sample(x, y);
                block.data[i] = 3 << bp;
            }
        }
    }
}
