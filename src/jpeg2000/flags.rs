//! Per-sample state words with pre-aggregated neighbour significance.
//!
//! The grid carries a one-sample border so that `mark_significant` can
//! update all eight neighbours unconditionally.

use crate::constants::STRIPE_HEIGHT;

// Significance of the eight neighbours.
pub const SIG_NW: u32 = 1 << 0;
pub const SIG_N: u32 = 1 << 1;
pub const SIG_NE: u32 = 1 << 2;
pub const SIG_W: u32 = 1 << 3;
pub const SIG_E: u32 = 1 << 4;
pub const SIG_SW: u32 = 1 << 5;
pub const SIG_S: u32 = 1 << 6;
pub const SIG_SE: u32 = 1 << 7;
pub const SIG_OTH: u32 = 0xFF;

// Set when the horizontal/vertical neighbour is significant and negative.
pub const SGN_N: u32 = 1 << 8;
pub const SGN_S: u32 = 1 << 9;
pub const SGN_W: u32 = 1 << 10;
pub const SGN_E: u32 = 1 << 11;

pub const SIG: u32 = 1 << 12;
pub const VISIT: u32 = 1 << 13;
pub const REFINE: u32 = 1 << 14;
pub const SIGN: u32 = 1 << 15;

// Neighbour bits that come from the row below.
const SOUTH_MASK: u32 = SIG_SW | SIG_S | SIG_SE | SGN_S;

pub struct FlagGrid {
    stride: usize,
    vsc: bool,
    flags: Vec<u32>,
}

impl Default for FlagGrid {
    fn default() -> Self {
        Self {
            stride: 2,
            vsc: false,
            flags: Vec::new(),
        }
    }
}

impl FlagGrid {
    /// Zeroes the grid for a `width` x `height` block. `padded_len` is the
    /// already validated `(width + 2) * (height + 2)`.
    pub(crate) fn reset(&mut self, width: u32, height: u32, padded_len: usize, vsc: bool) {
        debug_assert_eq!(padded_len, (width as usize + 2) * (height as usize + 2));
        self.stride = width as usize + 2;
        self.vsc = vsc;
        self.flags.clear();
        self.flags.resize(padded_len, 0);
    }

    #[inline(always)]
    pub fn index(&self, x: u32, y: u32) -> usize {
        (y as usize + 1) * self.stride + x as usize + 1
    }

    /// State word of a sample as seen by context formation. In stripe-causal
    /// mode the last row of a stripe does not see the stripe below.
    #[inline(always)]
    pub fn get(&self, x: u32, y: u32) -> u32 {
        let f = self.flags[self.index(x, y)];
        if self.vsc && y % STRIPE_HEIGHT == STRIPE_HEIGHT - 1 {
            f & !SOUTH_MASK
        } else {
            f
        }
    }

    #[inline(always)]
    pub fn set(&mut self, x: u32, y: u32, bits: u32) {
        let i = self.index(x, y);
        self.flags[i] |= bits;
    }

    pub fn mark_significant(&mut self, x: u32, y: u32, negative: bool) {
        let i = self.index(x, y);
        let s = self.stride;

        self.flags[i] |= if negative { SIG | SIGN } else { SIG };

        // The row above sees this sample as its south neighbour. A stripe's
        // first row does not reach into the previous stripe in VSC mode.
        if !(self.vsc && y % STRIPE_HEIGHT == 0) {
            self.flags[i - s - 1] |= SIG_SE;
            self.flags[i - s] |= SIG_S | if negative { SGN_S } else { 0 };
            self.flags[i - s + 1] |= SIG_SW;
        }
        self.flags[i - 1] |= SIG_E | if negative { SGN_E } else { 0 };
        self.flags[i + 1] |= SIG_W | if negative { SGN_W } else { 0 };
        self.flags[i + s - 1] |= SIG_NE;
        self.flags[i + s] |= SIG_N | if negative { SGN_N } else { 0 };
        self.flags[i + s + 1] |= SIG_NW;
    }

    /// Starts a new bit-plane.
    pub fn clear_visited(&mut self) {
        for f in &mut self.flags {
            *f &= !VISIT;
        }
    }
}
