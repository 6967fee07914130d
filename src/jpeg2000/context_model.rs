//! Context formation, ISO/IEC 15444-1 D.3.
//!
//! All tables are built at compile time from the neighbour bits of the flag
//! word and never change afterwards.

use super::flags::{
    REFINE, SGN_E, SGN_N, SGN_S, SGN_W, SIG_E, SIG_N, SIG_OTH, SIG_S, SIG_W,
};
use crate::SubbandOrientation;
use crate::constants::{
    MR_CONTEXT_NEIGHBOR, MR_CONTEXT_NO_NEIGHBOR, MR_CONTEXT_REFINED, SC_CONTEXT_FIRST,
};

/// Zero-coding table selector: LL and LH share Table D.1's first column.
pub const fn zc_table(orientation: SubbandOrientation) -> usize {
    match orientation {
        SubbandOrientation::LL | SubbandOrientation::LH => 0,
        SubbandOrientation::HL => 1,
        SubbandOrientation::HH => 2,
    }
}

const fn zc_label_lh(h: u8, v: u8, d: u8) -> u8 {
    match (h, v, d) {
        (2, _, _) => 8,
        (1, 1.., _) => 7,
        (1, 0, 1..) => 6,
        (1, 0, 0) => 5,
        (0, 2, _) => 4,
        (0, 1, _) => 3,
        (0, 0, 2..) => 2,
        (0, 0, 1) => 1,
        _ => 0,
    }
}

const fn zc_label_hh(hv: u8, d: u8) -> u8 {
    match (hv, d) {
        (_, 3..) => 8,
        (1.., 2) => 7,
        (0, 2) => 6,
        (2.., 1) => 5,
        (1, 1) => 4,
        (0, 1) => 3,
        (2.., 0) => 2,
        (1, 0) => 1,
        _ => 0,
    }
}

const fn build_zc_tables() -> [[u8; 256]; 3] {
    let mut tables = [[0u8; 256]; 3];
    let mut bits = 0usize;
    while bits < 256 {
        let b = bits as u8;
        let h = ((b >> 3) & 1) + ((b >> 4) & 1);
        let v = ((b >> 1) & 1) + ((b >> 6) & 1);
        let d = (b & 1) + ((b >> 2) & 1) + ((b >> 5) & 1) + ((b >> 7) & 1);
        tables[0][bits] = zc_label_lh(h, v, d);
        tables[1][bits] = zc_label_lh(v, h, d);
        tables[2][bits] = zc_label_hh(h + v, d);
        bits += 1;
    }
    tables
}

static ZC_TABLES: [[u8; 256]; 3] = build_zc_tables();

/// Horizontal or vertical sign contribution of a neighbour pair (D.3.2).
const fn contribution(sig_a: bool, neg_a: bool, sig_b: bool, neg_b: bool) -> i32 {
    let a = if sig_a { if neg_a { -1 } else { 1 } } else { 0 };
    let b = if sig_b { if neg_b { -1 } else { 1 } } else { 0 };
    let sum = a + b;
    if sum > 0 {
        1
    } else if sum < 0 {
        -1
    } else {
        0
    }
}

const fn bit(i: usize, n: usize) -> bool {
    (i >> n) & 1 == 1
}

// Index layout: bits 0-3 significance of N, S, W, E; bits 4-7 their signs.
const fn build_sc_table() -> [(u8, u8); 256] {
    let mut table = [(0u8, 0u8); 256];
    let mut i = 0usize;
    while i < 256 {
        let h = contribution(bit(i, 2), bit(i, 6), bit(i, 3), bit(i, 7));
        let v = contribution(bit(i, 0), bit(i, 4), bit(i, 1), bit(i, 5));
        // Table D.3, with negative h mirrored onto positive h.
        let (h, v, xor) = if h < 0 || (h == 0 && v < 0) {
            (-h, -v, 1)
        } else {
            (h, v, 0)
        };
        let label = if h == 0 {
            if v == 0 { 0 } else { 1 }
        } else {
            3 + v
        };
        table[i] = (SC_CONTEXT_FIRST + label as u8, xor);
        i += 1;
    }
    table
}

static SC_TABLE: [(u8, u8); 256] = build_sc_table();

#[inline(always)]
pub fn zc_context(table: usize, flags: u32) -> u8 {
    ZC_TABLES[table][(flags & SIG_OTH) as usize]
}

#[inline(always)]
fn sc_index(flags: u32) -> usize {
    let sig = ((flags & SIG_N) >> 1)
        | ((flags & SIG_S) >> 5)
        | ((flags & SIG_W) >> 1)
        | ((flags & SIG_E) >> 1);
    let sgn = (flags & (SGN_N | SGN_S | SGN_W | SGN_E)) >> 4;
    (sig | sgn) as usize
}

/// Sign-coding context and the predicted-sign XOR bit.
#[inline(always)]
pub fn sc_context(flags: u32) -> (u8, u8) {
    SC_TABLE[sc_index(flags)]
}

#[inline(always)]
pub fn mr_context(flags: u32) -> u8 {
    if flags & REFINE != 0 {
        MR_CONTEXT_REFINED
    } else if flags & SIG_OTH != 0 {
        MR_CONTEXT_NEIGHBOR
    } else {
        MR_CONTEXT_NO_NEIGHBOR
    }
}
