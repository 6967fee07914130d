//! Distortion-reduction estimates for rate allocation.
//!
//! Each table is indexed by the magnitude bits at and below the current
//! bit-plane, read as a fixed-point fraction with 6 fractional bits. Entries
//! are the mean-squared-error decrease in units of `1/8192` of the squared
//! plane weight: `sig` for a sample that becomes significant (reconstructed
//! at 1.5 instead of 0), `ref` for a refinement (1.5 or 0.5 instead of 1.0).
//! The `*0` variants apply to the last plane, which is reconstructed without
//! the half-step offset.

const NMSEDEC_BITS: u32 = 7;
const NMSEDEC_FRACBITS: u32 = 6;
const TABLE_LEN: usize = 1 << NMSEDEC_BITS;

const fn rounded_square_over(numerator: i64) -> i64 {
    (numerator * numerator + 32) / 64
}

const fn build(kind: u8) -> [i32; TABLE_LEN] {
    let mut table = [0i32; TABLE_LEN];
    let mut i = 0;
    while i < TABLE_LEN {
        let t = i as i64;
        // Values are floor(x * 64 + 0.5) * 128 where x is the error term
        // expressed with t = i / 64.
        let v = match kind {
            0 => 384 * t - 18432,
            1 => rounded_square_over(t) * 128,
            2 => {
                if i & (1 << (NMSEDEC_BITS - 1)) != 0 {
                    128 * t - 10240
                } else {
                    128 * (48 - t)
                }
            }
            _ => rounded_square_over(t - 64) * 128,
        };
        table[i] = if v > 0 { v as i32 } else { 0 };
        i += 1;
    }
    table
}

static NMSEDEC_SIG: [i32; TABLE_LEN] = build(0);
static NMSEDEC_SIG0: [i32; TABLE_LEN] = build(1);
static NMSEDEC_REF: [i32; TABLE_LEN] = build(2);
static NMSEDEC_REF0: [i32; TABLE_LEN] = build(3);

#[inline(always)]
fn index(magnitude: u32, bitplane: u8) -> usize {
    (((magnitude as u64) << NMSEDEC_FRACBITS) >> bitplane) as usize & (TABLE_LEN - 1)
}

/// Estimate for a sample that became significant in `bitplane`.
#[inline]
pub fn significance(magnitude: u32, bitplane: u8) -> i64 {
    let i = index(magnitude, bitplane);
    if bitplane > 0 {
        NMSEDEC_SIG[i] as i64
    } else {
        NMSEDEC_SIG0[i] as i64
    }
}

/// Estimate for a refinement of `bitplane`.
#[inline]
pub fn refinement(magnitude: u32, bitplane: u8) -> i64 {
    let i = index(magnitude, bitplane);
    if bitplane > 0 {
        NMSEDEC_REF[i] as i64
    } else {
        NMSEDEC_REF0[i] as i64
    }
}

/// Scales a pass's summed table entries to squared-error units.
pub fn weighted(nmsedec: i64, bitplane: u8, weight: f64) -> f64 {
    let scale = weight * (1u64 << bitplane) as f64;
    scale * scale * nmsedec as f64 / 8192.0
}
