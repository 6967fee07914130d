//! MQ Arithmetic Coder (ISO/IEC 15444-1 Annex C)
//!
//! The MPS occupies the upper part of the interval (`C += Qe` on MPS), so the
//! decoder compares `Chigh` against `Qe`. Byte stuffing follows C.2.4: a byte
//! after `0xFF` carries only 7 bits, and the decoder treats `0xFF` followed by
//! a byte above `0x8F` (or the end of the data) as a run of 1-bits.

use super::bit_plane_coder::{BitDecoder, BitEncoder};
use crate::constants::{
    CONTEXT_COUNT, INITIAL_CONTEXT_STATES, SEGMENTATION_SYMBOL, UNIFORM_CONTEXT,
};

#[derive(Clone, Copy)]
struct MqContextState {
    qe: u32,
    nmps: u8,
    nlps: u8,
    switch: bool,
}

const fn state(qe: u32, nmps: u8, nlps: u8, switch: bool) -> MqContextState {
    MqContextState {
        qe,
        nmps,
        nlps,
        switch,
    }
}

// Table C.2
#[rustfmt::skip]
const MQ_TABLE: [MqContextState; 47] = [
    state(0x5601, 1, 1, true),
    state(0x3401, 2, 6, false),
    state(0x1801, 3, 9, false),
    state(0x0AC1, 4, 12, false),
    state(0x0521, 5, 29, false),
    state(0x0221, 38, 33, false),
    state(0x5601, 7, 6, true),
    state(0x5401, 8, 14, false),
    state(0x4801, 9, 14, false),
    state(0x3801, 10, 14, false),
    state(0x3001, 11, 17, false),
    state(0x2401, 12, 18, false),
    state(0x1C01, 13, 20, false),
    state(0x1601, 29, 21, false),
    state(0x5601, 15, 14, true),
    state(0x5401, 16, 14, false),
    state(0x5101, 17, 15, false),
    state(0x4801, 18, 16, false),
    state(0x3801, 19, 17, false),
    state(0x3401, 20, 18, false),
    state(0x3001, 21, 19, false),
    state(0x2801, 22, 19, false),
    state(0x2401, 23, 20, false),
    state(0x2201, 24, 21, false),
    state(0x1C01, 25, 22, false),
    state(0x1801, 26, 23, false),
    state(0x1601, 27, 24, false),
    state(0x1401, 28, 25, false),
    state(0x1201, 29, 26, false),
    state(0x1101, 30, 27, false),
    state(0x0AC1, 31, 28, false),
    state(0x09C1, 32, 29, false),
    state(0x08A1, 33, 30, false),
    state(0x0521, 34, 31, false),
    state(0x0441, 35, 32, false),
    state(0x02A1, 36, 33, false),
    state(0x0221, 37, 34, false),
    state(0x0141, 38, 35, false),
    state(0x0111, 39, 36, false),
    state(0x0085, 40, 37, false),
    state(0x0049, 41, 38, false),
    state(0x0025, 42, 39, false),
    state(0x0015, 43, 40, false),
    state(0x0009, 44, 41, false),
    state(0x0005, 45, 42, false),
    state(0x0001, 45, 43, false),
    state(0x5601, 46, 46, false),
];

/// Probability state of every context label, packed as `(index << 1) | mps`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Contexts([u8; CONTEXT_COUNT]);

impl Default for Contexts {
    fn default() -> Self {
        let mut contexts = Self([0; CONTEXT_COUNT]);
        contexts.reset();
        contexts
    }
}

impl Contexts {
    fn reset(&mut self) {
        for (ctx, &index) in self.0.iter_mut().zip(INITIAL_CONTEXT_STATES.iter()) {
            *ctx = index << 1;
        }
    }

    #[inline(always)]
    fn lookup(&self, cx: u8) -> (MqContextState, u8) {
        let ctx = self.0[cx as usize];
        (MQ_TABLE[(ctx >> 1) as usize], ctx & 1)
    }

    #[inline(always)]
    fn after_mps(&mut self, cx: u8, entry: MqContextState, mps: u8) {
        self.0[cx as usize] = (entry.nmps << 1) | mps;
    }

    #[inline(always)]
    fn after_lps(&mut self, cx: u8, entry: MqContextState, mps: u8) {
        let mps = if entry.switch { 1 - mps } else { mps };
        self.0[cx as usize] = (entry.nlps << 1) | mps;
    }

    fn get(&self, cx: u8) -> (u8, u8) {
        let ctx = self.0[cx as usize];
        (ctx >> 1, ctx & 1)
    }

    fn set(&mut self, cx: u8, state_idx: u8, mps: u8) {
        debug_assert!((state_idx as usize) < MQ_TABLE.len());
        self.0[cx as usize] = (state_idx << 1) | (mps & 1);
    }
}

/// MQ encoder for one code-block.
///
/// Each terminated segment is produced into a fresh internal buffer; the
/// caller collects it with [`MqEncoder::bytes`] before calling
/// [`MqEncoder::restart`] for the next segment. Context states survive
/// restarts.
pub struct MqEncoder {
    a: u32,
    c: u32,
    ct: u32,
    // buf[0] stands for the byte preceding the segment and is never emitted.
    buf: Vec<u8>,
    bp: usize,
    contexts: Contexts,
}

impl Default for MqEncoder {
    fn default() -> Self {
        Self {
            a: 0x8000,
            c: 0,
            ct: 12,
            buf: vec![0],
            bp: 0,
            contexts: Contexts::default(),
        }
    }
}

impl MqEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// INITENC (C.2.8) without touching the contexts.
    pub fn restart(&mut self) {
        self.a = 0x8000;
        self.c = 0;
        self.ct = 12;
        self.buf.clear();
        self.buf.push(0);
        self.bp = 0;
    }

    pub fn reset_contexts(&mut self) {
        self.contexts.reset();
    }

    /// Probability state index and MPS of context `cx`.
    pub fn context(&self, cx: u8) -> (u8, u8) {
        self.contexts.get(cx)
    }

    pub fn set_context(&mut self, cx: u8, state_idx: u8, mps: u8) {
        self.contexts.set(cx, state_idx, mps);
    }

    /// ENCODE (C.2.2)
    pub fn encode(&mut self, cx: u8, d: u32) {
        let (entry, mps) = self.contexts.lookup(cx);
        if d == mps as u32 {
            self.code_mps(cx, entry, mps);
        } else {
            self.code_lps(cx, entry, mps);
        }
    }

    fn code_mps(&mut self, cx: u8, entry: MqContextState, mps: u8) {
        self.a -= entry.qe;
        if self.a & 0x8000 == 0 {
            if self.a < entry.qe {
                self.a = entry.qe;
            } else {
                self.c += entry.qe;
            }
            self.contexts.after_mps(cx, entry, mps);
            self.renormalize();
        } else {
            self.c += entry.qe;
        }
    }

    fn code_lps(&mut self, cx: u8, entry: MqContextState, mps: u8) {
        self.a -= entry.qe;
        if self.a < entry.qe {
            self.c += entry.qe;
        } else {
            self.a = entry.qe;
        }
        self.contexts.after_lps(cx, entry, mps);
        self.renormalize();
    }

    fn renormalize(&mut self) {
        loop {
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;
            if self.ct == 0 {
                self.byte_out();
            }
            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    /// BYTEOUT (C.2.6) with carry propagation into the previous byte.
    fn byte_out(&mut self) {
        if self.buf[self.bp] == 0xFF {
            self.emit((self.c >> 20) as u8);
            self.c &= 0xFFFFF;
            self.ct = 7;
        } else if self.c & 0x8000000 == 0 {
            self.emit((self.c >> 19) as u8);
            self.c &= 0x7FFFF;
            self.ct = 8;
        } else {
            self.buf[self.bp] += 1;
            if self.buf[self.bp] == 0xFF {
                self.c &= 0x7FFFFFF;
                self.emit((self.c >> 20) as u8);
                self.c &= 0xFFFFF;
                self.ct = 7;
            } else {
                self.emit((self.c >> 19) as u8);
                self.c &= 0x7FFFF;
                self.ct = 8;
            }
        }
    }

    fn emit(&mut self, byte: u8) {
        self.bp += 1;
        if self.bp == self.buf.len() {
            self.buf.push(byte);
        } else {
            self.buf[self.bp] = byte;
        }
    }

    /// FLUSH (C.2.9). A trailing `0xFF` is not part of the segment.
    pub fn flush(&mut self) {
        let temp = self.c + self.a;
        self.c |= 0xFFFF;
        if self.c >= temp {
            self.c -= 0x8000;
        }

        self.c <<= self.ct;
        self.byte_out();
        self.c <<= self.ct;
        self.byte_out();

        if self.buf[self.bp] != 0xFF {
            self.bp += 1;
        }
        log::trace!("MQ flush: {} bytes", self.num_bytes());
    }

    /// Predictable termination (D.4.2): emits only the bits needed to pin the
    /// code value inside the final interval.
    pub fn erterm(&mut self) {
        let mut k = 12 - self.ct as i32;
        while k > 0 {
            self.c <<= self.ct;
            self.ct = 0;
            self.byte_out();
            k -= self.ct as i32;
        }
        if self.buf[self.bp] != 0xFF {
            self.byte_out();
        }
        log::trace!("MQ predictable termination: {} bytes", self.num_bytes());
    }

    /// Codes the `1010` segmentation symbol in the uniform context.
    pub fn segmentation_symbol(&mut self) {
        for shift in (0..4).rev() {
            self.encode(UNIFORM_CONTEXT, ((SEGMENTATION_SYMBOL >> shift) & 1) as u32);
        }
    }

    /// Bytes of the current segment. Complete only after `flush`/`erterm`.
    pub fn bytes(&self) -> &[u8] {
        &self.buf[1..self.bp.max(1)]
    }

    pub fn num_bytes(&self) -> usize {
        self.bp.saturating_sub(1)
    }

    /// Length at which the current segment can be cut, without termination,
    /// and still decode every symbol coded so far.
    ///
    /// The decoder fills a cut stream with 1-bits. The fill keeps the code
    /// value inside `[C, C + A)` as long as every bit of `C` down to its LSB
    /// is kept: the carry byte `buf[bp]`, the pending byte and `20 - ct` more
    /// bits. Bytes after a stuffed `0xFF` carry 7 bits, so 7 is assumed for
    /// all of them.
    pub fn open_segment_length(&self) -> usize {
        let low_bits = (20 - self.ct) as usize;
        self.bp + 1 + low_bits.div_ceil(7)
    }
}

impl BitEncoder for MqEncoder {
    #[inline(always)]
    fn encode_bit(&mut self, cx: u8, bit: u32) {
        self.encode(cx, bit);
    }
}

/// MQ decoder over one segment. Reads past the end of the segment see `0xFF`.
pub struct MqDecoder<'a> {
    data: &'a [u8],
    bp: usize,
    a: u32,
    c: u32,
    ct: u32,
    contexts: Contexts,
}

impl<'a> MqDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let mut decoder = Self {
            data,
            bp: 0,
            a: 0x8000,
            c: 0,
            ct: 0,
            contexts: Contexts::default(),
        };
        decoder.restart(data);
        decoder
    }

    /// INITDEC (C.3.5) on a new segment, keeping the context states.
    pub fn restart(&mut self, data: &'a [u8]) {
        self.data = data;
        self.bp = 0;
        self.c = self.byte(0) << 16;
        self.byte_in();
        self.c <<= 7;
        self.ct -= 7;
        self.a = 0x8000;
    }

    pub fn reset_contexts(&mut self) {
        self.contexts.reset();
    }

    pub fn context(&self, cx: u8) -> (u8, u8) {
        self.contexts.get(cx)
    }

    pub fn set_context(&mut self, cx: u8, state_idx: u8, mps: u8) {
        self.contexts.set(cx, state_idx, mps);
    }

    /// Offset of the byte currently feeding the code register.
    pub fn position(&self) -> usize {
        self.bp
    }

    #[inline(always)]
    fn byte(&self, index: usize) -> u32 {
        self.data.get(index).copied().unwrap_or(0xFF) as u32
    }

    /// BYTEIN (C.3.4)
    fn byte_in(&mut self) {
        if self.byte(self.bp) == 0xFF {
            let next = self.byte(self.bp + 1);
            if next > 0x8F {
                self.c = self.c.wrapping_add(0xFF00);
                self.ct = 8;
            } else {
                self.bp += 1;
                self.c = self.c.wrapping_add(next << 9);
                self.ct = 7;
            }
        } else {
            self.bp += 1;
            self.c = self.c.wrapping_add(self.byte(self.bp) << 8);
            self.ct = 8;
        }
    }

    /// DECODE (C.3.2)
    pub fn decode(&mut self, cx: u8) -> u32 {
        let (entry, mps) = self.contexts.lookup(cx);
        self.a -= entry.qe;
        let d = if (self.c >> 16) < entry.qe {
            let d = self.lps_exchange(cx, entry, mps);
            self.renormalize();
            d
        } else {
            self.c -= entry.qe << 16;
            if self.a & 0x8000 == 0 {
                let d = self.mps_exchange(cx, entry, mps);
                self.renormalize();
                d
            } else {
                mps
            }
        };
        d as u32
    }

    fn lps_exchange(&mut self, cx: u8, entry: MqContextState, mps: u8) -> u8 {
        if self.a < entry.qe {
            self.a = entry.qe;
            self.contexts.after_mps(cx, entry, mps);
            mps
        } else {
            self.a = entry.qe;
            self.contexts.after_lps(cx, entry, mps);
            1 - mps
        }
    }

    fn mps_exchange(&mut self, cx: u8, entry: MqContextState, mps: u8) -> u8 {
        if self.a < entry.qe {
            self.contexts.after_lps(cx, entry, mps);
            1 - mps
        } else {
            self.contexts.after_mps(cx, entry, mps);
            mps
        }
    }

    /// RENORMD (C.3.3)
    fn renormalize(&mut self) {
        loop {
            if self.ct == 0 {
                self.byte_in();
            }
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;
            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    pub fn segmentation_symbol(&mut self) -> u8 {
        let mut symbol = 0u8;
        for _ in 0..4 {
            symbol = (symbol << 1) | self.decode(UNIFORM_CONTEXT) as u8;
        }
        symbol
    }
}

impl BitDecoder for MqDecoder<'_> {
    #[inline(always)]
    fn decode_bit(&mut self, cx: u8) -> u32 {
        self.decode(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::RUN_LENGTH_CONTEXT;

    // ITU-T T.88 H.2 test sequence: one context starting at state 0, MPS 0.
    static H2_ENCODED: [u8; 30] = [
        0x84, 0xC7, 0x3B, 0xFC, 0xE1, 0xA1, 0x43, 0x04, 0x02, 0x20, 0x00, 0x00, 0x41, 0x0D, 0xBB,
        0x86, 0xF4, 0x31, 0x7F, 0xFF, 0x88, 0xFF, 0x37, 0x47, 0x1A, 0xDB, 0x6A, 0xDF, 0xFF, 0xAC,
    ];
    static H2_DECODED: [u8; 32] = [
        0x00, 0x02, 0x00, 0x51, 0x00, 0x00, 0x00, 0xC0, 0x03, 0x52, 0x87, 0x2A, 0xAA, 0xAA, 0xAA,
        0xAA, 0x82, 0xC0, 0x20, 0x00, 0xFC, 0xD7, 0x9E, 0xF6, 0xBF, 0x7F, 0xED, 0x90, 0x4F, 0x46,
        0xA3, 0xBF,
    ];

    fn h2_bits() -> impl Iterator<Item = u32> {
        H2_DECODED
            .iter()
            .flat_map(|&byte| (0..8).rev().map(move |shift| ((byte >> shift) & 1) as u32))
    }

    #[test]
    fn test_mq_init() {
        let mq = MqEncoder::new();
        assert_eq!(mq.a, 0x8000);
        assert_eq!(mq.ct, 12);
        assert_eq!(mq.context(0), (4, 0));
        assert_eq!(mq.context(RUN_LENGTH_CONTEXT), (3, 0));
        assert_eq!(mq.context(UNIFORM_CONTEXT), (46, 0));
        assert_eq!(mq.context(5), (0, 0));
    }

    #[test]
    fn test_mq_decode_t88_sequence() {
        let mut mq = MqDecoder::new(&H2_ENCODED);
        mq.set_context(0, 0, 0);
        let decoded: Vec<u32> = (0..256).map(|_| mq.decode(0)).collect();
        assert_eq!(decoded, h2_bits().collect::<Vec<_>>());
    }

    #[test]
    fn test_mq_encode_t88_sequence() {
        let mut mq = MqEncoder::new();
        mq.set_context(0, 0, 0);
        for bit in h2_bits() {
            mq.encode(0, bit);
        }
        mq.flush();
        let bytes = mq.bytes();
        assert!(bytes.len() >= 28);
        assert_eq!(&bytes[..28], &H2_ENCODED[..28]);
    }

    #[test]
    fn test_mq_encode_decode_roundtrip() {
        let bits: Vec<u32> = vec![0, 0, 1, 0, 1, 1, 0, 1, 0, 0];
        let mut enc = MqEncoder::new();
        for &b in &bits {
            enc.encode(0, b);
        }
        enc.flush();

        let mut dec = MqDecoder::new(enc.bytes());
        let decoded: Vec<u32> = bits.iter().map(|_| dec.decode(0)).collect();
        assert_eq!(bits, decoded);
    }

    fn mixed_symbols(count: usize) -> Vec<(u8, u32)> {
        let mut seed = 0x2545_F491u32;
        (0..count)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                let cx = (seed % CONTEXT_COUNT as u32) as u8;
                // Skewed toward 0 so that contexts adapt.
                let bit = ((seed >> 8) % 7 == 0) as u32;
                (cx, bit)
            })
            .collect()
    }

    #[test]
    fn test_mq_multi_context_roundtrip() {
        let symbols = mixed_symbols(5000);
        let mut enc = MqEncoder::new();
        for &(cx, bit) in &symbols {
            enc.encode(cx, bit);
        }
        enc.flush();
        assert!(!enc.bytes().ends_with(&[0xFF]));

        let mut dec = MqDecoder::new(enc.bytes());
        for (i, &(cx, bit)) in symbols.iter().enumerate() {
            assert_eq!(dec.decode(cx), bit, "symbol {} in context {}", i, cx);
        }
        assert_eq!(enc.context(RUN_LENGTH_CONTEXT), dec.context(RUN_LENGTH_CONTEXT));
    }

    #[test]
    fn test_mq_erterm_roundtrip() {
        let symbols = mixed_symbols(777);
        let mut enc = MqEncoder::new();
        for &(cx, bit) in &symbols {
            enc.encode(cx, bit);
        }
        enc.erterm();
        let mut dec = MqDecoder::new(enc.bytes());
        for &(cx, bit) in &symbols {
            assert_eq!(dec.decode(cx), bit);
        }
    }

    #[test]
    fn test_mq_restart_keeps_contexts() {
        let first = mixed_symbols(300);
        let second: Vec<(u8, u32)> = mixed_symbols(600).into_iter().skip(300).collect();

        let mut enc = MqEncoder::new();
        for &(cx, bit) in &first {
            enc.encode(cx, bit);
        }
        enc.flush();
        let segment_a = enc.bytes().to_vec();
        enc.restart();
        for &(cx, bit) in &second {
            enc.encode(cx, bit);
        }
        enc.flush();
        let segment_b = enc.bytes().to_vec();

        let mut dec = MqDecoder::new(&segment_a);
        for &(cx, bit) in &first {
            assert_eq!(dec.decode(cx), bit);
        }
        dec.restart(&segment_b);
        for &(cx, bit) in &second {
            assert_eq!(dec.decode(cx), bit);
        }
    }

    #[test]
    fn test_mq_open_segment_length_is_a_cut_point() {
        for symbols in [mixed_symbols(1500), mixed_symbols(3000)[1500..].to_vec()] {
            let mut enc = MqEncoder::new();
            let mut cuts = Vec::with_capacity(symbols.len());
            for &(cx, bit) in &symbols {
                enc.encode(cx, bit);
                cuts.push(enc.open_segment_length());
            }
            enc.flush();
            let stream = enc.bytes();

            for (k, &cut) in cuts.iter().enumerate() {
                let mut dec = MqDecoder::new(&stream[..cut.min(stream.len())]);
                for (i, &(cx, bit)) in symbols[..=k].iter().enumerate() {
                    assert_eq!(dec.decode(cx), bit, "symbol {} of a {}-byte cut", i, cut);
                }
            }
        }
    }

    #[test]
    fn test_mq_open_segment_length_bounds() {
        let mut enc = MqEncoder::new();
        assert_eq!(enc.open_segment_length(), 3);
        for &(cx, bit) in &mixed_symbols(400) {
            enc.encode(cx, bit);
            let extra = enc.open_segment_length() - enc.bp;
            assert!((3..=4).contains(&extra), "{} bytes past the carry byte", extra);
        }
    }

    #[test]
    fn test_mq_segmentation_symbol() {
        let mut enc = MqEncoder::new();
        enc.encode(3, 1);
        enc.segmentation_symbol();
        enc.flush();
        let mut dec = MqDecoder::new(enc.bytes());
        assert_eq!(dec.decode(3), 1);
        assert_eq!(dec.segmentation_symbol(), SEGMENTATION_SYMBOL);
    }

    #[test]
    fn test_mq_empty_segment_decodes_deterministically() {
        let mut dec = MqDecoder::new(&[]);
        let first: Vec<u32> = (0..16).map(|_| dec.decode(UNIFORM_CONTEXT)).collect();
        let mut dec = MqDecoder::new(&[]);
        let second: Vec<u32> = (0..16).map(|_| dec.decode(UNIFORM_CONTEXT)).collect();
        assert_eq!(first, second);
    }
}
