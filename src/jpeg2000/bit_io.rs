//! Raw bit packing for the arithmetic-coder bypass (lazy) mode, D.6.
//!
//! Bits are written MSB first without modelling. After a `0xFF` byte the next
//! byte carries only 7 bits so no marker code can appear in the segment.

use super::bit_plane_coder::{BitDecoder, BitEncoder};

pub struct RawEncoder {
    data: Vec<u8>,
    c: u8,
    // Free bit positions left in `c`.
    ct: u8,
    // Bits that fit in the byte being filled (7 after a 0xFF).
    capacity: u8,
}

impl Default for RawEncoder {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            c: 0,
            ct: 8,
            capacity: 8,
        }
    }
}

impl RawEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restart(&mut self) {
        self.data.clear();
        self.c = 0;
        self.ct = 8;
        self.capacity = 8;
    }

    pub fn write_bit(&mut self, bit: u32) {
        self.ct -= 1;
        self.c |= ((bit & 1) as u8) << self.ct;
        if self.ct == 0 {
            self.data.push(self.c);
            self.capacity = if self.c == 0xFF { 7 } else { 8 };
            self.ct = self.capacity;
            self.c = 0;
        }
    }

    fn pending_bits(&self) -> u8 {
        self.capacity - self.ct
    }

    /// Whether the open byte must be counted in the rate of a pass that ends
    /// here without termination.
    pub fn extra_bytes(&self, predictable: bool) -> usize {
        let pad_empty = predictable && self.ct == 7;
        usize::from(self.pending_bits() > 0 || pad_empty)
    }

    /// Terminates the raw segment.
    ///
    /// Pending bits are completed with an alternating `0101...` pattern. A
    /// trailing `0xFF`, or a trailing `0xFF 0x7F` pair, is dropped unless
    /// termination must be predictable: the decoder reproduces both from its
    /// implicit `0xFF` fill.
    pub fn flush(&mut self, predictable: bool) {
        if self.pending_bits() > 0 || (predictable && self.ct == 7) {
            let mut bit = 0;
            while self.ct > 0 {
                self.ct -= 1;
                self.c |= bit << self.ct;
                bit ^= 1;
            }
            self.data.push(self.c);
        } else if self.ct == 7 {
            // Nothing follows the 0xFF that set the 7-bit capacity.
            self.data.pop();
        } else if !predictable && self.data.ends_with(&[0xFF, 0x7F]) {
            self.data.truncate(self.data.len() - 2);
        }
        self.c = 0;
        self.ct = 8;
        self.capacity = 8;
        log::trace!("raw flush: {} bytes", self.data.len());
    }

    pub fn num_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

impl BitEncoder for RawEncoder {
    #[inline(always)]
    fn encode_bit(&mut self, _cx: u8, bit: u32) {
        self.write_bit(bit);
    }
}

/// Raw bit reader. Reads past the end of the segment see `0xFF`.
pub struct RawDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    c: u8,
    ct: u8,
}

impl<'a> RawDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            c: 0,
            ct: 0,
        }
    }

    fn byte(&self) -> u8 {
        self.data.get(self.pos).copied().unwrap_or(0xFF)
    }

    pub fn read_bit(&mut self) -> u32 {
        if self.ct == 0 {
            if self.c == 0xFF {
                if self.byte() > 0x8F {
                    self.c = 0xFF;
                    self.ct = 8;
                } else {
                    self.c = self.byte();
                    self.pos += 1;
                    self.ct = 7;
                }
            } else {
                self.c = self.byte();
                self.pos += 1;
                self.ct = 8;
            }
        }
        self.ct -= 1;
        ((self.c >> self.ct) & 1) as u32
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

impl BitDecoder for RawDecoder<'_> {
    #[inline(always)]
    fn decode_bit(&mut self, _cx: u8) -> u32 {
        self.read_bit()
    }
}
