//! Container for one encoded code-block: geometry, style, the pass table and
//! the coded bytes. All fields are big-endian.
//!
//! ```text
//! "T1CB" version:u8
//! width:u32 height:u32 orientation:u8 style:u8 numbps:u8
//! pass_count:u32 { kind:u8 bitplane:u8 flags:u8 rate:u32 distortion:u64 }*
//! data_len:u32 data
//! ```

use crate::SubbandOrientation;
use crate::coding_parameters::CodeBlockStyle;
use crate::constants::MAX_BITPLANES;
use crate::error::T1Error;
use crate::jpeg2000::bit_plane_coder::pass_count;
use crate::jpeg2000::code_block::{CodingPass, EncodedCodeBlock, PassKind};

pub const MAGIC: [u8; 4] = *b"T1CB";
pub const VERSION: u8 = 1;

const PASS_TERMINATED: u8 = 0x01;
const PASS_RAW: u8 = 0x02;

struct BlockWriter {
    buffer: Vec<u8>,
}

impl BlockWriter {
    fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    fn write_u32(&mut self, value: usize) -> Result<(), T1Error> {
        let value = u32::try_from(value)
            .map_err(|_| T1Error::InvalidBlockFile("field exceeds 32 bits"))?;
        self.buffer.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    fn write_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }
}

/// Serializes an encoded block.
pub fn write_block(block: &EncodedCodeBlock) -> Result<Vec<u8>, T1Error> {
    let mut writer = BlockWriter {
        buffer: Vec::with_capacity(24 + block.passes.len() * 15 + block.data.len()),
    };
    writer.buffer.extend_from_slice(&MAGIC);
    writer.write_u8(VERSION);
    writer.write_u32(block.width as usize)?;
    writer.write_u32(block.height as usize)?;
    writer.write_u8(block.orientation.into());
    writer.write_u8(block.style.bits());
    writer.write_u8(block.numbps);
    writer.write_u32(block.passes.len())?;
    for pass in &block.passes {
        writer.write_u8(pass.kind.into());
        writer.write_u8(pass.bitplane);
        let mut flags = 0;
        if pass.terminated {
            flags |= PASS_TERMINATED;
        }
        if pass.raw {
            flags |= PASS_RAW;
        }
        writer.write_u8(flags);
        writer.write_u32(pass.rate)?;
        writer.write_u64(pass.distortion.to_bits());
    }
    writer.write_u32(block.data.len())?;
    writer.buffer.extend_from_slice(&block.data);
    Ok(writer.buffer)
}

struct BlockReader<'a> {
    source: &'a [u8],
    position: usize,
}

impl<'a> BlockReader<'a> {
    fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], T1Error> {
        let end = self
            .position
            .checked_add(count)
            .filter(|&end| end <= self.source.len())
            .ok_or(T1Error::InvalidBlockFile("unexpected end of file"))?;
        let bytes = &self.source[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, T1Error> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, T1Error> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> Result<u64, T1Error> {
        let high = self.read_u32()? as u64;
        let low = self.read_u32()? as u64;
        Ok((high << 32) | low)
    }
}

/// Parses a block file produced by [`write_block`].
pub fn read_block(source: &[u8]) -> Result<EncodedCodeBlock, T1Error> {
    let mut reader = BlockReader { source, position: 0 };
    if reader.read_bytes(MAGIC.len())? != MAGIC {
        return Err(T1Error::InvalidBlockFile("bad magic"));
    }
    if reader.read_u8()? != VERSION {
        return Err(T1Error::InvalidBlockFile("unsupported version"));
    }

    let width = reader.read_u32()?;
    let height = reader.read_u32()?;
    if width == 0 || height == 0 {
        return Err(T1Error::InvalidBlockFile("empty code-block"));
    }
    let orientation = SubbandOrientation::try_from(reader.read_u8()?)
        .map_err(|_| T1Error::InvalidBlockFile("unknown sub-band orientation"))?;
    let style = CodeBlockStyle::from_bits(reader.read_u8()?)
        .ok_or(T1Error::InvalidBlockFile("unknown code-block style bits"))?;
    let numbps = reader.read_u8()?;
    if numbps > MAX_BITPLANES {
        return Err(T1Error::InvalidBlockFile("too many bit-planes"));
    }

    let count = reader.read_u32()? as usize;
    if count > pass_count(numbps) {
        return Err(T1Error::InvalidBlockFile("more passes than bit-planes allow"));
    }
    let mut passes = Vec::with_capacity(count);
    for _ in 0..count {
        let kind = PassKind::try_from(reader.read_u8()?)
            .map_err(|_| T1Error::InvalidBlockFile("unknown pass kind"))?;
        let bitplane = reader.read_u8()?;
        let flags = reader.read_u8()?;
        if flags & !(PASS_TERMINATED | PASS_RAW) != 0 {
            return Err(T1Error::InvalidBlockFile("unknown pass flags"));
        }
        let rate = reader.read_u32()? as usize;
        let distortion = f64::from_bits(reader.read_u64()?);
        passes.push(CodingPass {
            kind,
            bitplane,
            rate,
            distortion,
            terminated: flags & PASS_TERMINATED != 0,
            raw: flags & PASS_RAW != 0,
        });
    }

    let len = reader.read_u32()? as usize;
    let data = reader.read_bytes(len)?.to_vec();
    if reader.position != source.len() {
        return Err(T1Error::InvalidBlockFile("trailing bytes"));
    }
    if passes.iter().any(|pass| pass.rate > data.len()) {
        return Err(T1Error::InvalidBlockFile("pass rate exceeds data length"));
    }

    Ok(EncodedCodeBlock {
        width,
        height,
        orientation,
        style,
        numbps,
        data,
        passes,
    })
}
