//! Batch coding of independent code-blocks.
//!
//! Code-blocks share no state, so a batch is split across worker threads
//! when the `rayon` feature is enabled. Each worker owns one encoder or
//! decoder and reuses its scratch buffers for every block it takes. Results
//! come back in input order whatever the build.

use super::code_block::{DecodedCodeBlock, EncodedCodeBlock, Segment};
use super::decoder::CodeBlockDecoder;
use super::encoder::CodeBlockEncoder;
use crate::coding_parameters::{CodingParameters, DecodeParameters};
use crate::error::T1Error;

/// One block to encode.
#[derive(Debug, Clone, Copy)]
pub struct EncodeJob<'a> {
    pub parameters: CodingParameters,
    pub width: u32,
    pub height: u32,
    pub coefficients: &'a [i32],
}

/// One block to decode.
#[derive(Debug, Clone)]
pub struct DecodeJob<'a> {
    pub parameters: DecodeParameters,
    pub segments: Vec<Segment<'a>>,
}

fn encode_one(
    encoder: &mut CodeBlockEncoder,
    job: &EncodeJob<'_>,
) -> Result<EncodedCodeBlock, T1Error> {
    encoder.encode(&job.parameters, job.width, job.height, job.coefficients)
}

fn decode_one(
    decoder: &mut CodeBlockDecoder,
    job: &DecodeJob<'_>,
) -> Result<DecodedCodeBlock, T1Error> {
    decoder.decode(&job.parameters, &job.segments)
}

/// Encodes every job. A failing block does not affect the others.
pub fn encode_code_blocks(jobs: &[EncodeJob<'_>]) -> Vec<Result<EncodedCodeBlock, T1Error>> {
    log::debug!("encoding {} code-blocks", jobs.len());

    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        jobs.par_iter()
            .map_init(CodeBlockEncoder::new, encode_one)
            .collect()
    }

    #[cfg(not(feature = "rayon"))]
    {
        let mut encoder = CodeBlockEncoder::new();
        jobs.iter().map(|job| encode_one(&mut encoder, job)).collect()
    }
}

/// Decodes every job. A failing block does not affect the others.
pub fn decode_code_blocks(jobs: &[DecodeJob<'_>]) -> Vec<Result<DecodedCodeBlock, T1Error>> {
    log::debug!("decoding {} code-blocks", jobs.len());

    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        jobs.par_iter()
            .map_init(CodeBlockDecoder::new, decode_one)
            .collect()
    }

    #[cfg(not(feature = "rayon"))]
    {
        let mut decoder = CodeBlockDecoder::new();
        jobs.iter().map(|job| decode_one(&mut decoder, job)).collect()
    }
}
