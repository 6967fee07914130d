//! EBCOT tier-1 code-block coding (ISO/IEC 15444-1 Annexes C and D).
//!
//! - `mq_coder`: the MQ arithmetic coder and its probability states.
//! - `bit_io`: raw bit packing for the lazy (bypass) mode.
//! - `flags`: per-sample state words with neighbour significance.
//! - `context_model`: zero, sign and refinement context formation.
//! - `distortion`: per-pass distortion estimates.
//! - `bit_plane_coder`: the significance, refinement and cleanup passes.
//! - `code_block`: block scratch plus the encoder's and decoder's data model.
//! - `encoder` / `decoder`: the per-block drivers.
//! - `parallel`: batches of independent blocks.

pub mod bit_io;
pub mod bit_plane_coder;
pub mod code_block;
pub mod context_model;
pub mod decoder;
pub mod distortion;
pub mod encoder;
pub mod flags;
pub mod mq_coder;
pub mod parallel;
