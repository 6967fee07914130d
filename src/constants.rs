// Context labels (ISO/IEC 15444-1 Annex D)
pub const ZC_CONTEXT_FIRST: u8 = 0;
pub const SC_CONTEXT_FIRST: u8 = 9;
pub const MR_CONTEXT_FIRST: u8 = 14;
pub const MR_CONTEXT_NO_NEIGHBOR: u8 = MR_CONTEXT_FIRST;
pub const MR_CONTEXT_NEIGHBOR: u8 = MR_CONTEXT_FIRST + 1;
pub const MR_CONTEXT_REFINED: u8 = MR_CONTEXT_FIRST + 2;
pub const RUN_LENGTH_CONTEXT: u8 = 17;
pub const UNIFORM_CONTEXT: u8 = 18;
pub const CONTEXT_COUNT: usize = 19;

/// Initial MQ probability-state index per context label (Table D.7).
pub const INITIAL_CONTEXT_STATES: [u8; CONTEXT_COUNT] = {
    let mut states = [0u8; CONTEXT_COUNT];
    states[ZC_CONTEXT_FIRST as usize] = 4;
    states[RUN_LENGTH_CONTEXT as usize] = 3;
    states[UNIFORM_CONTEXT as usize] = 46;
    states
};

/// Symbol coded in the uniform context after each cleanup pass when
/// segmentation symbols are enabled.
pub const SEGMENTATION_SYMBOL: u8 = 0b1010;

pub const STRIPE_HEIGHT: u32 = 4;

/// Magnitudes are carried in `u32` with one spare bit for the half-bit
/// reconstruction offset used by the decoder.
pub const MAX_BITPLANES: u8 = 31;

/// Significance / refinement passes are raw-coded in lazy mode only once
/// this many bit-planes have been coded with the MQ coder.
pub const BYPASS_MQ_BITPLANES: u8 = 4;
