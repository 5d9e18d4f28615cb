// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free window statistics used by the spread builder.

pub mod sma;
