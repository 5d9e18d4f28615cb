// =============================================================================
// Spread Module — さや比 of two instruments
// =============================================================================

pub mod align;
pub mod builder;
pub mod pipeline;

pub use builder::DEFAULT_WINDOW;
pub use pipeline::{compare, SpreadReport, SpreadRequest};
