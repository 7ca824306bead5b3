//! Field extraction module.
//!
//! Flattens decoder payloads into displayable records and shapes values for
//! the document store.

pub mod normalize;
pub mod values;

pub use normalize::*;
pub use values::*;
