//! Filter module.
//!
//! The `(type-set, time-range)` predicate and the two query paths that
//! evaluate it, plus JSON export and key summaries.

pub mod engine;
pub mod export;
pub mod spec;
pub mod summary;

pub use engine::*;
pub use export::*;
pub use spec::*;
pub use summary::*;
