//! Synthetic RDS bit streams for tests and benchmarks
//!
//! - `groups` - plausible group sequences (PS and RadioText)
//! - `noise` - seeded channel impairments on soft samples
//! - `stream` - assembling groups, impairments, slips and gaps into samples

pub mod groups;
pub mod noise;
pub mod stream;

pub use groups::GroupSource;
pub use stream::{StreamBuilder, StreamEvent};
