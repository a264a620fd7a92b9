//! Event input and run statistics.

mod source;
mod stats;

pub use source::EventReader;
pub use stats::RunStats;
