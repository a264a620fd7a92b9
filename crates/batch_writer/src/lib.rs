//! # Batch Writer
//!
//! Buffer-flush-retry primitive for sinks with bulk APIs.
//!
//! 负责：
//! - Group submitted items into batches (size or interval triggered)
//! - Retry failed items up to a cap, ahead of new backlog
//! - Apply backpressure to producers instead of queuing without bound

pub mod error;
pub mod writer;

pub use error::BatchError;
pub use writer::{BatchHandler, BatchWriter, RunningWriter, WriterConfig, WriterStats};
