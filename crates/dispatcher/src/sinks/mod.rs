//! Sink implementations
//!
//! Contains LogSink, StdoutSink, FileSink, UdpSink, InMemorySink and the
//! BatchedSink adapter.

mod batched;
mod file;
mod in_memory;
mod log;
mod stdout;
mod udp;

pub use self::batched::BatchedSink;
pub use self::file::{parse_dedot, FileBatchHandler, FileSink, FileSinkConfig};
pub use self::in_memory::{InMemorySink, RecordedEvents};
pub use self::log::LogSink;
pub use self::stdout::StdoutSink;
pub use self::udp::{UdpSink, UdpSinkConfig};
