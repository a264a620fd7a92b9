//! # Dispatcher
//!
//! 事件分发模块。
//!
//! 负责：
//! - 按名称注册 receiver，每个 receiver 独立队列 + worker
//! - 路由结果 fan-out 到 receiver 队列（try_send，不阻塞调用方）
//! - 隔离慢 sink，队列满时丢弃并计数
//! - 关闭时排空队列，每个 sink 只 close 一次

pub mod engine;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod registry;
pub mod sinks;

pub use contracts::{EventSink, KubeEvent, ReceiverRegistry};
pub use engine::{writer_config, Engine};
pub use error::DispatcherError;
pub use handle::ReceiverHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use registry::{ChannelRegistry, RegistryBuilder, DEFAULT_QUEUE_CAPACITY};
pub use sinks::{
    BatchedSink, FileBatchHandler, FileSink, InMemorySink, LogSink, RecordedEvents, StdoutSink,
    UdpSink,
};
