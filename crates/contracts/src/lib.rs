//! # Contracts
//!
//! Frozen interface contracts shared by every exporter crate: the event
//! record, the sink and registry capabilities, the error type and the
//! configuration data model.
//! All business crates depend on this crate, reverse dependencies are prohibited.
//!
//! ## Ownership Model
//! - Events are created by the upstream watcher and never mutated afterwards
//! - The registry shares one `Arc<KubeEvent>` between all destinations

mod config;
mod error;
mod event;
mod registry;
mod sink;

pub use config::*;
pub use error::*;
pub use event::*;
pub use registry::ReceiverRegistry;
pub use sink::*;
