//! # Routing
//!
//! Rule tree that decides, per event, which receivers get it.
//!
//! - Rules are compiled once at load time into immutable matchers
//! - `Route::process` runs synchronously on the caller's thread
//! - Dispatch goes through the [`ReceiverRegistry`] capability only

pub mod error;
pub mod route;
pub mod rule;

pub use contracts::{KubeEvent, ReceiverRegistry};
pub use error::RoutingError;
pub use route::Route;
pub use rule::Rule;
