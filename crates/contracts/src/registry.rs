//! ReceiverRegistry - the capability the routing engine dispatches through

use std::sync::Arc;

use crate::KubeEvent;

/// Named-destination dispatch
///
/// Implementations must never block the caller: routing runs synchronously
/// on the event source's thread. Unknown names are a configuration error that
/// is logged and absorbed, never propagated.
pub trait ReceiverRegistry {
    /// Hand `event` to the destination registered as `name`
    fn send_event(&self, name: &str, event: &Arc<KubeEvent>);
}

impl<R: ReceiverRegistry + ?Sized> ReceiverRegistry for &R {
    fn send_event(&self, name: &str, event: &Arc<KubeEvent>) {
        (**self).send_event(name, event)
    }
}

impl<R: ReceiverRegistry + ?Sized> ReceiverRegistry for Arc<R> {
    fn send_event(&self, name: &str, event: &Arc<KubeEvent>) {
        (**self).send_event(name, event)
    }
}
