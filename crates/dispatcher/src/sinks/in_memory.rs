//! InMemorySink - collects events for tests and embedding

use std::sync::{Arc, Mutex, PoisonError};

use contracts::{ContractError, EventSink, KubeEvent};

/// Shared view of everything an [`InMemorySink`] received
#[derive(Debug, Clone, Default)]
pub struct RecordedEvents {
    events: Arc<Mutex<Vec<Arc<KubeEvent>>>>,
    closed: Arc<Mutex<u32>>,
}

impl RecordedEvents {
    /// Copy of the received events, in arrival order
    pub fn snapshot(&self) -> Vec<Arc<KubeEvent>> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times the sink was closed
    pub fn close_count(&self) -> u32 {
        *self.closed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sink that keeps every event in memory
pub struct InMemorySink {
    name: String,
    recorded: RecordedEvents,
}

impl InMemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            recorded: RecordedEvents::default(),
        }
    }

    /// Handle that stays valid after the sink moves into a worker
    pub fn events(&self) -> RecordedEvents {
        self.recorded.clone()
    }
}

impl EventSink for InMemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&mut self, event: &Arc<KubeEvent>) -> Result<(), ContractError> {
        self.recorded
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(event));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        *self
            .recorded
            .closed
            .lock()
            .unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}
