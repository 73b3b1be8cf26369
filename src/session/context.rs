use std::sync::Arc;

use uuid::Uuid;

use crate::event::Event;
use crate::queue::EventQueue;

use super::state::SharedState;

/// Everything the session's threads share, built once per session and
/// handed to each component by `Arc`.
pub struct SessionContext {
    id: String,
    pub queue: EventQueue<Event>,
    pub state: SharedState,
}

impl SessionContext {
    pub fn new() -> Arc<Self> {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            queue: EventQueue::new(),
            state: SharedState::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Short form of the id for thread names and log lines.
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(8)
            .map(|(idx, _)| idx)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }

    /// Stop the session: flip the state and release the exporter if it is
    /// parked on an empty queue. Returns `true` for the call that stopped it.
    pub fn shutdown(&self) -> bool {
        let stopped = self.state.stop();
        self.queue.close();
        stopped
    }
}
