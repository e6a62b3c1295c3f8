//! In-memory event source for tests and dry runs

use crate::{EventSource, SourceEvent};
use std::collections::VecDeque;
use std::time::Duration;

/// Replays queued events. `Idle` entries, and an empty queue, wait out the
/// full poll timeout like a quiet broker would.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    queue: VecDeque<SourceEvent>,
    connected: bool,
    polls: usize,
}

impl ScriptedSource {
    /// Create a connected source with an empty script
    pub fn new() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    pub fn push_payload(&mut self, payload: impl Into<Vec<u8>>) {
        self.queue.push_back(SourceEvent::Payload(payload.into()));
    }

    pub fn push_idle(&mut self) {
        self.queue.push_back(SourceEvent::Idle);
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Events not yet delivered
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Number of polls served so far
    pub fn polls(&self) -> usize {
        self.polls
    }
}

impl EventSource for ScriptedSource {
    async fn poll(&mut self, timeout: Duration) -> SourceEvent {
        self.polls += 1;
        match self.queue.pop_front() {
            Some(SourceEvent::Payload(bytes)) => SourceEvent::Payload(bytes),
            Some(SourceEvent::Idle) | None => {
                tokio::time::sleep(timeout).await;
                SourceEvent::Idle
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
