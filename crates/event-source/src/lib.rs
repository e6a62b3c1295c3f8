//! Detection Event Sources
//!
//! The control loop pulls payloads from an [`EventSource`] with a bounded
//! wait, so the alert decay check always runs on schedule even when the
//! broker is silent or unreachable.

mod mqtt;
mod scripted;

pub use mqtt::{incoming_packet_limit, topic_matches, MqttConfig, MqttSource, TlsFiles};
pub use scripted::ScriptedSource;

use std::time::Duration;
use thiserror::Error;

/// Event source error types
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Credentials {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid source configuration: {0}")]
    Config(String),
}

/// Result of one bounded poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// Raw bytes of one detection event
    Payload(Vec<u8>),
    /// Nothing arrived before the timeout
    Idle,
}

/// Supplier of detection payloads and connectivity.
///
/// Implementations are driven from a single task and are never polled
/// concurrently with themselves.
#[allow(async_fn_in_trait)]
pub trait EventSource {
    /// Wait at most `timeout` for the next payload
    async fn poll(&mut self, timeout: Duration) -> SourceEvent;

    /// Whether a broker session is currently established
    fn is_connected(&self) -> bool;
}
