//! Decode Error Types

use thiserror::Error;

/// Errors while decoding a detection event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Payload is not a JSON object of the expected shape
    #[error("Malformed detection payload: {0}")]
    Malformed(String),

    /// Payload exceeded the accepted size
    #[error("Payload of {len} bytes exceeds the {limit} byte limit")]
    Truncated { len: usize, limit: usize },
}

impl DecodeError {
    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::Malformed(_) => "malformed",
            DecodeError::Truncated { .. } => "truncated",
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Malformed(err.to_string())
    }
}
