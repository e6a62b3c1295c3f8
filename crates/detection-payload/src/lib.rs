//! Detection Payload Handling
//!
//! Decodes detection events published by the upstream person detector and
//! reduces them to a single presence signal.

mod batch;
mod decoder;
mod error;
mod evaluator;

pub use batch::{Detection, DetectionBatch};
pub use decoder::{decode, PayloadDecoder, DEFAULT_MAX_PAYLOAD_BYTES, MIN_MAX_PAYLOAD_BYTES};
pub use error::DecodeError;
pub use evaluator::{evaluate, EvaluationResult};
