//! Confidence Evaluation

use crate::batch::DetectionBatch;
use serde::Serialize;

/// Result of evaluating one batch against the confidence threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationResult {
    /// At least one detection strictly exceeded the threshold
    pub qualifies: bool,
    /// Highest confidence in the batch, 0.0 when empty
    pub max_confidence: f64,
    /// Number of detections above the threshold
    pub qualifying: usize,
}

/// Reduce a batch to a presence signal.
///
/// Only the detections actually present are inspected; the declared
/// `count` plays no part.
pub fn evaluate(batch: &DetectionBatch, threshold: f64) -> EvaluationResult {
    let qualifying = batch
        .detections
        .iter()
        .filter(|d| d.confidence > threshold)
        .count();

    let max_confidence = batch
        .detections
        .iter()
        .map(|d| d.confidence)
        .reduce(f64::max)
        .unwrap_or(0.0);

    EvaluationResult {
        qualifies: qualifying > 0,
        max_confidence,
        qualifying,
    }
}
