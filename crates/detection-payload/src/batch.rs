//! Decoded detection records

use serde::Serialize;

/// One tracked object reported in a detection event
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    /// Tracker id, only unique within a single event
    pub track_id: i64,
    /// Detector confidence, nominally in [0.0, 1.0] but not range checked
    pub confidence: f64,
}

impl Detection {
    pub fn new(track_id: i64, confidence: f64) -> Self {
        Self { track_id, confidence }
    }
}

/// Decoded contents of one detection event
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionBatch {
    /// Producer-declared `detection_count`. Informational only.
    #[serde(rename = "detection_count")]
    pub count: i64,
    /// Detections actually present in the event
    pub detections: Vec<Detection>,
}

impl DetectionBatch {
    /// Build a batch whose declared count matches its contents
    pub fn from_detections(detections: Vec<Detection>) -> Self {
        Self {
            count: detections.len() as i64,
            detections,
        }
    }

    /// Number of detections actually carried
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Whether the declared count disagrees with the actual detections
    pub fn count_mismatch(&self) -> bool {
        self.count != self.detections.len() as i64
    }
}
