//! JSON Payload Decoder
//!
//! Wire format:
//!
//! ```json
//! { "detection_count": 1, "detections": [ { "track_id": 1, "confidence": 0.9 } ] }
//! ```
//!
//! Every field is optional. Missing or `null` values fall back to zero or an
//! empty list so that partial events from the producer are still usable.

use crate::batch::{Detection, DetectionBatch};
use crate::error::DecodeError;
use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};
use tracing::trace;

/// Default upper bound on accepted payload size (bytes)
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4096;

/// Smallest limit the decoder accepts. Typical events with a handful of
/// detections run to about 1 KB.
pub const MIN_MAX_PAYLOAD_BYTES: usize = 2048;

#[derive(Debug, Deserialize)]
struct RawBatch {
    #[serde(default, deserialize_with = "lenient_int")]
    detection_count: Option<i64>,
    #[serde(default)]
    detections: Option<Vec<RawDetection>>,
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    #[serde(default, deserialize_with = "lenient_int")]
    track_id: Option<i64>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Integer field that also accepts integral floats such as `2.0`
fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(value) = number.as_i64() {
        return Ok(Some(value));
    }

    match number.as_f64() {
        Some(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => {
            Ok(Some(value as i64))
        }
        _ => Err(serde::de::Error::custom(format!(
            "expected an integer, found {}",
            number
        ))),
    }
}

impl From<RawBatch> for DetectionBatch {
    fn from(raw: RawBatch) -> Self {
        let detections = raw
            .detections
            .unwrap_or_default()
            .into_iter()
            .map(|d| Detection {
                track_id: d.track_id.unwrap_or_default(),
                confidence: d.confidence.unwrap_or_default(),
            })
            .collect();

        DetectionBatch {
            count: raw.detection_count.unwrap_or_default(),
            detections,
        }
    }
}

/// Size-bounded decoder for detection events
#[derive(Debug, Clone, Copy)]
pub struct PayloadDecoder {
    max_payload_bytes: usize,
}

impl PayloadDecoder {
    /// Create a decoder accepting payloads up to `max_payload_bytes`.
    ///
    /// Limits below [`MIN_MAX_PAYLOAD_BYTES`] are raised to it.
    pub fn new(max_payload_bytes: usize) -> Self {
        Self {
            max_payload_bytes: max_payload_bytes.max(MIN_MAX_PAYLOAD_BYTES),
        }
    }

    /// Configured size limit
    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    /// Decode one event payload
    pub fn decode(&self, bytes: &[u8]) -> Result<DetectionBatch, DecodeError> {
        if bytes.len() > self.max_payload_bytes {
            return Err(DecodeError::Truncated {
                len: bytes.len(),
                limit: self.max_payload_bytes,
            });
        }

        // C producers sometimes ship the terminating NUL
        let end = bytes
            .iter()
            .rposition(|&b| b != 0 && !b.is_ascii_whitespace())
            .map_or(0, |i| i + 1);
        let bytes = &bytes[..end];

        let value: Value = serde_json::from_slice(bytes)?;
        if !value.is_object() {
            return Err(DecodeError::Malformed(format!(
                "expected a JSON object, found {}",
                json_kind(&value)
            )));
        }

        let raw: RawBatch = serde_json::from_value(value)?;
        let batch = DetectionBatch::from(raw);
        trace!(
            "Decoded batch: declared {}, actual {}",
            batch.count,
            batch.detections.len()
        );
        Ok(batch)
    }
}

impl Default for PayloadDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_BYTES)
    }
}

/// Decode with the default size limit
pub fn decode(bytes: &[u8]) -> Result<DetectionBatch, DecodeError> {
    PayloadDecoder::default().decode(bytes)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_event() {
        let batch = decode(
            br#"{"detection_count":2,"detections":[{"track_id":1,"confidence":0.9},{"track_id":4,"confidence":0.35}]}"#,
        )
        .unwrap();

        assert_eq!(batch.count, 2);
        assert_eq!(
            batch.detections,
            vec![Detection::new(1, 0.9), Detection::new(4, 0.35)]
        );
    }

    #[test]
    fn test_missing_fields_default() {
        let batch = decode(b"{}").unwrap();
        assert_eq!(batch.count, 0);
        assert!(batch.detections.is_empty());

        let batch = decode(br#"{"detection_count":3}"#).unwrap();
        assert_eq!(batch.count, 3);
        assert!(batch.detections.is_empty());

        let batch = decode(br#"{"detections":[{"confidence":0.8}, {"track_id":2}]}"#).unwrap();
        assert_eq!(batch.count, 0);
        assert_eq!(
            batch.detections,
            vec![Detection::new(0, 0.8), Detection::new(2, 0.0)]
        );
    }

    #[test]
    fn test_null_fields_treated_as_missing() {
        let batch = decode(br#"{"detection_count":null,"detections":null}"#).unwrap();
        assert_eq!(batch, DetectionBatch::default());
    }

    #[test]
    fn test_out_of_range_confidence_kept() {
        let batch = decode(br#"{"detections":[{"track_id":1,"confidence":1.7}]}"#).unwrap();
        assert_eq!(batch.detections[0].confidence, 1.7);
    }

    #[test]
    fn test_malformed_payloads() {
        for payload in [
            &b"{not json"[..],
            b"",
            b"[]",
            b"42",
            br#"{"detections":"many"}"#,
            br#"{"detection_count":"two"}"#,
            br#"{"detections":[{"track_id":1,"confidence":"high"}]}"#,
        ] {
            let err = decode(payload).unwrap_err();
            assert!(
                matches!(err, DecodeError::Malformed(_)),
                "{:?} -> {:?}",
                String::from_utf8_lossy(payload),
                err
            );
        }
    }

    #[test]
    fn test_integral_floats_accepted() {
        let batch = decode(
            br#"{"detection_count":2.0,"detections":[{"track_id":1.0,"confidence":1},{"track_id":-3e0,"confidence":0.8}]}"#,
        )
        .unwrap();

        assert_eq!(batch.count, 2);
        assert_eq!(
            batch.detections,
            vec![Detection::new(1, 1.0), Detection::new(-3, 0.8)]
        );
    }

    #[test]
    fn test_fractional_ids_rejected() {
        for payload in [
            &br#"{"detection_count":1.5}"#[..],
            br#"{"detections":[{"track_id":2.25,"confidence":0.9}]}"#,
            br#"{"detection_count":1e300}"#,
        ] {
            assert!(matches!(decode(payload), Err(DecodeError::Malformed(_))));
        }
    }

    #[test]
    fn test_trailing_nul_accepted() {
        let batch = decode(b"{\"detection_count\":0,\"detections\":[]}\0").unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_oversized_payload_truncated() {
        let decoder = PayloadDecoder::new(MIN_MAX_PAYLOAD_BYTES);
        let payload = vec![b' '; MIN_MAX_PAYLOAD_BYTES + 1];

        assert_eq!(
            decoder.decode(&payload),
            Err(DecodeError::Truncated {
                len: MIN_MAX_PAYLOAD_BYTES + 1,
                limit: MIN_MAX_PAYLOAD_BYTES,
            })
        );
    }

    #[test]
    fn test_accepts_two_kilobyte_payload() {
        let detections: Vec<String> = (0..40)
            .map(|i| format!(r#"{{"track_id":{},"confidence":0.512345}}"#, i))
            .collect();
        let payload = format!(
            r#"{{"detection_count":40,"detections":[{}]}}"#,
            detections.join(",")
        );
        assert!(payload.len() > 1500 && payload.len() <= MIN_MAX_PAYLOAD_BYTES);

        let batch = PayloadDecoder::new(0).decode(payload.as_bytes()).unwrap();
        assert_eq!(batch.len(), 40);
    }

    #[test]
    fn test_limit_floor() {
        assert_eq!(PayloadDecoder::new(16).max_payload_bytes(), MIN_MAX_PAYLOAD_BYTES);
        assert_eq!(PayloadDecoder::new(8192).max_payload_bytes(), 8192);
    }
}
