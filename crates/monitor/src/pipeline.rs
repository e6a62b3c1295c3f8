//! Decode -> evaluate -> transition -> render pipeline

use crate::telemetry::{
    ALERTING, ALERTS_CLEARED_TOTAL, ALERTS_RAISED_TOTAL, CONNECTED, DECODE_ERRORS_TOTAL,
    EVENTS_TOTAL, SINK_ERRORS_TOTAL,
};
use alerting::{AlertConfig, AlertState, AlertStateMachine, ConfigError, Transition};
use detection_payload::{evaluate, DecodeError, EvaluationResult, PayloadDecoder};
use indicator::{ColorCommand, IndicatorMapper, OutputSink, Palette};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Bytes of raw payload echoed in debug logs
const PAYLOAD_PREVIEW_BYTES: usize = 100;

/// Result of handling one decoded event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventOutcome {
    pub evaluation: EvaluationResult,
    pub transition: Transition,
    pub color: ColorCommand,
}

/// Sole owner of the alert state. Both the event path and the periodic
/// decay path go through `&mut self`, so nothing else can touch the timer.
pub struct AlertPipeline<O> {
    decoder: PayloadDecoder,
    threshold: f64,
    machine: AlertStateMachine,
    mapper: IndicatorMapper,
    sink: O,
    connected: bool,
}

impl<O: OutputSink> AlertPipeline<O> {
    /// Create a pipeline in the clear, disconnected state
    pub fn new(
        config: &AlertConfig,
        max_payload_bytes: usize,
        palette: Palette,
        sink: O,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            "Alert pipeline: threshold {}, decay {}ms, policy {:?}",
            config.confidence_threshold, config.decay_window_ms, config.clear_policy
        );

        Ok(Self {
            decoder: PayloadDecoder::new(max_payload_bytes),
            threshold: config.confidence_threshold,
            machine: AlertStateMachine::new(config),
            mapper: IndicatorMapper::new(palette),
            sink,
            connected: false,
        })
    }

    /// Handle one inbound payload.
    ///
    /// Undecodable payloads are dropped and leave the alert state and its
    /// timer untouched.
    pub fn handle_payload(
        &mut self,
        bytes: &[u8],
        now: Instant,
    ) -> Result<EventOutcome, DecodeError> {
        metrics::counter!(EVENTS_TOTAL).increment(1);
        debug!(
            "Raw payload ({} bytes): {}{}",
            bytes.len(),
            String::from_utf8_lossy(&bytes[..bytes.len().min(PAYLOAD_PREVIEW_BYTES)]),
            if bytes.len() > PAYLOAD_PREVIEW_BYTES { "..." } else { "" }
        );

        let batch = match self.decoder.decode(bytes) {
            Ok(batch) => batch,
            Err(e) => {
                warn!("Dropping detection event: {}", e);
                metrics::counter!(DECODE_ERRORS_TOTAL, "kind" => e.kind()).increment(1);
                return Err(e);
            }
        };

        if batch.count_mismatch() {
            debug!(
                "detection_count {} disagrees with {} detections",
                batch.count,
                batch.len()
            );
        }
        for (i, detection) in batch.detections.iter().enumerate() {
            debug!(
                "  Detection #{}: ID={}, Confidence={}",
                i + 1,
                detection.track_id,
                detection.confidence
            );
        }

        let evaluation = evaluate(&batch, self.threshold);
        let transition = self.machine.on_event(evaluation.qualifies, now);
        record_transition(transition);
        let color = self.render();

        debug!(
            "Event: {} qualifying, max confidence {:.2}, {:?}",
            evaluation.qualifying, evaluation.max_confidence, transition
        );

        Ok(EventOutcome {
            evaluation,
            transition,
            color,
        })
    }

    /// Periodic decay check. Always re-renders, even without a change.
    pub fn tick(&mut self, now: Instant) -> Transition {
        let transition = self.machine.check_decay(now);
        record_transition(transition);
        self.render();
        transition
    }

    /// Record broker connectivity for the next render
    pub fn set_connected(&mut self, connected: bool) {
        if connected == self.connected {
            return;
        }
        if connected {
            info!("Event source connected");
        } else {
            warn!("Event source disconnected, indicator blanked");
        }
        self.connected = connected;
        metrics::gauge!(CONNECTED).set(if connected { 1.0 } else { 0.0 });
    }

    /// Render the current state to the sink
    pub fn render(&mut self) -> ColorCommand {
        let color = self.mapper.render(self.machine.phase(), self.connected);
        if let Err(e) = self.sink.apply(color) {
            warn!("Indicator update failed: {}", e);
            metrics::counter!(SINK_ERRORS_TOTAL).increment(1);
        }
        color
    }

    pub fn state(&self) -> AlertState {
        self.machine.state()
    }

    pub fn sink(&self) -> &O {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut O {
        &mut self.sink
    }
}

fn record_transition(transition: Transition) {
    match transition {
        Transition::Raised => {
            metrics::counter!(ALERTS_RAISED_TOTAL).increment(1);
            metrics::gauge!(ALERTING).set(1.0);
        }
        Transition::Cleared(reason) => {
            metrics::counter!(ALERTS_CLEARED_TOTAL, "reason" => reason.as_str()).increment(1);
            metrics::gauge!(ALERTING).set(0.0);
        }
        Transition::Refreshed | Transition::Unchanged => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::{AlertPhase, ClearPolicy, ClearReason};
    use indicator::{IndicatorError, RecordingSink};
    use std::time::Duration;

    const PERSON: &[u8] =
        br#"{"detection_count":1,"detections":[{"track_id":1,"confidence":0.9}]}"#;
    const NOBODY: &[u8] = br#"{"detection_count":0,"detections":[]}"#;

    fn pipeline(policy: ClearPolicy) -> AlertPipeline<RecordingSink> {
        let config = AlertConfig {
            clear_policy: policy,
            ..Default::default()
        };
        let mut pipeline =
            AlertPipeline::new(&config, 4096, Palette::default(), RecordingSink::new()).unwrap();
        pipeline.set_connected(true);
        pipeline
    }

    #[test]
    fn test_person_then_nobody() {
        let mut pipeline = pipeline(ClearPolicy::Immediate);
        let t = Instant::now();

        let outcome = pipeline.handle_payload(PERSON, t).unwrap();
        assert_eq!(outcome.transition, Transition::Raised);
        assert_eq!(outcome.evaluation.max_confidence, 0.9);
        assert_eq!(outcome.color, ColorCommand::RED);
        assert_eq!(pipeline.state().phase(), AlertPhase::Alerting);

        let outcome = pipeline
            .handle_payload(NOBODY, t + Duration::from_millis(100))
            .unwrap();
        assert_eq!(outcome.transition, Transition::Cleared(ClearReason::NegativeEvent));
        assert_eq!(outcome.color, ColorCommand::GREEN);
        assert_eq!(pipeline.state(), AlertState::Clear);
    }

    #[test]
    fn test_decay_only_policy_holds_alert() {
        let mut pipeline = pipeline(ClearPolicy::DecayOnly);
        let t = Instant::now();

        pipeline.handle_payload(PERSON, t).unwrap();
        let outcome = pipeline
            .handle_payload(NOBODY, t + Duration::from_millis(100))
            .unwrap();
        assert_eq!(outcome.transition, Transition::Unchanged);
        assert_eq!(outcome.color, ColorCommand::RED);

        assert_eq!(
            pipeline.tick(t + Duration::from_millis(5000)),
            Transition::Cleared(ClearReason::Decayed)
        );
        assert_eq!(pipeline.sink().last(), Some(ColorCommand::GREEN));
    }

    #[test]
    fn test_malformed_payload_leaves_state() {
        let mut pipeline = pipeline(ClearPolicy::Immediate);
        let t = Instant::now();
        pipeline.handle_payload(PERSON, t).unwrap();
        let before = pipeline.state();
        let renders = pipeline.sink().commands().len();

        let err = pipeline
            .handle_payload(b"{not json", t + Duration::from_millis(4000))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
        assert_eq!(pipeline.state(), before);
        assert_eq!(pipeline.sink().commands().len(), renders);

        // Timer was not refreshed by the bad event
        assert!(pipeline.tick(t + Duration::from_millis(5000)).changed_phase());
    }

    #[test]
    fn test_truncated_payload_dropped() {
        let mut pipeline = pipeline(ClearPolicy::Immediate);
        let oversized = vec![b' '; 5000];

        let err = pipeline.handle_payload(&oversized, Instant::now()).unwrap_err();
        assert_eq!(err, DecodeError::Truncated { len: 5000, limit: 4096 });
        assert_eq!(pipeline.state(), AlertState::Clear);
    }

    #[test]
    fn test_low_confidence_does_not_alert() {
        let mut pipeline = pipeline(ClearPolicy::Immediate);
        let outcome = pipeline
            .handle_payload(
                br#"{"detection_count":2,"detections":[{"track_id":1,"confidence":0.7},{"track_id":2,"confidence":0.3}]}"#,
                Instant::now(),
            )
            .unwrap();

        assert!(!outcome.evaluation.qualifies);
        assert_eq!(outcome.transition, Transition::Unchanged);
        assert_eq!(outcome.color, ColorCommand::GREEN);
    }

    #[test]
    fn test_disconnect_blanks_indicator() {
        let mut pipeline = pipeline(ClearPolicy::Immediate);
        let t = Instant::now();
        pipeline.handle_payload(PERSON, t).unwrap();

        pipeline.set_connected(false);
        pipeline.tick(t + Duration::from_millis(50));
        assert_eq!(pipeline.sink().last(), Some(ColorCommand::OFF));
        assert!(pipeline.state().is_alerting());

        pipeline.set_connected(true);
        pipeline.tick(t + Duration::from_millis(100));
        assert_eq!(pipeline.sink().last(), Some(ColorCommand::RED));
    }

    #[test]
    fn test_tick_renders_every_time() {
        let mut pipeline = pipeline(ClearPolicy::Immediate);
        let t = Instant::now();
        for i in 0..3 {
            assert_eq!(pipeline.tick(t + Duration::from_millis(i * 50)), Transition::Unchanged);
        }
        assert_eq!(pipeline.sink().commands(), &[ColorCommand::GREEN; 3]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AlertConfig {
            poll_interval_ms: 1000,
            ..Default::default()
        };
        let result = AlertPipeline::new(&config, 4096, Palette::default(), RecordingSink::new());
        assert!(matches!(result, Err(ConfigError::PollTooSlow { .. })));
    }

    struct BrokenSink;

    impl OutputSink for BrokenSink {
        fn apply(&mut self, _command: ColorCommand) -> Result<(), IndicatorError> {
            Err(IndicatorError::ChannelUnavailable("pwm0".to_string()))
        }
    }

    #[test]
    fn test_sink_failure_not_fatal() {
        let mut pipeline =
            AlertPipeline::new(&AlertConfig::default(), 4096, Palette::default(), BrokenSink)
                .unwrap();
        pipeline.set_connected(true);

        let outcome = pipeline.handle_payload(PERSON, Instant::now()).unwrap();
        assert_eq!(outcome.transition, Transition::Raised);
        assert_eq!(outcome.color, ColorCommand::RED);
    }
}
