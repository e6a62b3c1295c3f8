//! Control loop
//!
//! One iteration:
//! 1. wait up to `poll_interval` for a payload from the event source
//! 2. run it through the pipeline if one arrived
//! 3. run the decay check and re-render, whether or not anything arrived
//!
//! Everything happens on the calling task, so the alert state needs no
//! locking.

use crate::pipeline::{AlertPipeline, EventOutcome};
use alerting::Transition;
use detection_payload::DecodeError;
use event_source::{EventSource, SourceEvent};
use indicator::OutputSink;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// What happened during one loop iteration
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Present when a payload arrived
    pub event: Option<Result<EventOutcome, DecodeError>>,
    /// Outcome of the decay check
    pub decay: Transition,
}

/// Presence monitor driving one indicator from one event source
pub struct Monitor<S, O> {
    source: S,
    pipeline: AlertPipeline<O>,
    poll_interval: Duration,
}

impl<S: EventSource, O: OutputSink> Monitor<S, O> {
    pub fn new(source: S, pipeline: AlertPipeline<O>, poll_interval: Duration) -> Self {
        Self {
            source,
            pipeline,
            poll_interval,
        }
    }

    /// Run a single loop iteration
    pub async fn step(&mut self) -> StepReport {
        let polled = self.source.poll(self.poll_interval).await;
        self.pipeline.set_connected(self.source.is_connected());

        let event = match polled {
            SourceEvent::Payload(bytes) => Some(
                self.pipeline
                    .handle_payload(&bytes, Instant::now().into_std()),
            ),
            SourceEvent::Idle => None,
        };

        let decay = self.pipeline.tick(Instant::now().into_std());
        StepReport { event, decay }
    }

    /// Loop until `shutdown` completes
    pub async fn run_until<F: Future<Output = ()>>(&mut self, shutdown: F) {
        info!(
            "Monitor running, poll interval {}ms",
            self.poll_interval.as_millis()
        );
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = self.step() => {}
            }
        }

        info!("Monitor stopped");
    }

    pub fn pipeline(&self) -> &AlertPipeline<O> {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut AlertPipeline<O> {
        &mut self.pipeline
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::{AlertConfig, AlertPhase, AlertState, ClearReason};
    use event_source::ScriptedSource;
    use indicator::{ColorCommand, Palette, RecordingSink};

    const PERSON: &str = r#"{"detection_count":1,"detections":[{"track_id":1,"confidence":0.9}]}"#;
    const NOBODY: &str = r#"{"detection_count":0,"detections":[]}"#;

    fn monitor() -> Monitor<ScriptedSource, RecordingSink> {
        let config = AlertConfig::default();
        let pipeline =
            AlertPipeline::new(&config, 4096, Palette::default(), RecordingSink::new()).unwrap();
        Monitor::new(ScriptedSource::new(), pipeline, config.poll_interval())
    }

    fn last_color(monitor: &Monitor<ScriptedSource, RecordingSink>) -> Option<ColorCommand> {
        monitor.pipeline().sink().last()
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_then_clear() {
        let mut monitor = monitor();
        monitor.source_mut().push_payload(PERSON);
        monitor.source_mut().push_payload(NOBODY);

        let report = monitor.step().await;
        let outcome = report.event.unwrap().unwrap();
        assert_eq!(outcome.transition, Transition::Raised);
        assert_eq!(outcome.evaluation.max_confidence, 0.9);
        assert_eq!(last_color(&monitor), Some(ColorCommand::RED));

        let report = monitor.step().await;
        assert_eq!(
            report.event.unwrap().unwrap().transition,
            Transition::Cleared(ClearReason::NegativeEvent)
        );
        assert_eq!(monitor.pipeline().state(), AlertState::Clear);
        assert_eq!(last_color(&monitor), Some(ColorCommand::GREEN));
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_decays_when_events_stop() {
        let mut monitor = monitor();
        monitor.source_mut().push_payload(PERSON);

        let started = Instant::now();
        monitor.step().await;
        assert!(monitor.pipeline().state().is_alerting());

        let mut steps = 0;
        loop {
            let report = monitor.step().await;
            steps += 1;
            if report.decay == Transition::Cleared(ClearReason::Decayed) {
                break;
            }
            assert_eq!(last_color(&monitor), Some(ColorCommand::RED));
            assert!(steps < 200, "alert never decayed");
        }

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(5000));
        assert!(elapsed < Duration::from_millis(5100));
        assert_eq!(last_color(&monitor), Some(ColorCommand::GREEN));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sustained_presence_stays_alerting() {
        let mut monitor = monitor();

        for _ in 0..4 {
            monitor.source_mut().push_payload(PERSON);
            // 60 idle polls of 50ms = 3s between events
            for _ in 0..60 {
                monitor.source_mut().push_idle();
            }
        }

        while monitor.source().pending() > 0 {
            let report = monitor.step().await;
            assert_eq!(report.decay, Transition::Unchanged);
            assert_eq!(monitor.pipeline().state().phase(), AlertPhase::Alerting);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_event_keeps_state() {
        let mut monitor = monitor();
        monitor.source_mut().push_payload(PERSON);
        monitor.source_mut().push_payload("{not json");

        monitor.step().await;
        let before = monitor.pipeline().state();

        let report = monitor.step().await;
        assert!(matches!(report.event, Some(Err(DecodeError::Malformed(_)))));
        assert_eq!(report.decay, Transition::Unchanged);
        assert_eq!(monitor.pipeline().state(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_overrides_alert() {
        let mut monitor = monitor();
        monitor.source_mut().push_payload(PERSON);
        monitor.step().await;
        assert_eq!(last_color(&monitor), Some(ColorCommand::RED));

        monitor.source_mut().set_connected(false);
        monitor.step().await;
        assert_eq!(last_color(&monitor), Some(ColorCommand::OFF));
        assert!(monitor.pipeline().state().is_alerting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_decay_continues_while_disconnected() {
        let mut monitor = monitor();
        monitor.source_mut().push_payload(PERSON);
        monitor.step().await;
        monitor.source_mut().set_connected(false);

        // 101 idle steps of 50ms covers the 5s window
        for _ in 0..101 {
            monitor.step().await;
        }
        assert_eq!(monitor.pipeline().state(), AlertState::Clear);
        assert_eq!(last_color(&monitor), Some(ColorCommand::OFF));

        monitor.source_mut().set_connected(true);
        monitor.step().await;
        assert_eq!(last_color(&monitor), Some(ColorCommand::GREEN));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_shutdown() {
        let mut monitor = monitor();
        monitor.source_mut().push_payload(PERSON);

        monitor
            .run_until(tokio::time::sleep(Duration::from_millis(500)))
            .await;

        assert!(monitor.source().polls() >= 10);
        assert!(monitor.pipeline().state().is_alerting());
    }
}
