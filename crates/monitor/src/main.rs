//! Presence Indicator - Main Entry Point

use anyhow::Context;
use event_source::MqttSource;
use indicator::{LogSink, OutputSink, PwmSink};
use monitor::self_test::LAMP_TEST_STEP;
use monitor::{
    init_logging, install_metrics_exporter, run_lamp_test, AlertPipeline, Monitor, OutputKind,
    Settings,
};
use std::path::PathBuf;
use tracing::{info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("PRESENCE_CONFIG"))
        .map(PathBuf::from);

    let settings = Settings::load(config_path.as_deref()).context("loading settings")?;
    init_logging(&settings.telemetry)?;

    info!("=== Presence Indicator v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Alert clears {}ms after the last detection",
        settings.alert.decay_window_ms
    );

    if let Some(addr) = settings.telemetry.metrics_addr {
        install_metrics_exporter(addr)?;
    }

    let sink: Box<dyn OutputSink> = match settings.indicator.output {
        OutputKind::Log => Box::new(LogSink::new()),
        OutputKind::Pwm => {
            Box::new(PwmSink::open(&settings.indicator.pwm).context("opening PWM LED")?)
        }
    };

    let mut pipeline = AlertPipeline::new(
        &settings.alert,
        settings.payload.max_payload_bytes,
        settings.indicator.palette,
        sink,
    )?;

    if settings.self_test {
        run_lamp_test(pipeline.sink_mut(), LAMP_TEST_STEP).await;
    }
    // Disconnected color until the broker session is up
    pipeline.render();

    let source = MqttSource::new(&settings.mqtt, settings.payload.max_payload_bytes)
        .context("creating MQTT source")?;
    let mut monitor = Monitor::new(source, pipeline, settings.alert.poll_interval());

    monitor
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    monitor.pipeline_mut().set_connected(false);
    monitor.pipeline_mut().render();
    info!("Shutdown complete");

    Ok(())
}
