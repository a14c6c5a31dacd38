//! Nucleo Telemetry Monitor
//!
//! Wires the serial port to a telemetry session and logs every frame the
//! board sends back.

use anyhow::Context;
use nucleo_session::{HandoffReceiver, SessionConfig, SessionSupervisor, TerminationSignal};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Log level used when `RUST_LOG` is unset or unparsable
const DEFAULT_LOG_FILTER: &str = "info";

/// Build the log filter from a `RUST_LOG`-style directive string
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Initialize logging, honouring `RUST_LOG`
pub fn init_logging() {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(directives.as_deref()))
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Log frames until the session closes the channel
///
/// Returns the number of frames received.
pub async fn log_frames(mut rx: HandoffReceiver) -> u64 {
    let mut received = 0u64;
    while let Ok(frame) = rx.recv().await {
        received += 1;
        info!(
            flex1 = frame.flex1,
            flex2 = frame.flex2,
            current = frame.current,
            voltage = frame.voltage,
            "Frame {}",
            received
        );
    }
    received
}

/// Stop the session on Ctrl-C
fn stop_on_ctrl_c(stop: TerminationSignal) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping after the current poll cycle");
                stop.set();
            }
            Err(err) => warn!("Unable to listen for Ctrl-C: {}", err),
        }
    });
}

/// Run a monitoring session on the configured serial port
pub async fn run_monitor(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = SessionConfig::load(config_path).context("loading session config")?;
    info!(
        "Monitoring {} at {} baud, polling every {:?}",
        config.serial.device,
        config.serial.baud_rate,
        config.poll.interval()
    );

    let (supervisor, rx) = SessionSupervisor::new(config);
    stop_on_ctrl_c(supervisor.termination_signal());

    let consumer = tokio::spawn(log_frames(rx));
    let report = supervisor.run_serial().await.context("telemetry session failed");

    // The session closes the channel on every exit path
    let received = consumer.await.context("frame logger task failed")?;
    let report = report?;

    info!(
        "Session finished: {:?}, {} frames logged, {} dropped",
        report.outcome, received, report.stats.dropped
    );
    Ok(())
}
