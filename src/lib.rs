pub mod error;
pub mod location;
pub mod session;
pub mod settings;
pub mod ticker;
mod utils;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use log::{error, info, warn};

pub use error::{LocationError, SessionError};
pub use location::{
    distance_between, ChannelPositionSource, PositionFix, PositionSource, PositionStream,
    SimulatedPositionSource,
};
pub use session::{ActivitySummary, ActivityType, RecordingState, SessionController, SessionModel};
pub use settings::RecorderSettings;

const DEMO_SECS_ENV: &str = "RECORDER_DEMO_SECS";
const DEFAULT_DEMO_SECS: u64 = 10;

/// Installs the global logger. Reads `RUST_LOG`; falls back to `Info`, or
/// `Debug` when `debug` is set. Later calls are no-ops.
pub fn init_logging(debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

/// Entry point of the `activity-recorder` binary: records one simulated
/// session and prints its summary as JSON.
pub fn run() {
    let settings_path = settings::settings_path();
    let loaded = RecorderSettings::load(&settings_path);
    let settings = loaded
        .as_ref()
        .cloned()
        .unwrap_or_default()
        .with_env_overrides();

    init_logging(settings.debug);
    if let Err(err) = &loaded {
        warn!("Using default settings: {err:#}");
    }

    info!("Activity recorder starting up...");

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed to build tokio runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(simulate(settings)) {
        error!("Simulated session failed: {err:#}");
        std::process::exit(1);
    }
}

async fn simulate(settings: RecorderSettings) -> Result<()> {
    let demo_secs = std::env::var(DEMO_SECS_ENV)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(DEFAULT_DEMO_SECS)
        .max(2);

    let source = Arc::new(SimulatedPositionSource {
        error_every: Some(7),
        ..Default::default()
    });
    let controller = SessionController::new(source, settings);

    controller.on_change(|model| {
        log::debug!(
            "[{}] {}s, {:.1}m, {} fixes",
            model.state.as_str(),
            model.elapsed_seconds,
            model.total_distance_meters,
            model.positions.len()
        );
    });

    controller.set_activity_type(ActivityType::Run);
    controller.start().await.context("failed to start recording")?;

    let first_leg = demo_secs / 2;
    tokio::time::sleep(Duration::from_secs(first_leg)).await;
    controller.pause();
    tokio::time::sleep(Duration::from_secs(2)).await;
    controller.resume();
    tokio::time::sleep(Duration::from_secs(demo_secs - first_leg)).await;
    controller.finish();

    let summary = controller
        .get_summary()
        .context("session did not reach completed state")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !controller.has_minimum_data() {
        warn!("Session too short to keep");
    }
    if let Some(err) = controller.last_error() {
        info!("Last sensor error during session: {err}");
    }

    controller.reset_to_idle();
    Ok(())
}
