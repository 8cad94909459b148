use std::future::Future;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;

use crate::error::LocationError;

use super::{distance::EARTH_RADIUS_METERS, PositionFix, PositionSource, PositionStream};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = false;

use crate::{log_debug, log_info};

/// Random-walk source used by the demo binary.
#[derive(Debug, Clone)]
pub struct SimulatedPositionSource {
    pub origin: (f64, f64),
    /// Mean distance covered between fixes.
    pub step_meters: f64,
    pub interval: Duration,
    pub accuracy_meters: f64,
    /// Emit a stream error instead of every n-th fix.
    pub error_every: Option<u32>,
    pub deny_authorization: bool,
}

impl Default for SimulatedPositionSource {
    fn default() -> Self {
        Self {
            origin: (47.3769, 8.5417),
            step_meters: 3.0,
            interval: Duration::from_secs(1),
            accuracy_meters: 5.0,
            error_every: None,
            deny_authorization: false,
        }
    }
}

impl PositionSource for SimulatedPositionSource {
    fn authorize(&self) -> impl Future<Output = Result<(), LocationError>> + Send {
        let denied = self.deny_authorization;
        async move {
            if denied {
                Err(LocationError::AuthorizationDenied)
            } else {
                Ok(())
            }
        }
    }

    fn subscribe(&self) -> Result<PositionStream, LocationError> {
        let runtime = Handle::try_current()
            .map_err(|err| LocationError::Unavailable(format!("no runtime for simulator: {err}")))?;

        let (sink, stream) = PositionStream::channel();
        let config = self.clone();

        runtime.spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut ticker = tokio::time::interval(config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let (mut lat, mut lon) = config.origin;
            let mut heading: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
            let mut emitted: u32 = 0;

            loop {
                tokio::select! {
                    biased;
                    _ = sink.closed() => {
                        log_info!("simulated source unsubscribed after {emitted} events");
                        break;
                    }
                    _ = ticker.tick() => {}
                }
                emitted = emitted.wrapping_add(1);

                let event = match config.error_every {
                    Some(n) if n > 0 && emitted % n == 0 => {
                        Err(LocationError::Stream("simulated signal loss".into()))
                    }
                    _ => {
                        heading += rng.gen_range(-0.4..0.4);
                        let step = config.step_meters * rng.gen_range(0.5..1.5);
                        (lat, lon) = advance(lat, lon, heading, step);
                        let accuracy = config.accuracy_meters * rng.gen_range(0.8..1.2);
                        Ok(PositionFix::now(lat, lon, accuracy))
                    }
                };

                log_debug!("simulated event #{emitted}: {event:?}");
                if sink.send(event).is_err() {
                    log_info!("simulated source unsubscribed after {emitted} events");
                    break;
                }
            }
        });

        Ok(stream)
    }
}

/// Moves `meters` along `heading` (radians from north) on a flat local patch.
fn advance(lat: f64, lon: f64, heading: f64, meters: f64) -> (f64, f64) {
    let d_lat = (meters * heading.cos()) / EARTH_RADIUS_METERS;
    let d_lon = (meters * heading.sin()) / (EARTH_RADIUS_METERS * lat.to_radians().cos());
    (
        (lat + d_lat.to_degrees()).clamp(-90.0, 90.0),
        wrap_longitude(lon + d_lon.to_degrees()),
    )
}

fn wrap_longitude(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else if lon < -180.0 {
        lon + 360.0
    } else {
        lon
    }
}
