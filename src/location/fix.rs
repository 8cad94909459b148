use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LocationError;

/// A single geolocation sample as reported by the sensor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PositionFix {
    pub timestamp: DateTime<Utc>,
    /// Degrees, WGS84.
    pub latitude: f64,
    /// Degrees, WGS84.
    pub longitude: f64,
    pub accuracy_meters: f64,
}

impl PositionFix {
    pub fn new(timestamp: DateTime<Utc>, latitude: f64, longitude: f64, accuracy_meters: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            accuracy_meters,
        }
    }

    /// Fix stamped with the current wall clock.
    pub fn now(latitude: f64, longitude: f64, accuracy_meters: f64) -> Self {
        Self::new(Utc::now(), latitude, longitude, accuracy_meters)
    }

    /// Rejects fixes the distance estimator cannot handle.
    pub fn validate(&self) -> Result<(), LocationError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(LocationError::MalformedFix(format!(
                "latitude {} out of range",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(LocationError::MalformedFix(format!(
                "longitude {} out of range",
                self.longitude
            )));
        }
        if !self.accuracy_meters.is_finite() || self.accuracy_meters < 0.0 {
            return Err(LocationError::MalformedFix(format!(
                "accuracy {} is not a valid radius",
                self.accuracy_meters
            )));
        }
        if self.timestamp.timestamp_millis() < 0 {
            return Err(LocationError::MalformedFix(format!(
                "timestamp {} precedes the epoch",
                self.timestamp
            )));
        }
        Ok(())
    }
}
