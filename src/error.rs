use thiserror::Error;

use crate::session::RecordingState;

/// Failures reported by a [`PositionSource`](crate::location::PositionSource)
/// or detected while ingesting its events.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LocationError {
    #[error("location access was not authorized")]
    AuthorizationDenied,

    #[error("location updates unavailable: {0}")]
    Unavailable(String),

    #[error("position stream error: {0}")]
    Stream(String),

    #[error("malformed position fix: {0}")]
    MalformedFix(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("cannot start recording: {0}")]
    AuthorizationDenied(#[source] LocationError),

    #[error("cannot start recording while {}", .0.as_str())]
    NotIdle(RecordingState),
}
