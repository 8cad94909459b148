use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::location::{distance_between, PositionFix};

use super::ActivitySummary;

/// Fewest fixes a session needs before it is worth keeping.
pub const MIN_FIXES: usize = 2;
/// Distance a session must exceed before it is worth keeping.
pub const MIN_DISTANCE_METERS: f64 = 10.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RecordingState {
    Idle,
    Recording,
    Paused,
    Completed,
}

impl Default for RecordingState {
    fn default() -> Self {
        RecordingState::Idle
    }
}

impl RecordingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingState::Idle => "idle",
            RecordingState::Recording => "recording",
            RecordingState::Paused => "paused",
            RecordingState::Completed => "completed",
        }
    }

    /// Recording or paused: a session is underway and holds sensor resources.
    pub fn is_active(&self) -> bool {
        matches!(self, RecordingState::Recording | RecordingState::Paused)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ActivityType {
    Run,
    Ride,
    Walk,
    Hike,
}

impl Default for ActivityType {
    fn default() -> Self {
        ActivityType::Run
    }
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Run => "Run",
            ActivityType::Ride => "Ride",
            ActivityType::Walk => "Walk",
            ActivityType::Hike => "Hike",
        }
    }
}

/// Everything known about the recording in progress.
///
/// Only the session controller mutates this; everyone else sees clones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionModel {
    pub state: RecordingState,
    pub activity_type: ActivityType,
    pub session_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
    /// Accepted fixes in arrival order.
    pub positions: Vec<PositionFix>,
    pub last_position: Option<PositionFix>,
    pub total_distance_meters: f64,
}

impl Default for SessionModel {
    fn default() -> Self {
        Self::fresh(ActivityType::default())
    }
}

impl SessionModel {
    /// Idle model with zeroed metrics.
    pub fn fresh(activity_type: ActivityType) -> Self {
        Self {
            state: RecordingState::Idle,
            activity_type,
            session_id: None,
            start_time: None,
            elapsed_seconds: 0,
            positions: Vec::new(),
            last_position: None,
            total_distance_meters: 0.0,
        }
    }

    /// Replaces this model with a new recording, carrying over the activity
    /// type in the same step.
    pub fn begin(&mut self, session_id: String, started_at: DateTime<Utc>) {
        *self = Self {
            state: RecordingState::Recording,
            session_id: Some(session_id),
            start_time: Some(started_at),
            ..Self::fresh(self.activity_type)
        };
    }

    pub fn pause(&mut self) -> bool {
        self.transition(RecordingState::Recording, RecordingState::Paused)
    }

    pub fn resume(&mut self) -> bool {
        self.transition(RecordingState::Paused, RecordingState::Recording)
    }

    pub fn complete(&mut self) -> bool {
        if !self.state.is_active() {
            return false;
        }
        self.state = RecordingState::Completed;
        true
    }

    /// Completed back to paused; metrics are kept.
    pub fn reopen(&mut self) -> bool {
        self.transition(RecordingState::Completed, RecordingState::Paused)
    }

    pub fn reset(&mut self) {
        *self = Self::fresh(self.activity_type);
    }

    pub fn set_activity_type(&mut self, activity_type: ActivityType) -> bool {
        if self.state != RecordingState::Idle {
            return false;
        }
        self.activity_type = activity_type;
        true
    }

    /// Advances the clock by one second while recording.
    pub fn record_tick(&mut self) -> bool {
        if self.state != RecordingState::Recording {
            return false;
        }
        self.elapsed_seconds = self.elapsed_seconds.saturating_add(1);
        true
    }

    /// Appends `fix` while recording. Fixes offered in any other state are
    /// dropped.
    pub fn record_fix(&mut self, fix: PositionFix) -> bool {
        if self.state != RecordingState::Recording {
            return false;
        }
        if let Some(previous) = &self.last_position {
            self.total_distance_meters += distance_between(previous, &fix);
        }
        self.positions.push(fix);
        self.last_position = Some(fix);
        true
    }

    pub fn meets_threshold(&self, min_fixes: usize, min_distance_meters: f64) -> bool {
        self.positions.len() >= min_fixes && self.total_distance_meters > min_distance_meters
    }

    /// At least [`MIN_FIXES`] fixes covering more than [`MIN_DISTANCE_METERS`].
    pub fn has_minimum_data(&self) -> bool {
        self.meets_threshold(MIN_FIXES, MIN_DISTANCE_METERS)
    }

    pub fn summary(&self) -> Option<ActivitySummary> {
        if self.state != RecordingState::Completed {
            return None;
        }
        Some(ActivitySummary {
            session_id: self.session_id.clone(),
            activity_type: self.activity_type,
            start_time: self.start_time,
            elapsed_seconds: self.elapsed_seconds,
            total_distance_meters: self.total_distance_meters,
            positions: self.positions.clone(),
        })
    }

    fn transition(&mut self, from: RecordingState, to: RecordingState) -> bool {
        if self.state != from {
            return false;
        }
        self.state = to;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::path_distance;

    fn recording(activity_type: ActivityType) -> SessionModel {
        let mut model = SessionModel::fresh(activity_type);
        model.begin("s-1".into(), Utc::now());
        model
    }

    fn fix(lat: f64, lon: f64) -> PositionFix {
        PositionFix::now(lat, lon, 4.0)
    }

    #[test]
    fn begin_keeps_activity_type_and_zeroes_metrics() {
        let mut model = SessionModel::fresh(ActivityType::Ride);
        model.elapsed_seconds = 42;
        model.begin("abc".into(), Utc::now());

        assert_eq!(model.state, RecordingState::Recording);
        assert_eq!(model.activity_type, ActivityType::Ride);
        assert_eq!(model.elapsed_seconds, 0);
        assert_eq!(model.session_id.as_deref(), Some("abc"));
        assert!(model.start_time.is_some());
    }

    #[test]
    fn ticks_only_count_while_recording() {
        let mut model = recording(ActivityType::Run);
        assert!(model.record_tick());
        assert!(model.pause());
        assert!(!model.record_tick());
        assert!(model.resume());
        assert!(model.record_tick());
        assert_eq!(model.elapsed_seconds, 2);
    }

    #[test]
    fn distance_is_sum_of_consecutive_fixes() {
        let mut model = recording(ActivityType::Run);
        let track = [fix(0.0, 0.0), fix(0.0, 0.0001), fix(0.0001, 0.0001), fix(0.0001, 0.0003)];
        let mut previous_total = 0.0;
        for point in track {
            assert!(model.record_fix(point));
            assert!(model.total_distance_meters >= previous_total);
            previous_total = model.total_distance_meters;
        }

        assert!((model.total_distance_meters - path_distance(&track)).abs() < 1e-9);
        assert_eq!(model.last_position, model.positions.last().copied());
    }

    #[test]
    fn fixes_outside_recording_are_dropped() {
        let mut model = SessionModel::fresh(ActivityType::Run);
        assert!(!model.record_fix(fix(0.0, 0.0)));

        let mut model = recording(ActivityType::Run);
        model.record_fix(fix(0.0, 0.0));
        model.pause();
        assert!(!model.record_fix(fix(0.0, 0.01)));
        assert_eq!(model.positions.len(), 1);
        assert_eq!(model.total_distance_meters, 0.0);
    }

    #[test]
    fn minimum_data_needs_two_fixes_and_ten_meters() {
        let mut model = recording(ActivityType::Run);
        model.record_fix(fix(0.0, 0.0));
        assert!(!model.has_minimum_data());
        model.record_fix(fix(0.0, 0.0001));
        assert!(model.has_minimum_data());

        let mut short = recording(ActivityType::Run);
        short.record_fix(fix(0.0, 0.0));
        short.record_fix(fix(0.0, 0.00005));
        assert!(!short.has_minimum_data());
    }

    #[test]
    fn activity_type_is_idle_only() {
        let mut model = SessionModel::fresh(ActivityType::Run);
        assert!(model.set_activity_type(ActivityType::Hike));
        model.begin("s".into(), Utc::now());
        assert!(!model.set_activity_type(ActivityType::Ride));
        assert_eq!(model.activity_type, ActivityType::Hike);
    }

    #[test]
    fn complete_and_reopen() {
        let mut model = SessionModel::fresh(ActivityType::Walk);
        assert!(!model.complete());

        model.begin("s".into(), Utc::now());
        model.record_tick();
        assert!(model.complete());
        assert!(!model.complete());
        assert!(model.summary().is_some());

        assert!(model.reopen());
        assert_eq!(model.state, RecordingState::Paused);
        assert_eq!(model.elapsed_seconds, 1);
        assert!(model.summary().is_none());
    }

    #[test]
    fn reset_preserves_activity_type() {
        let mut model = recording(ActivityType::Hike);
        model.record_fix(fix(1.0, 1.0));
        model.reset();
        assert_eq!(model, SessionModel::fresh(ActivityType::Hike));
    }

    #[test]
    fn state_serializes_camel_case() {
        let json = serde_json::to_value(SessionModel::default()).unwrap();
        assert_eq!(json["state"], "idle");
        assert_eq!(json["activityType"], "run");
        assert_eq!(json["totalDistanceMeters"], 0.0);
    }
}
