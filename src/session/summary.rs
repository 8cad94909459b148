use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::location::PositionFix;

use super::ActivityType;

/// Finished-session extract handed to persistence/upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    pub session_id: Option<String>,
    pub activity_type: ActivityType,
    pub start_time: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
    pub total_distance_meters: f64,
    pub positions: Vec<PositionFix>,
}
