pub mod controller;
pub mod state;
pub mod summary;

pub use controller::{ListenerId, SessionController};
pub use state::{ActivityType, RecordingState, SessionModel, MIN_DISTANCE_METERS, MIN_FIXES};
pub use summary::ActivitySummary;
