pub mod channel;
pub mod distance;
pub mod fix;
pub mod simulated;
pub mod source;
pub mod tracker;

pub use channel::ChannelPositionSource;
pub use distance::{distance_between, path_distance};
pub use fix::PositionFix;
pub use simulated::SimulatedPositionSource;
pub use source::{PositionEvent, PositionSink, PositionSource, PositionStream, SubscriptionHandle};
pub use tracker::LocationTracker;
