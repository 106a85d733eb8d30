//! Broadcasting of pipeline status events to live subscribers.

pub mod status;

pub use status::{EntityKind, StatusBroadcaster, StatusEvent};
