//! Recording module for the simulated ride track.

pub mod track;
pub mod types;

pub use track::Track;
pub use types::{RecorderError, RideProgress, RideSummary, TrackPoint};
