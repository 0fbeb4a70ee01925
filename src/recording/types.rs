//! Recording types for the simulated ride.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// One recorded sample of the simulated ride.
///
/// Timestamps serialize as RFC 3339. Metrics from capabilities the trainer
/// does not provide are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Elevation in meters
    pub elevation: f64,
    /// Wall-clock time of the sample
    pub timestamp: DateTime<Utc>,
    /// Instantaneous power in watts
    pub power: Option<u16>,
    /// Cadence in RPM
    pub cadence: Option<u16>,
    /// Heart rate in BPM
    pub heart_rate: Option<u8>,
    /// Simulated speed in km/h
    pub speed_kmh: f64,
    /// Cumulative distance in meters
    pub distance_m: f64,
}

/// Ride state advanced by the simulator tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RideProgress {
    /// Workout clock, stops while paused
    pub elapsed: Duration,
    /// Distance covered in meters
    pub travelled_m: f64,
    /// Whether the ride is auto-paused
    pub paused: bool,
}

/// Summary statistics of a ride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideSummary {
    /// Ride name
    pub name: String,
    /// Time of the first track point
    pub started_at: Option<DateTime<Utc>>,
    /// Workout time ridden, pauses excluded
    pub moving_time: Duration,
    /// Total distance in meters
    pub distance_m: f64,
    /// Average power over samples that reported power
    pub avg_power: Option<u16>,
    /// Maximum power recorded
    pub max_power: Option<u16>,
    /// Average cadence over samples that reported cadence
    pub avg_cadence: Option<u16>,
    /// Average speed in km/h over the moving time
    pub avg_speed_kmh: f64,
    /// Number of recorded track points
    pub points: usize,
}

/// Errors related to ride recording.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecorderError {
    /// Point older than the last one in the track
    #[error("Track point at {attempted} is older than the last point at {last}")]
    OutOfOrder {
        last: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },

    /// Point with a non-finite coordinate or metric
    #[error("Track point has invalid {0}")]
    InvalidPoint(&'static str),
}
