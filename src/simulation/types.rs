//! Ride simulation types.

use crate::recording::{RecorderError, RideSummary, Track, TrackPoint};
use crate::telemetry::hub::DEFAULT_STALL_TIMEOUT;
use crate::world::physics::SpeedModel;
use crate::world::route::SlopeMode;
use std::time::Duration;
use thiserror::Error;

/// When the ride loop takes a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingMode {
    /// React to every joined telemetry sample
    #[default]
    EventDriven,
    /// Wait for a fixed tick, then take the next joined sample
    FixedInterval(Duration),
}

/// Settings for one simulated ride.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Name used for the ride summary
    pub ride_name: String,
    /// Sampling cadence of the ride loop
    pub sampling: SamplingMode,
    /// Whether route gradient slows or speeds the rider
    pub slope_mode: SlopeMode,
    /// Consecutive zero-power samples before auto-pause, 0 disables it
    pub pause_after_zero_samples: u32,
    /// Silence after which a joined capability is dropped
    pub stall_timeout: Duration,
    /// Rider and environment constants
    pub speed_model: SpeedModel,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ride_name: "Ride".to_string(),
            sampling: SamplingMode::default(),
            slope_mode: SlopeMode::default(),
            pause_after_zero_samples: 5,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            speed_model: SpeedModel::default(),
        }
    }
}

/// Notifications for an external renderer or serializer.
#[derive(Debug, Clone, PartialEq)]
pub enum RideEvent {
    /// Trainer acknowledged a new target
    TargetPowerChanged { watts: u16 },
    /// A point was appended to the track
    PointRecorded(TrackPoint),
    /// Workout clock stopped after sustained zero power
    Paused { elapsed: Duration },
    /// Workout clock running again
    Resumed { elapsed: Duration },
    /// Ride over
    Finished(RideSummary),
}

/// Why the ride loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown was requested
    Cancelled,
    /// No requested capability delivers samples anymore
    TelemetryEnded,
    /// The workout clock reached the workout's duration
    WorkoutComplete,
}

/// Result of a finished ride.
#[derive(Debug, Clone)]
pub struct RideOutcome {
    pub reason: StopReason,
    pub summary: RideSummary,
    pub track: Track,
}

/// Errors that end a ride early.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// The track refused a point
    #[error("Recording failed: {0}")]
    Recorder(#[from] RecorderError),
}
