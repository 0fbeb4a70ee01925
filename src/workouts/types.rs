//! Workout types and errors.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// One workout interval whose target moves linearly from `start_power` to
/// `end_power` over `duration`. A steady interval has equal endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutSegment {
    /// Segment length, always positive once inside a [`Workout`]
    pub duration: Duration,
    /// Target at the start of the segment in watts
    pub start_power: u16,
    /// Target at the end of the segment in watts
    pub end_power: u16,
}

impl WorkoutSegment {
    /// Constant-power segment.
    pub fn steady(duration: Duration, watts: u16) -> Self {
        Self {
            duration,
            start_power: watts,
            end_power: watts,
        }
    }

    /// Linear ramp between two targets.
    pub fn ramp(duration: Duration, start_power: u16, end_power: u16) -> Self {
        Self {
            duration,
            start_power,
            end_power,
        }
    }

    /// Target `offset` into this segment, clamped to the segment.
    pub fn power_at(&self, offset: Duration) -> f64 {
        let progress = (offset.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0);
        let start = self.start_power as f64;
        let end = self.end_power as f64;
        start + (end - start) * progress
    }

    /// Mean target over the whole segment.
    pub fn average_power(&self) -> f64 {
        (self.start_power as f64 + self.end_power as f64) / 2.0
    }
}

/// A planned training session. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Workout {
    name: String,
    ftp: u16,
    segments: Vec<WorkoutSegment>,
}

impl Workout {
    /// Build a workout. Needs at least one segment and no zero-length ones.
    pub fn new(
        name: impl Into<String>,
        ftp: u16,
        segments: Vec<WorkoutSegment>,
    ) -> Result<Self, WorkoutError> {
        if segments.is_empty() {
            return Err(WorkoutError::Empty);
        }
        if let Some(index) = segments.iter().position(|s| s.duration.is_zero()) {
            return Err(WorkoutError::ZeroDurationSegment(index));
        }

        Ok(Self {
            name: name.into(),
            ftp,
            segments,
        })
    }

    /// Skips validation for segment lists known to be well formed.
    pub(crate) fn from_valid_segments(
        name: &str,
        ftp: u16,
        segments: Vec<WorkoutSegment>,
    ) -> Self {
        debug_assert!(!segments.is_empty());
        Self {
            name: name.to_string(),
            ftp,
            segments,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Functional threshold power the session was planned around.
    pub fn ftp(&self) -> u16 {
        self.ftp
    }

    pub fn segments(&self) -> &[WorkoutSegment] {
        &self.segments
    }
}

/// Errors building a workout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkoutError {
    /// No segments given
    #[error("Workout has no segments")]
    Empty,

    /// A segment with no length
    #[error("Segment {0} has zero duration")]
    ZeroDurationSegment(usize),

    /// Text could not be parsed into a workout
    #[error("Failed to parse workout: {0}")]
    ParseError(#[from] WorkoutParseError),
}

/// Errors parsing the textual workout format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkoutParseError {
    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Field present but not a valid number
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Step does not have the `start-end-seconds` shape
    #[error("Malformed step {index}: {step}")]
    MalformedStep { index: usize, step: String },

    /// Empty workout (no steps)
    #[error("Workout has no segments")]
    EmptyWorkout,
}
