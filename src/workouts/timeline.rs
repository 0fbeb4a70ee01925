//! Time queries over a [`Workout`].

use crate::workouts::types::{Workout, WorkoutSegment};
use std::time::Duration;

/// The built-in demo session.
const SAMPLE_NAME: &str = "Sweet Spot Builder";
const SAMPLE_FTP: u16 = 200;

impl Workout {
    /// Demo session: a 30 minute ramp from 120 to 200 W, 30 s easy, then
    /// 40 minutes at 195 W.
    pub fn sample() -> Self {
        Self::from_valid_segments(
            SAMPLE_NAME,
            SAMPLE_FTP,
            vec![
                WorkoutSegment::ramp(Duration::from_secs(30 * 60), 120, 200),
                WorkoutSegment::steady(Duration::from_secs(30), 120),
                WorkoutSegment::steady(Duration::from_secs(40 * 60), 195),
            ],
        )
    }

    /// Sum of every segment's duration.
    pub fn duration(&self) -> Duration {
        self.segments().iter().map(|s| s.duration).sum()
    }

    /// Active segment and its index at `elapsed`, `None` once the workout is over.
    pub fn segment_at(&self, elapsed: Duration) -> Option<(usize, &WorkoutSegment)> {
        self.locate(elapsed)
            .map(|(index, segment, _)| (index, segment))
    }

    /// Target power at `elapsed`, interpolated inside ramps.
    /// `None` once `elapsed >= duration()`.
    pub fn power_at(&self, elapsed: Duration) -> Option<u16> {
        self.locate(elapsed)
            .map(|(_, segment, offset)| segment.power_at(offset).round() as u16)
    }

    /// Time left until the workout ends, zero past the end.
    pub fn remaining_at(&self, elapsed: Duration) -> Duration {
        self.duration().saturating_sub(elapsed)
    }

    /// Lowest target of any segment endpoint.
    pub fn min_power(&self) -> u16 {
        self.segments()
            .iter()
            .flat_map(|s| [s.start_power, s.end_power])
            .min()
            .unwrap_or(0)
    }

    /// Highest target of any segment endpoint.
    pub fn max_power(&self) -> u16 {
        self.segments()
            .iter()
            .flat_map(|s| [s.start_power, s.end_power])
            .max()
            .unwrap_or(0)
    }

    /// Ratio of the time-weighted average target to FTP.
    pub fn intensity_factor(&self) -> Option<f64> {
        if self.ftp() == 0 {
            return None;
        }

        let total = self.duration().as_secs_f64();
        let weighted: f64 = self
            .segments()
            .iter()
            .map(|s| s.average_power() * s.duration.as_secs_f64())
            .sum();

        Some(weighted / total / self.ftp() as f64)
    }

    /// Training Stress Score estimate: hours x IF² x 100.
    pub fn estimated_tss(&self) -> Option<f64> {
        let intensity = self.intensity_factor()?;
        let hours = self.duration().as_secs_f64() / 3600.0;
        Some(hours * intensity * intensity * 100.0)
    }

    /// Walk the segments, subtracting each duration until `elapsed` falls inside one.
    fn locate(&self, elapsed: Duration) -> Option<(usize, &WorkoutSegment, Duration)> {
        let mut remaining = elapsed;
        for (index, segment) in self.segments().iter().enumerate() {
            if remaining < segment.duration {
                return Some((index, segment, remaining));
            }
            remaining -= segment.duration;
        }
        None
    }
}
