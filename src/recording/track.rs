//! Append-only track of a ride.

use crate::recording::types::{RecorderError, RideSummary, TrackPoint};
use std::time::Duration;

/// Time-ordered track points plus running totals for the live summary.
#[derive(Debug, Clone, Default)]
pub struct Track {
    points: Vec<TrackPoint>,
    power_sum: u64,
    power_samples: u64,
    max_power: Option<u16>,
    cadence_sum: u64,
    cadence_samples: u64,
}

impl Track {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point. Points must not go back in time and must have
    /// finite coordinates.
    pub fn push(&mut self, point: TrackPoint) -> Result<(), RecorderError> {
        if let Some(last) = self.points.last() {
            if point.timestamp < last.timestamp {
                return Err(RecorderError::OutOfOrder {
                    last: last.timestamp,
                    attempted: point.timestamp,
                });
            }
        }

        let checks = [
            (point.lat, "latitude"),
            (point.lon, "longitude"),
            (point.elevation, "elevation"),
            (point.speed_kmh, "speed"),
            (point.distance_m, "distance"),
        ];
        if let Some((_, field)) = checks.iter().find(|(value, _)| !value.is_finite()) {
            return Err(RecorderError::InvalidPoint(field));
        }

        if let Some(power) = point.power {
            self.power_sum += power as u64;
            self.power_samples += 1;
            self.max_power = Some(self.max_power.map_or(power, |m| m.max(power)));
        }
        if let Some(cadence) = point.cadence {
            self.cadence_sum += cadence as u64;
            self.cadence_samples += 1;
        }

        self.points.push(point);
        Ok(())
    }

    /// Every point recorded so far, oldest first.
    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn last(&self) -> Option<&TrackPoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Hand the recorded points to a serializer.
    pub fn into_points(self) -> Vec<TrackPoint> {
        self.points
    }

    /// Summary of the track so far.
    pub fn summary(&self, name: &str, moving_time: Duration) -> RideSummary {
        let average = |sum: u64, count: u64| (count > 0).then(|| (sum / count) as u16);
        let distance_m = self.last().map_or(0.0, |p| p.distance_m);
        let hours = moving_time.as_secs_f64() / 3600.0;

        RideSummary {
            name: name.to_string(),
            started_at: self.points.first().map(|p| p.timestamp),
            moving_time,
            distance_m,
            avg_power: average(self.power_sum, self.power_samples),
            max_power: self.max_power,
            avg_cadence: average(self.cadence_sum, self.cadence_samples),
            avg_speed_kmh: if hours > 0.0 {
                distance_m / 1000.0 / hours
            } else {
                0.0
            },
            points: self.points.len(),
        }
    }
}
