//! The ride loop: telemetry in, trainer targets and track points out.

use crate::recording::{RideProgress, Track, TrackPoint};
use crate::sensors::{CapabilityKind, Device};
use crate::simulation::planner::WorkoutPlanner;
use crate::simulation::sampler::Sampler;
use crate::simulation::shutdown::ShutdownSignal;
use crate::simulation::types::{RideEvent, RideOutcome, SimulationConfig, SimulationError, StopReason};
use crate::telemetry::{TelemetryHub, TelemetrySample};
use crate::workouts::Workout;
use crate::world::route::Route;
use chrono::Utc;
use crossbeam::channel::{Receiver, Sender};
use std::time::Duration;
use tokio::time::Instant;

const KMH_TO_MS: f64 = 1.0 / 3.6;

/// Drives a trainer through a workout while riding a simulated route.
///
/// Single owner of the ride progress and the track; nothing else mutates them.
pub struct RideSimulator {
    hub: TelemetryHub,
    ride: Ride,
}

/// Everything a tick reads or updates.
struct Ride {
    device: Device,
    planner: WorkoutPlanner,
    route: Route,
    config: SimulationConfig,
    track: Track,
    progress: RideProgress,
    event_tx: Option<Sender<RideEvent>>,
}

impl RideSimulator {
    /// Attach to the device's telemetry. Listeners are registered here, so
    /// samples produced from now on reach the ride loop.
    pub fn new(device: Device, workout: Workout, route: Route, config: SimulationConfig) -> Self {
        let hub = TelemetryHub::attach(&device).with_stall_timeout(config.stall_timeout);
        let planner = WorkoutPlanner::new(workout, config.pause_after_zero_samples);

        Self {
            hub,
            ride: Ride {
                device,
                planner,
                route,
                config,
                track: Track::new(),
                progress: RideProgress::default(),
                event_tx: None,
            },
        }
    }

    /// Get a receiver for ride events.
    pub fn event_receiver(&mut self) -> Receiver<RideEvent> {
        let (tx, rx) = crossbeam::channel::unbounded();
        self.ride.event_tx = Some(tx);
        rx
    }

    pub fn progress(&self) -> RideProgress {
        self.ride.progress
    }

    pub fn track(&self) -> &Track {
        &self.ride.track
    }

    /// Run until shutdown, the end of telemetry, or the end of the workout.
    pub async fn run(self, mut shutdown: ShutdownSignal) -> Result<RideOutcome, SimulationError> {
        let RideSimulator { hub, mut ride } = self;

        tracing::info!(
            "Starting ride '{}': workout '{}' ({:?}) on route '{}' ({:.0} m)",
            ride.config.ride_name,
            ride.planner.workout().name(),
            ride.planner.workout().duration(),
            ride.route.name(),
            ride.route.total_distance()
        );

        if !hub.available(CapabilityKind::Power) {
            tracing::warn!("Trainer reports no power, the rider will not move");
        }

        let mut sampler = Sampler::new(hub, ride.config.sampling);
        ride.device.listen().await;

        if let Some(target) = ride.planner.start() {
            ride.write_target(target).await;
        }

        let mut last_tick = Instant::now();

        let reason = loop {
            if shutdown.is_shutdown() {
                break StopReason::Cancelled;
            }

            let sample = tokio::select! {
                _ = shutdown.cancelled() => break StopReason::Cancelled,
                sample = sampler.next() => sample,
            };

            let Some(sample) = sample else {
                tracing::info!("Telemetry ended");
                break StopReason::TelemetryEnded;
            };

            let now = Instant::now();
            let dt = now.duration_since(last_tick);
            last_tick = now;

            if ride.tick(sample, dt).await? {
                tracing::info!("Workout complete");
                break StopReason::WorkoutComplete;
            }
        };

        let summary = ride
            .track
            .summary(&ride.config.ride_name, ride.progress.elapsed);
        tracing::info!(
            "Ride finished ({:?}): {:.0} m in {:?}, {} points",
            reason,
            summary.distance_m,
            summary.moving_time,
            summary.points
        );
        ride.send_event(RideEvent::Finished(summary.clone()));

        Ok(RideOutcome {
            reason,
            summary,
            track: ride.track,
        })
    }
}

impl Ride {
    fn send_event(&self, event: RideEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// One simulation step. Returns true once the workout is over.
    async fn tick(&mut self, sample: TelemetrySample, dt: Duration) -> Result<bool, SimulationError> {
        let power = sample.power_watts;
        let step = self.planner.advance(dt, power);

        match step.pause_changed {
            Some(true) => {
                tracing::info!("No power, pausing at {:?}", self.planner.elapsed());
                self.send_event(RideEvent::Paused {
                    elapsed: self.planner.elapsed(),
                });
            }
            Some(false) => {
                tracing::info!("Power back, resuming at {:?}", self.planner.elapsed());
                self.send_event(RideEvent::Resumed {
                    elapsed: self.planner.elapsed(),
                });
            }
            None => {}
        }

        if let Some(target) = step.target {
            self.write_target(target).await;
        }

        let speed_kmh = if self.planner.is_paused() {
            0.0
        } else {
            self.route.speed(
                self.progress.travelled_m,
                power.unwrap_or(0) as f64,
                &self.config.speed_model,
                self.config.slope_mode,
            )
        };
        self.progress.travelled_m += speed_kmh * KMH_TO_MS * dt.as_secs_f64();
        self.progress.elapsed = self.planner.elapsed();
        self.progress.paused = self.planner.is_paused();

        let position = self.route.coord_info(self.progress.travelled_m);

        // Wall clock may step backwards, the track may not
        let now = Utc::now();
        let timestamp = self.track.last().map_or(now, |p| p.timestamp.max(now));

        let point = TrackPoint {
            lat: position.point.lat,
            lon: position.point.lon,
            elevation: position.point.elevation,
            timestamp,
            power,
            cadence: sample.cadence_rpm,
            heart_rate: None,
            speed_kmh,
            distance_m: self.progress.travelled_m,
        };

        tracing::debug!(
            "Track point: power {:?}, cadence {:?}, {:.1} km/h, {:.1} m",
            point.power,
            point.cadence,
            point.speed_kmh,
            point.distance_m
        );

        self.track.push(point.clone())?;
        self.send_event(RideEvent::PointRecorded(point));

        Ok(step.finished)
    }

    async fn write_target(&self, watts: u16) {
        match self.device.set_target_power(watts).await {
            Ok(acknowledged) => {
                tracing::info!("Target power set to {}W", acknowledged);
                self.send_event(RideEvent::TargetPowerChanged {
                    watts: acknowledged,
                });
            }
            Err(e) => tracing::warn!("Could not write target power {}W: {}", watts, e),
        }
    }
}
