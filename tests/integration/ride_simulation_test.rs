//! Integration tests for the ride loop.
//!
//! Runs the simulator against mock trainers on the bundled route with short
//! workouts so every test finishes in well under a second.

use ergride::recording::TrackPoint;
use ergride::sensors::capability::MockCharacteristic;
use ergride::sensors::{Capability, CapabilityKind, Device, MockPattern};
use ergride::simulation::{
    shutdown_channel, RideEvent, RideSimulator, SamplingMode, SimulationConfig, StopReason,
};
use ergride::workouts::{Workout, WorkoutSegment};
use ergride::world::Route;
use std::time::Duration;

const RIDE_DEADLINE: Duration = Duration::from_secs(5);

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn mock_power(pattern: MockPattern) -> (Device, MockCharacteristic) {
    let power = MockCharacteristic::new(CapabilityKind::Power, pattern, ms(5));
    let device = Device::new().with_power(Capability::Mock(power.clone()));
    (device, power)
}

fn two_steps() -> Workout {
    Workout::new(
        "Two steps",
        200,
        vec![
            WorkoutSegment::steady(ms(200), 100),
            WorkoutSegment::steady(ms(200), 150),
        ],
    )
    .unwrap()
}

fn config() -> SimulationConfig {
    SimulationConfig {
        ride_name: "Test Ride".to_string(),
        ..SimulationConfig::default()
    }
}

fn assert_track_ordered(points: &[TrackPoint]) {
    for pair in points.windows(2) {
        assert!(pair[1].timestamp >= pair[0].timestamp);
        assert!(pair[1].distance_m >= pair[0].distance_m);
    }
}

#[tokio::test]
async fn test_ride_completes_workout() {
    let (device, power) = mock_power(MockPattern::Constant(200));
    let mut simulator = RideSimulator::new(device, two_steps(), Route::example().unwrap(), config());
    let events = simulator.event_receiver();
    let (_handle, signal) = shutdown_channel();

    let outcome = tokio::time::timeout(RIDE_DEADLINE, simulator.run(signal))
        .await
        .expect("ride did not finish")
        .unwrap();

    assert_eq!(outcome.reason, StopReason::WorkoutComplete);
    assert_eq!(power.writes(), vec![100, 150]);

    let points = outcome.track.points();
    assert!(!points.is_empty());
    assert_track_ordered(points);
    assert!(points.iter().all(|p| p.power == Some(200) && p.cadence.is_none()));
    assert!(points.iter().all(|p| p.speed_kmh > 0.0));

    assert_eq!(outcome.summary.name, "Test Ride");
    assert_eq!(outcome.summary.points, points.len());
    assert!(outcome.summary.moving_time >= ms(400));
    assert!(outcome.summary.distance_m > 0.0);

    let events: Vec<RideEvent> = events.try_iter().collect();
    let targets: Vec<u16> = events
        .iter()
        .filter_map(|e| match e {
            RideEvent::TargetPowerChanged { watts } => Some(*watts),
            _ => None,
        })
        .collect();
    assert_eq!(targets, vec![100, 150]);
    assert!(matches!(events.last(), Some(RideEvent::Finished(_))));
}

#[tokio::test]
async fn test_ride_stops_on_shutdown() {
    let (device, _power) = mock_power(MockPattern::Constant(200));
    let simulator = RideSimulator::new(device, Workout::sample(), Route::example().unwrap(), config());
    let (handle, signal) = shutdown_channel();

    let ride = tokio::spawn(simulator.run(signal));
    tokio::time::sleep(ms(50)).await;
    handle.shutdown();

    let outcome = tokio::time::timeout(RIDE_DEADLINE, ride)
        .await
        .expect("ride ignored shutdown")
        .unwrap()
        .unwrap();

    assert_eq!(outcome.reason, StopReason::Cancelled);
    assert!(outcome.summary.moving_time < Workout::sample().duration());
    assert_track_ordered(outcome.track.points());
}

#[tokio::test]
async fn test_shutdown_before_start() {
    let (device, power) = mock_power(MockPattern::Constant(200));
    let simulator = RideSimulator::new(device, two_steps(), Route::example().unwrap(), config());
    let (handle, signal) = shutdown_channel();
    handle.shutdown();

    let outcome = simulator.run(signal).await.unwrap();

    assert_eq!(outcome.reason, StopReason::Cancelled);
    assert!(outcome.track.is_empty());
    // The opening target is still sent
    assert_eq!(power.writes(), vec![100]);
}

#[tokio::test]
async fn test_ride_ends_when_trainer_disconnects() {
    let (device, _power) = mock_power(MockPattern::Constant(200));
    let trainer = device.clone();
    let simulator = RideSimulator::new(device, Workout::sample(), Route::example().unwrap(), config());
    let (_handle, signal) = shutdown_channel();

    tokio::spawn(async move {
        tokio::time::sleep(ms(50)).await;
        trainer.disconnect().await;
    });

    let outcome = tokio::time::timeout(RIDE_DEADLINE, simulator.run(signal))
        .await
        .expect("ride kept waiting on a closed trainer")
        .unwrap();

    assert_eq!(outcome.reason, StopReason::TelemetryEnded);
}

#[tokio::test]
async fn test_zero_power_pauses_ride() {
    let (device, _power) = mock_power(MockPattern::Constant(0));
    let config = SimulationConfig {
        pause_after_zero_samples: 3,
        ..config()
    };
    let mut simulator = RideSimulator::new(device, two_steps(), Route::example().unwrap(), config);
    let events = simulator.event_receiver();
    let (handle, signal) = shutdown_channel();

    let ride = tokio::spawn(simulator.run(signal));
    tokio::time::sleep(ms(300)).await;
    handle.shutdown();
    let outcome = ride.await.unwrap().unwrap();

    assert_eq!(outcome.reason, StopReason::Cancelled);
    assert!(outcome.summary.moving_time < ms(200));
    assert_eq!(outcome.summary.distance_m, 0.0);
    assert!(outcome.track.points().iter().all(|p| p.speed_kmh == 0.0));
    assert!(events
        .try_iter()
        .any(|e| matches!(e, RideEvent::Paused { .. })));
}

#[tokio::test]
async fn test_fixed_interval_sampling() {
    let (device, _power) = mock_power(MockPattern::Constant(200));
    let config = SimulationConfig {
        sampling: SamplingMode::FixedInterval(ms(25)),
        ..config()
    };
    let simulator = RideSimulator::new(device, Workout::sample(), Route::example().unwrap(), config);
    let (handle, signal) = shutdown_channel();

    let ride = tokio::spawn(simulator.run(signal));
    tokio::time::sleep(ms(200)).await;
    handle.shutdown();
    let outcome = ride.await.unwrap().unwrap();

    // Roughly one point per interval, far fewer than the mock produced
    let points = outcome.track.len();
    assert!((2..=12).contains(&points), "{} points", points);
}

#[tokio::test]
async fn test_fixed_interval_records_latest_reading() {
    let (device, _power) = mock_power(MockPattern::Cycle((1..=1000).collect()));
    let config = SimulationConfig {
        sampling: SamplingMode::FixedInterval(ms(50)),
        ..config()
    };
    let simulator = RideSimulator::new(device, Workout::sample(), Route::example().unwrap(), config);
    let (handle, signal) = shutdown_channel();

    let ride = tokio::spawn(simulator.run(signal));
    tokio::time::sleep(ms(300)).await;
    handle.shutdown();
    let outcome = ride.await.unwrap().unwrap();

    let powers: Vec<u16> = outcome
        .track
        .points()
        .iter()
        .filter_map(|p| p.power)
        .collect();
    assert!(powers.len() >= 3, "{:?}", powers);

    // The mock counts up every 5 ms, so each tick should skip ahead by about
    // ten. Leftovers queued before the tick would only advance by one or two.
    let first = powers[0];
    let last = powers[powers.len() - 1];
    let per_tick = (last - first) as usize / (powers.len() - 1);
    assert!(per_tick >= 4, "{:?}", powers);
}
