//! Unit tests for workout timelines.

use ergride::workouts::{Workout, WorkoutError, WorkoutSegment};
use std::time::Duration;

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

fn steady_then_ramp() -> Workout {
    Workout::new(
        "Steady then ramp",
        200,
        vec![
            WorkoutSegment::steady(secs(10), 100),
            WorkoutSegment::ramp(secs(10), 100, 200),
        ],
    )
    .unwrap()
}

#[test]
fn test_duration_is_sum_of_segments() {
    let workout = steady_then_ramp();
    assert_eq!(workout.duration(), secs(20));

    let sample = Workout::sample();
    let total: Duration = sample.segments().iter().map(|s| s.duration).sum();
    assert_eq!(sample.duration(), total);
}

#[test]
fn test_power_inside_ramp() {
    let workout = steady_then_ramp();
    assert_eq!(workout.power_at(secs(15)), Some(150));
}

#[test]
fn test_power_past_end_is_none() {
    let workout = steady_then_ramp();
    assert_eq!(workout.power_at(secs(20)), None);
    assert_eq!(workout.power_at(secs(3600)), None);

    let sample = Workout::sample();
    assert_eq!(sample.power_at(sample.duration()), None);
}

#[test]
fn test_steady_segment_is_flat() {
    let workout = steady_then_ramp();
    for s in 0..10 {
        assert_eq!(workout.power_at(secs(s)), Some(100));
    }
    assert_eq!(workout.power_at(Duration::from_millis(9_999)), Some(100));
}

#[test]
fn test_ramp_midpoint_is_exact() {
    let ramp = WorkoutSegment::ramp(secs(10), 100, 200);
    assert_eq!(ramp.power_at(secs(5)), 150.0);

    let workout = Workout::new("ramp", 200, vec![ramp]).unwrap();
    assert_eq!(workout.power_at(secs(5)), Some(150));
}

#[test]
fn test_descending_ramp() {
    let workout = Workout::new(
        "cool down",
        200,
        vec![WorkoutSegment::ramp(secs(100), 200, 100)],
    )
    .unwrap();
    assert_eq!(workout.power_at(secs(0)), Some(200));
    assert_eq!(workout.power_at(secs(25)), Some(175));
    assert_eq!(workout.power_at(secs(99)), Some(101));
}

#[test]
fn test_segment_lookup_and_remaining() {
    let workout = steady_then_ramp();
    assert_eq!(workout.segment_at(secs(9)).map(|(i, _)| i), Some(0));
    assert_eq!(workout.segment_at(secs(10)).map(|(i, _)| i), Some(1));
    assert!(workout.segment_at(secs(20)).is_none());

    assert_eq!(workout.remaining_at(secs(5)), secs(15));
    assert_eq!(workout.remaining_at(secs(30)), Duration::ZERO);
}

#[test]
fn test_power_range() {
    let workout = steady_then_ramp();
    assert_eq!(workout.min_power(), 100);
    assert_eq!(workout.max_power(), 200);
}

#[test]
fn test_invalid_workouts_rejected() {
    assert!(matches!(
        Workout::new("empty", 200, vec![]),
        Err(WorkoutError::Empty)
    ));
    assert!(matches!(
        Workout::new(
            "zero",
            200,
            vec![
                WorkoutSegment::steady(secs(60), 150),
                WorkoutSegment::steady(Duration::ZERO, 200),
            ]
        ),
        Err(WorkoutError::ZeroDurationSegment(1))
    ));
}

#[test]
fn test_sample_workout_shape() {
    let workout = Workout::sample();
    assert_eq!(workout.ftp(), 200);
    assert_eq!(workout.duration(), secs(30 * 60 + 30 + 40 * 60));
    assert_eq!(workout.power_at(Duration::ZERO), Some(120));
    assert!(workout.estimated_tss().unwrap() > 0.0);
}
