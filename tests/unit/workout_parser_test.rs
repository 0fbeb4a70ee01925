//! Unit tests for the text workout format.

use ergride::workouts::{parse_workout, WorkoutParseError, WorkoutSegment};
use std::time::Duration;

#[test]
fn test_parse_mixed_steps() {
    let workout = parse_workout("Over-unders;250;150-250-600;260-300;200-200-120").unwrap();

    assert_eq!(workout.name(), "Over-unders");
    assert_eq!(workout.ftp(), 250);
    assert_eq!(
        workout.segments(),
        &[
            WorkoutSegment::ramp(Duration::from_secs(600), 150, 250),
            WorkoutSegment::steady(Duration::from_secs(300), 260),
            WorkoutSegment::steady(Duration::from_secs(120), 200),
        ]
    );
    assert_eq!(workout.duration(), Duration::from_secs(1020));
}

#[test]
fn test_parse_tolerates_whitespace_and_trailing_separator() {
    let workout = parse_workout("  Easy ; 180 ; 120 - 900 ;\n").unwrap();
    assert_eq!(workout.name(), "Easy");
    assert_eq!(workout.ftp(), 180);
    assert_eq!(workout.power_at(Duration::from_secs(450)), Some(120));
}

#[test]
fn test_parse_missing_fields() {
    assert_eq!(
        parse_workout("").unwrap_err(),
        WorkoutParseError::MissingField("name".to_string())
    );
    assert_eq!(
        parse_workout("Only a name").unwrap_err(),
        WorkoutParseError::MissingField("ftp".to_string())
    );
}

#[test]
fn test_parse_no_steps() {
    assert_eq!(
        parse_workout("Nothing;200").unwrap_err(),
        WorkoutParseError::EmptyWorkout
    );
}

#[test]
fn test_parse_invalid_numbers() {
    assert!(matches!(
        parse_workout("Bad;two hundred;100-60"),
        Err(WorkoutParseError::InvalidValue { .. })
    ));
    assert!(matches!(
        parse_workout("Bad;200;100-abc"),
        Err(WorkoutParseError::InvalidValue { .. })
    ));
    assert!(matches!(
        parse_workout("Bad;200;70000-60"),
        Err(WorkoutParseError::InvalidValue { .. })
    ));
}

#[test]
fn test_parse_zero_duration_step() {
    let err = parse_workout("Bad;200;100-200-0").unwrap_err();
    assert!(matches!(err, WorkoutParseError::InvalidValue { value, .. } if value == "0"));
}

#[test]
fn test_parse_malformed_step() {
    assert_eq!(
        parse_workout("Bad;200;100-200-300-400").unwrap_err(),
        WorkoutParseError::MalformedStep {
            index: 0,
            step: "100-200-300-400".to_string()
        }
    );
    assert!(matches!(
        parse_workout("Bad;200;100-60;;150-60"),
        Err(WorkoutParseError::MalformedStep { index: 1, .. })
    ));
}
