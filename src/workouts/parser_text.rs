//! Compact text workout format.
//!
//! `name;ftp;step;step;...` where each step is `startW-endW-seconds` for a
//! ramp or `watts-seconds` for a steady block, e.g.
//! `Over-unders;250;150-250-600;260-300;200-200-120`.
//! Surrounding whitespace and a trailing `;` are accepted.

use crate::workouts::types::{Workout, WorkoutParseError, WorkoutSegment};
use std::time::Duration;

/// Parse a workout from its text form.
pub fn parse_workout(text: &str) -> Result<Workout, WorkoutParseError> {
    let text = text.trim();
    let text = text.strip_suffix(';').unwrap_or(text);
    let mut fields = text.split(';').map(str::trim);

    let name = fields
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| WorkoutParseError::MissingField("name".to_string()))?;

    let ftp = fields
        .next()
        .ok_or_else(|| WorkoutParseError::MissingField("ftp".to_string()))?;
    let ftp = parse_number(ftp, "ftp")?;

    let segments = fields
        .enumerate()
        .map(|(index, step)| parse_step(index, step))
        .collect::<Result<Vec<_>, _>>()?;

    if segments.is_empty() {
        return Err(WorkoutParseError::EmptyWorkout);
    }

    Ok(Workout::from_valid_segments(name, ftp, segments))
}

fn parse_step(index: usize, step: &str) -> Result<WorkoutSegment, WorkoutParseError> {
    let parts: Vec<&str> = step.split('-').map(str::trim).collect();

    let (start, end, seconds) = match parts.as_slice() {
        [watts, seconds] => (*watts, *watts, *seconds),
        [start, end, seconds] => (*start, *end, *seconds),
        _ => {
            return Err(WorkoutParseError::MalformedStep {
                index,
                step: step.to_string(),
            })
        }
    };

    let start_power = parse_number(start, &format!("step {} start power", index))?;
    let end_power = parse_number(end, &format!("step {} end power", index))?;
    let seconds: u64 = parse_number(seconds, &format!("step {} duration", index))?;

    if seconds == 0 {
        return Err(WorkoutParseError::InvalidValue {
            field: format!("step {} duration", index),
            value: "0".to_string(),
        });
    }

    Ok(WorkoutSegment::ramp(
        Duration::from_secs(seconds),
        start_power,
        end_power,
    ))
}

fn parse_number<T: std::str::FromStr>(value: &str, field: &str) -> Result<T, WorkoutParseError> {
    value.parse().map_err(|_| WorkoutParseError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    })
}
