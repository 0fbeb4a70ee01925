//! Workout module for structured training sessions.

pub mod parser_text;
pub mod timeline;
pub mod types;

pub use parser_text::parse_workout;
pub use types::{Workout, WorkoutError, WorkoutParseError, WorkoutSegment};
