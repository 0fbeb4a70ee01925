//! Workout clock and target power planning.

use crate::workouts::Workout;
use std::time::Duration;

/// What changed during one planning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlanStep {
    /// New target to send to the trainer
    pub target: Option<u16>,
    /// `Some(true)` when the ride just paused, `Some(false)` when it resumed
    pub pause_changed: Option<bool>,
    /// Workout clock reached the end
    pub finished: bool,
}

/// Advances the workout clock and decides when the trainer target changes.
#[derive(Debug, Clone)]
pub struct WorkoutPlanner {
    workout: Workout,
    elapsed: Duration,
    paused: bool,
    zero_streak: u32,
    pause_after: u32,
    last_target: Option<u16>,
}

impl WorkoutPlanner {
    /// `pause_after` zero-power samples in a row pause the clock; 0 disables it.
    pub fn new(workout: Workout, pause_after: u32) -> Self {
        Self {
            workout,
            elapsed: Duration::ZERO,
            paused: false,
            zero_streak: 0,
            pause_after,
            last_target: None,
        }
    }

    pub fn workout(&self) -> &Workout {
        &self.workout
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Target to send before the first sample arrives.
    pub fn start(&mut self) -> Option<u16> {
        let target = self.workout.power_at(self.elapsed);
        self.last_target = target;
        target
    }

    /// Move the clock by `dt` given the latest power sample.
    pub fn advance(&mut self, dt: Duration, power: Option<u16>) -> PlanStep {
        let mut step = PlanStep::default();

        match power {
            Some(0) => {
                self.zero_streak = self.zero_streak.saturating_add(1);
                if self.pause_after > 0 && self.zero_streak >= self.pause_after && !self.paused {
                    self.paused = true;
                    step.pause_changed = Some(true);
                }
            }
            Some(_) => {
                self.zero_streak = 0;
                if self.paused {
                    self.paused = false;
                    step.pause_changed = Some(false);
                }
            }
            None => {}
        }

        if !self.paused {
            self.elapsed += dt;
        }

        let target = self.workout.power_at(self.elapsed);
        if target.is_some() && target != self.last_target {
            step.target = target;
            self.last_target = target;
        }

        step.finished = self.elapsed >= self.workout.duration();
        step
    }
}
