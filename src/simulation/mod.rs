//! Simulated outdoor ride driven by trainer telemetry.

pub mod planner;
mod sampler;
pub mod shutdown;
pub mod simulator;
pub mod types;

pub use planner::{PlanStep, WorkoutPlanner};
pub use shutdown::{shutdown_channel, ShutdownHandle, ShutdownSignal};
pub use simulator::RideSimulator;
pub use types::{
    RideEvent, RideOutcome, SamplingMode, SimulationConfig, SimulationError, StopReason,
};
