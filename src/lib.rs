//! ErgRide - smart trainer control with a simulated outdoor ride
//!
//! Connects to a Bluetooth smart trainer, drives it through a structured
//! workout in ERG mode, and turns the rider's power into a ride along a
//! geographic route, recorded as a time-ordered track.

pub mod recording;
pub mod sensors;
pub mod simulation;
pub mod storage;
pub mod telemetry;
pub mod workouts;
pub mod world;

// Re-export commonly used types
pub use recording::{Track, TrackPoint};
pub use sensors::{Device, SensorManager};
pub use simulation::{RideSimulator, SimulationConfig};
pub use storage::config::AppConfig;
pub use workouts::Workout;
pub use world::Route;
