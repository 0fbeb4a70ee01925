//! Integration test modules.

mod ride_simulation_test;
mod sensor_mock;
