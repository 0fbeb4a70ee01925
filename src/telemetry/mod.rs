//! Distribution of decoded trainer samples to the rest of the ride.

pub mod fanout;
pub mod hub;

pub use fanout::{Backpressure, Fanout, SampleStream};
pub use hub::{TelemetryHub, TelemetrySample};
