//! BLE trainer link: discovery, wire codec and device capabilities.

pub mod capability;
pub mod device;
pub mod ftms;
pub mod manager;
pub mod types;

pub use capability::{Capability, MockPattern};
pub use device::Device;
pub use manager::{SensorManager, TrainerLink};
pub use types::{CapabilityKind, DiscoveredTrainer, SensorConfig, SensorError};
