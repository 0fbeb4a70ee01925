//! A trainer as seen by the rest of the ride: three optional capability slots.

use crate::sensors::capability::{Capability, MockCharacteristic, MockPattern};
use crate::sensors::types::{CapabilityKind, SensorError};
use crate::telemetry::fanout::Backpressure;
use std::time::Duration;

/// Watts cycled by [`Device::mock`], one value every two seconds.
const MOCK_POWER_CYCLE: [u16; 6] = [150, 180, 210, 240, 210, 180];
const MOCK_INTERVAL: Duration = Duration::from_secs(2);

/// Trainer with independent power, speed and cadence slots.
///
/// Cloning is cheap: capabilities share their fan-out and link state.
#[derive(Debug, Clone, Default)]
pub struct Device {
    power: Option<Capability>,
    speed: Option<Capability>,
    cadence: Option<Capability>,
}

impl Device {
    /// Device with no capabilities.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_power(mut self, capability: Capability) -> Self {
        self.power = Some(capability);
        self
    }

    pub fn with_speed(mut self, capability: Capability) -> Self {
        self.speed = Some(capability);
        self
    }

    pub fn with_cadence(mut self, capability: Capability) -> Self {
        self.cadence = Some(capability);
        self
    }

    /// Hardware-free trainer: cycling power, a cadence sensor that never
    /// works, and no speed.
    pub fn mock() -> Self {
        Self::mock_with_backpressure(Backpressure::default())
    }

    /// [`Device::mock`] with a chosen delivery policy.
    pub fn mock_with_backpressure(backpressure: Backpressure) -> Self {
        Self::new()
            .with_power(Capability::Mock(MockCharacteristic::with_backpressure(
                CapabilityKind::Power,
                MockPattern::Cycle(MOCK_POWER_CYCLE.to_vec()),
                MOCK_INTERVAL,
                backpressure,
            )))
            .with_cadence(Capability::failing(CapabilityKind::Cadence))
    }

    pub fn capability(&self, kind: CapabilityKind) -> Option<&Capability> {
        match kind {
            CapabilityKind::Power => self.power.as_ref(),
            CapabilityKind::Speed => self.speed.as_ref(),
            CapabilityKind::Cadence => self.cadence.as_ref(),
        }
    }

    fn capabilities(&self) -> impl Iterator<Item = &Capability> {
        [&self.power, &self.speed, &self.cadence]
            .into_iter()
            .flatten()
    }

    /// Start continuous reads on every capability. Failures are logged and
    /// leave the other capabilities running.
    pub async fn listen(&self) {
        for capability in self.capabilities() {
            if let Err(e) = capability.continuous_read().await {
                tracing::warn!("Not reading {}: {}", capability.kind(), e);
            }
        }
    }

    /// Ask the trainer for control through its power capability.
    pub async fn request_control(&self) -> Result<(), SensorError> {
        match &self.power {
            Some(power) => power.request_control().await,
            None => Err(SensorError::WriteFailed(
                "device has no power capability".to_string(),
            )),
        }
    }

    /// Ask for control, settling for a read-only trainer when refused.
    /// Returns whether target writes will be accepted.
    pub async fn try_take_control(&self) -> bool {
        match self.request_control().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Trainer refused control, riding without ERG targets: {}", e);
                false
            }
        }
    }

    /// Set a new target power. Returns the acknowledged value.
    pub async fn set_target_power(&self, watts: u16) -> Result<u16, SensorError> {
        match &self.power {
            Some(power) => power.write(watts).await,
            None => Err(SensorError::WriteFailed(
                "device has no power capability".to_string(),
            )),
        }
    }

    /// Close every capability and drop the BLE link if there is one.
    pub async fn disconnect(&self) {
        tracing::info!("Disconnecting trainer");
        for capability in self.capabilities() {
            capability.close();
        }

        // Live capabilities share one peripheral, disconnecting it once is enough
        let live = self.capabilities().find_map(|c| match c {
            Capability::Live(live) => Some(live),
            _ => None,
        });
        if let Some(live) = live {
            if let Err(e) = live.disconnect().await {
                tracing::warn!("Trainer disconnect failed: {}", e);
            }
        }
    }
}
