//! Trainer discovery and connection over BLE.
//!
//! Discovery scans for peers advertising the Fitness Machine or Cycling Power
//! service, probes each new peer once, and binds to the first one exposing
//! both the power measurement and the control point.

use crate::sensors::capability::{Capability, ControlState, LiveCharacteristic};
use crate::sensors::device::Device;
use crate::sensors::ftms::{
    supports_crank_revolutions, CYCLING_POWER_FEATURE_UUID, CYCLING_POWER_MEASUREMENT_UUID,
    CYCLING_POWER_SERVICE_UUID, FTMS_CONTROL_POINT_UUID, FTMS_SERVICE_UUID,
};
use crate::sensors::types::{CapabilityKind, DiscoveredTrainer, SensorConfig, SensorError};
use crate::telemetry::fanout::Backpressure;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A probed trainer with the characteristics needed to drive it.
#[derive(Debug, Clone)]
pub struct TrainerLink {
    pub trainer: DiscoveredTrainer,
    peripheral: Peripheral,
    measurement: Characteristic,
    control_point: Characteristic,
    feature: Option<Characteristic>,
}

/// Finds and connects to a smart trainer.
pub struct SensorManager {
    adapter: Adapter,
    config: SensorConfig,
    backpressure: Backpressure,
}

impl SensorManager {
    /// Create a manager on an explicit adapter.
    pub fn new(adapter: Adapter, config: SensorConfig) -> Self {
        Self {
            adapter,
            config,
            backpressure: Backpressure::default(),
        }
    }

    /// Create a manager on the first adapter the system reports.
    pub async fn with_first_adapter(config: SensorConfig) -> Result<Self, SensorError> {
        tracing::info!("Initializing SensorManager");

        let manager = Manager::new()
            .await
            .map_err(|e| SensorError::BleError(e.to_string()))?;

        let adapter = manager
            .adapters()
            .await
            .map_err(|e| SensorError::BleError(e.to_string()))?
            .into_iter()
            .next()
            .ok_or(SensorError::AdapterNotFound)?;

        tracing::info!("BLE adapter initialized");
        Ok(Self::new(adapter, config))
    }

    /// Delivery policy for the capabilities of connected devices.
    pub fn with_backpressure(mut self, backpressure: Backpressure) -> Self {
        self.backpressure = backpressure;
        self
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Scan until a usable trainer is found or the discovery deadline passes.
    pub async fn discover(&self) -> Result<TrainerLink, SensorError> {
        let scan_filter = ScanFilter {
            services: vec![FTMS_SERVICE_UUID, CYCLING_POWER_SERVICE_UUID],
        };

        self.adapter
            .start_scan(scan_filter)
            .await
            .map_err(|e| SensorError::ScanFailed(e.to_string()))?;

        tracing::info!(
            "Scanning for trainers (timeout {:?})",
            self.config.discovery_timeout
        );

        let deadline = tokio::time::Instant::now() + self.config.discovery_timeout;
        let outcome = self.scan(deadline).await;

        if let Err(e) = self.adapter.stop_scan().await {
            tracing::warn!("Failed to stop scan: {}", e);
        }

        if let Err(SensorError::DiscoveryTimeout(limit)) = &outcome {
            tracing::error!("No supported trainer found within {:?}", limit);
        }
        outcome
    }

    async fn scan(&self, deadline: tokio::time::Instant) -> Result<TrainerLink, SensorError> {
        let limit = self.config.discovery_timeout;
        let expired = |_| SensorError::DiscoveryTimeout(limit);

        let mut events = self
            .adapter
            .events()
            .await
            .map_err(|e| SensorError::ScanFailed(e.to_string()))?;

        let mut probed: HashSet<PeripheralId> = HashSet::new();

        // Peers the adapter already knows about never produce a new event
        let known = tokio::time::timeout_at(deadline, self.adapter.peripherals())
            .await
            .map_err(expired)?
            .map_err(|e| SensorError::BleError(e.to_string()))?;
        for peripheral in known {
            if let Some(link) = self.try_candidate(peripheral, &mut probed, deadline).await? {
                return Ok(link);
            }
        }

        while let Some(event) = tokio::time::timeout_at(deadline, events.next())
            .await
            .map_err(expired)?
        {
            let id = match event {
                CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                _ => continue,
            };
            if probed.contains(&id) {
                continue;
            }

            let peripheral = match self.adapter.peripheral(&id).await {
                Ok(p) => p,
                Err(e) => {
                    tracing::debug!("Peer {:?} vanished: {}", id, e);
                    continue;
                }
            };

            if let Some(link) = self.try_candidate(peripheral, &mut probed, deadline).await? {
                return Ok(link);
            }
        }

        Err(SensorError::ScanFailed("adapter event stream ended".to_string()))
    }

    /// Probe a peer once. Recoverable failures are logged and yield `None`.
    /// A peer still being inspected when the deadline passes is disconnected.
    async fn try_candidate(
        &self,
        peripheral: Peripheral,
        probed: &mut HashSet<PeripheralId>,
        deadline: tokio::time::Instant,
    ) -> Result<Option<TrainerLink>, SensorError> {
        if !probed.insert(peripheral.id()) {
            return Ok(None);
        }

        let probing = self.probe(peripheral.clone());
        let release = self.release(&peripheral);
        match within_deadline(deadline, self.config.discovery_timeout, probing, release).await {
            Ok(link) => {
                tracing::info!(
                    "Found trainer {} ({})",
                    link.trainer.name,
                    link.trainer.device_id
                );
                Ok(Some(link))
            }
            Err(e) if e.is_recoverable() => {
                tracing::info!("Skipping {}: {}", peripheral.id(), e);
                self.release(&peripheral).await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Best-effort disconnect of a peer that will not be used.
    async fn release(&self, peripheral: &Peripheral) {
        match tokio::time::timeout(self.config.connection_timeout, peripheral.disconnect()).await
        {
            Ok(Ok(())) => tracing::debug!("Disconnected {}", peripheral.id()),
            Ok(Err(e)) => tracing::debug!("Disconnect of {} failed: {}", peripheral.id(), e),
            Err(_) => tracing::warn!("Disconnect of {} timed out", peripheral.id()),
        }
    }

    /// Connect to a peer and check that it exposes every required service.
    pub async fn probe(&self, peripheral: Peripheral) -> Result<TrainerLink, SensorError> {
        let properties = peripheral
            .properties()
            .await
            .map_err(|e| SensorError::BleError(e.to_string()))?;
        let name = properties
            .as_ref()
            .and_then(|p| p.local_name.clone())
            .unwrap_or_else(|| "Unknown Trainer".to_string());
        let signal_strength = properties.and_then(|p| p.rssi);

        tracing::debug!("Probing {} ({})", name, peripheral.id());

        tokio::time::timeout(self.config.connection_timeout, peripheral.connect())
            .await
            .map_err(|_| SensorError::ConnectionTimeout)?
            .map_err(|e| SensorError::ConnectionFailed(e.to_string()))?;

        peripheral
            .discover_services()
            .await
            .map_err(|e| SensorError::ConnectionFailed(e.to_string()))?;

        let measurement = find_characteristic(
            &peripheral,
            CYCLING_POWER_SERVICE_UUID,
            CYCLING_POWER_MEASUREMENT_UUID,
        )?;
        let control_point =
            find_characteristic(&peripheral, FTMS_SERVICE_UUID, FTMS_CONTROL_POINT_UUID)?;
        let feature = find_characteristic(
            &peripheral,
            CYCLING_POWER_SERVICE_UUID,
            CYCLING_POWER_FEATURE_UUID,
        )
        .ok();

        Ok(TrainerLink {
            trainer: DiscoveredTrainer {
                device_id: peripheral.id().to_string(),
                name,
                signal_strength,
                found_at: Instant::now(),
            },
            peripheral,
            measurement,
            control_point,
            feature,
        })
    }

    /// Subscribe to the trainer's notifications and build its [`Device`].
    pub async fn connect_device(&self, link: TrainerLink) -> Result<Device, SensorError> {
        let TrainerLink {
            trainer,
            peripheral,
            measurement,
            control_point,
            feature,
        } = link;

        for characteristic in [&measurement, &control_point] {
            peripheral
                .subscribe(characteristic)
                .await
                .map_err(|e| SensorError::SubscriptionFailed(e.to_string()))?;
            tracing::debug!("Subscribed to characteristic: {}", characteristic.uuid);
        }

        let crank_data = match &feature {
            Some(feature) => match peripheral.read(feature).await {
                Ok(bytes) => supports_crank_revolutions(&bytes),
                Err(e) => {
                    tracing::warn!("Could not read power features: {}", e);
                    false
                }
            },
            None => false,
        };

        let control = Arc::new(ControlState::default());
        let live = |kind: CapabilityKind, control_point: Option<Characteristic>| {
            Capability::Live(LiveCharacteristic::new(
                kind,
                peripheral.clone(),
                measurement.clone(),
                control_point,
                control.clone(),
                self.config.write_ack_timeout,
                self.backpressure,
            ))
        };

        let mut device =
            Device::new().with_power(live(CapabilityKind::Power, Some(control_point.clone())));
        if crank_data {
            device = device.with_cadence(live(CapabilityKind::Cadence, None));
        } else {
            tracing::info!("{} reports no crank data, cadence unavailable", trainer.name);
        }

        tracing::info!("Connected to trainer: {}", trainer.name);
        Ok(device)
    }

    /// Discover and connect to a trainer, then try to take control of it.
    /// A trainer that refuses control is still returned for power readings.
    pub async fn connect_trainer(&self) -> Result<Device, SensorError> {
        let link = self.discover().await?;
        let device = self.connect_device(link).await?;
        device.try_take_control().await;
        Ok(device)
    }
}

/// Run `work` until `deadline`. On expiry `on_expiry` runs to completion
/// before the timeout is reported.
async fn within_deadline<T, W, E>(
    deadline: tokio::time::Instant,
    limit: Duration,
    work: W,
    on_expiry: E,
) -> Result<T, SensorError>
where
    W: Future<Output = Result<T, SensorError>>,
    E: Future<Output = ()>,
{
    match tokio::time::timeout_at(deadline, work).await {
        Ok(result) => result,
        Err(_) => {
            on_expiry.await;
            Err(SensorError::DiscoveryTimeout(limit))
        }
    }
}

fn find_characteristic(
    peripheral: &Peripheral,
    service: Uuid,
    characteristic: Uuid,
) -> Result<Characteristic, SensorError> {
    if !peripheral.services().iter().any(|s| s.uuid == service) {
        return Err(SensorError::ServiceMissing(service));
    }

    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.service_uuid == service && c.uuid == characteristic)
        .ok_or(SensorError::CharacteristicMissing(characteristic))
}
