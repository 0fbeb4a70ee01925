//! Device capabilities: one readable/writable signal on a trainer.
//!
//! A capability is either backed by a live BLE characteristic, by a
//! deterministic mock, or by a mock that always fails. The variant is chosen
//! when the device is built; callers only see [`Capability`].

use crate::sensors::ftms::{
    build_request_control, build_start_training, decode_power_measurement, encode_target_power,
    parse_control_response, parse_cycling_power_measurement, ControlResponse, ControlResult,
    CrankCadence, FtmsControlOpcode,
};
use crate::sensors::types::{CapabilityKind, SensorError};
use crate::telemetry::fanout::{Backpressure, Fanout, SampleStream};
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use futures::stream::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// A single signal slot of a [`crate::sensors::Device`].
#[derive(Debug, Clone)]
pub enum Capability {
    Live(LiveCharacteristic),
    Mock(MockCharacteristic),
    Failing(FailingCharacteristic),
}

impl Capability {
    /// Deterministic mock emitting `pattern` every `interval`.
    pub fn mock(kind: CapabilityKind, pattern: MockPattern, interval: Duration) -> Self {
        Capability::Mock(MockCharacteristic::new(kind, pattern, interval))
    }

    /// Mock that refuses listeners and fails every read and write.
    pub fn failing(kind: CapabilityKind) -> Self {
        Capability::Failing(FailingCharacteristic { kind })
    }

    pub fn kind(&self) -> CapabilityKind {
        match self {
            Capability::Live(c) => c.kind,
            Capability::Mock(c) => c.kind,
            Capability::Failing(c) => c.kind,
        }
    }

    /// Send a target value; returns the value the device acknowledged.
    pub async fn write(&self, target: u16) -> Result<u16, SensorError> {
        match self {
            Capability::Live(c) => c.write(target).await,
            Capability::Mock(c) => c.write(target),
            Capability::Failing(c) => Err(SensorError::WriteFailed(format!(
                "{} does not accept writes",
                c.kind
            ))),
        }
    }

    /// Start pushing every incoming sample to all listeners.
    pub async fn continuous_read(&self) -> Result<(), SensorError> {
        match self {
            Capability::Live(c) => c.continuous_read().await,
            Capability::Mock(c) => {
                c.continuous_read();
                Ok(())
            }
            Capability::Failing(c) => Err(SensorError::ReadFailed(format!(
                "could not read {}",
                c.kind
            ))),
        }
    }

    /// Register a listener. `None` when the capability cannot deliver samples.
    pub fn add_listener(&self) -> Option<SampleStream> {
        match self {
            Capability::Live(c) => c.fanout.subscribe(),
            Capability::Mock(c) => c.fanout.subscribe(),
            Capability::Failing(_) => None,
        }
    }

    /// One-time permission handshake needed before writes are accepted.
    pub async fn request_control(&self) -> Result<(), SensorError> {
        match self {
            Capability::Live(c) => c.request_control().await,
            Capability::Mock(c) => {
                tracing::info!("Mock {} granted control", c.kind);
                Ok(())
            }
            Capability::Failing(c) => Err(SensorError::WriteFailed(format!(
                "{} refused control request",
                c.kind
            ))),
        }
    }

    /// Stop delivering samples and end every listener's stream.
    pub fn close(&self) {
        match self {
            Capability::Live(c) => c.fanout.close(),
            Capability::Mock(c) => c.fanout.close(),
            Capability::Failing(_) => {}
        }
    }
}

/// Values a mock capability emits.
#[derive(Debug, Clone, PartialEq)]
pub enum MockPattern {
    /// The same value forever
    Constant(u16),
    /// The given values in order, starting over at the end
    Cycle(Vec<u16>),
}

impl MockPattern {
    fn value_at(&self, tick: usize) -> u16 {
        match self {
            MockPattern::Constant(v) => *v,
            MockPattern::Cycle(values) if values.is_empty() => 0,
            MockPattern::Cycle(values) => values[tick % values.len()],
        }
    }
}

/// Deterministic capability used without hardware.
#[derive(Debug, Clone)]
pub struct MockCharacteristic {
    kind: CapabilityKind,
    pattern: MockPattern,
    interval: Duration,
    fanout: Arc<Fanout>,
    reading: Arc<AtomicBool>,
    writes: Arc<Mutex<Vec<u16>>>,
}

impl MockCharacteristic {
    pub fn new(kind: CapabilityKind, pattern: MockPattern, interval: Duration) -> Self {
        Self::with_backpressure(kind, pattern, interval, Backpressure::default())
    }

    pub fn with_backpressure(
        kind: CapabilityKind,
        pattern: MockPattern,
        interval: Duration,
        backpressure: Backpressure,
    ) -> Self {
        Self {
            kind,
            pattern,
            interval,
            fanout: Arc::new(Fanout::new(backpressure)),
            reading: Arc::new(AtomicBool::new(false)),
            writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every target written so far, oldest first.
    pub fn writes(&self) -> Vec<u16> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write(&self, target: u16) -> Result<u16, SensorError> {
        tracing::info!("Mock trainer set to {}W", target);
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target);
        Ok(target)
    }

    fn continuous_read(&self) {
        if self.reading.swap(true, Ordering::SeqCst) {
            return;
        }

        let fanout = self.fanout.clone();
        let pattern = self.pattern.clone();
        let interval = self.interval;
        let kind = self.kind;

        tokio::spawn(async move {
            let mut tick = 0usize;
            while !fanout.is_closed() {
                let value = pattern.value_at(tick);
                fanout.publish(value).await;
                tracing::trace!("Mock {} emitted {}", kind, value);
                tick = tick.wrapping_add(1);
                tokio::time::sleep(interval).await;
            }
            tracing::debug!("Mock {} stopped", kind);
        });
    }
}

/// Capability that is present on the device but never works.
#[derive(Debug, Clone)]
pub struct FailingCharacteristic {
    kind: CapabilityKind,
}

/// Control permission shared by every live capability of one trainer.
#[derive(Debug, Default)]
pub struct ControlState {
    granted: AtomicBool,
}

impl ControlState {
    pub fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }
}

/// Capability backed by the trainer's Cycling Power Measurement notifications
/// and, for power, its FTMS control point.
#[derive(Debug, Clone)]
pub struct LiveCharacteristic {
    kind: CapabilityKind,
    peripheral: Peripheral,
    measurement: Characteristic,
    control_point: Option<Characteristic>,
    control: Arc<ControlState>,
    ack_timeout: Duration,
    fanout: Arc<Fanout>,
    reading: Arc<AtomicBool>,
}

impl LiveCharacteristic {
    pub fn new(
        kind: CapabilityKind,
        peripheral: Peripheral,
        measurement: Characteristic,
        control_point: Option<Characteristic>,
        control: Arc<ControlState>,
        ack_timeout: Duration,
        backpressure: Backpressure,
    ) -> Self {
        Self {
            kind,
            peripheral,
            measurement,
            control_point,
            control,
            ack_timeout,
            fanout: Arc::new(Fanout::new(backpressure)),
            reading: Arc::new(AtomicBool::new(false)),
        }
    }

    fn control_point(&self) -> Result<&Characteristic, SensorError> {
        self.control_point
            .as_ref()
            .ok_or_else(|| SensorError::WriteFailed(format!("{} is read-only", self.kind)))
    }

    async fn request_control(&self) -> Result<(), SensorError> {
        let control_point = self.control_point()?;

        let response = self
            .write_with_ack(
                control_point,
                &build_request_control(),
                FtmsControlOpcode::RequestControl,
            )
            .await?;

        match response.map(|r| r.result) {
            Some(ControlResult::Success) | None => {
                self.control.granted.store(true, Ordering::SeqCst);
                tracing::info!("Trainer control granted");

                // Some trainers ignore targets until training is started
                if let Err(e) = self
                    .write_with_ack(
                        control_point,
                        &build_start_training(),
                        FtmsControlOpcode::StartOrResume,
                    )
                    .await
                {
                    tracing::debug!("Start training not accepted: {}", e);
                }
                Ok(())
            }
            Some(result) => Err(SensorError::WriteFailed(format!(
                "control request rejected: {:?}",
                result
            ))),
        }
    }

    async fn write(&self, target: u16) -> Result<u16, SensorError> {
        let control_point = self.control_point()?;
        if !self.control.is_granted() {
            return Err(SensorError::ControlNotGranted);
        }

        let response = self
            .write_with_ack(
                control_point,
                &encode_target_power(target),
                FtmsControlOpcode::SetTargetPower,
            )
            .await?;

        match response.map(|r| r.result) {
            Some(ControlResult::Success) => Ok(target),
            None => {
                tracing::debug!("No acknowledgement for {}W, assuming accepted", target);
                Ok(target)
            }
            Some(result) => Err(SensorError::WriteFailed(format!(
                "target {}W rejected: {:?}",
                target, result
            ))),
        }
    }

    /// Write a control point frame and wait for the matching indication.
    /// `Ok(None)` when the trainer does not answer within the ack window.
    async fn write_with_ack(
        &self,
        control_point: &Characteristic,
        frame: &[u8],
        opcode: FtmsControlOpcode,
    ) -> Result<Option<ControlResponse>, SensorError> {
        // Listen before writing so a fast indication is not missed
        let mut notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(|e| SensorError::WriteFailed(e.to_string()))?;

        self.peripheral
            .write(control_point, frame, WriteType::WithResponse)
            .await
            .map_err(|e| SensorError::WriteFailed(e.to_string()))?;

        let control_uuid = control_point.uuid;
        let wait_for_ack = async {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != control_uuid {
                    continue;
                }
                match parse_control_response(&notification.value) {
                    Ok(response) if response.request_opcode == opcode as u8 => {
                        return Some(response)
                    }
                    Ok(_) => continue,
                    Err(e) => tracing::debug!("Ignoring control point frame: {}", e),
                }
            }
            None
        };

        Ok(tokio::time::timeout(self.ack_timeout, wait_for_ack)
            .await
            .ok()
            .flatten())
    }

    async fn continuous_read(&self) -> Result<(), SensorError> {
        if self.reading.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut notifications = match self.peripheral.notifications().await {
            Ok(stream) => stream,
            Err(e) => {
                self.reading.store(false, Ordering::SeqCst);
                return Err(SensorError::ReadFailed(e.to_string()));
            }
        };

        let kind = self.kind;
        let measurement_uuid = self.measurement.uuid;
        let fanout = self.fanout.clone();

        tokio::spawn(async move {
            let mut cadence = CrankCadence::new();

            while let Some(notification) = notifications.next().await {
                if notification.uuid != measurement_uuid {
                    continue;
                }

                let value = match kind {
                    CapabilityKind::Power => decode_power_measurement(&notification.value).ok(),
                    CapabilityKind::Cadence => parse_cycling_power_measurement(&notification.value)
                        .ok()
                        .and_then(|data| {
                            cadence.update(data.crank_revolutions?, data.last_crank_event_time?)
                        }),
                    CapabilityKind::Speed => None,
                };

                match value {
                    Some(value) => {
                        fanout.publish(value).await;
                    }
                    None => tracing::trace!("No {} in notification", kind),
                }

                if fanout.is_closed() {
                    break;
                }
            }

            // Peripheral gone or capability closed
            tracing::info!("{} notifications ended", kind);
            fanout.close();
        });

        Ok(())
    }

    /// Disconnect the underlying peripheral.
    pub async fn disconnect(&self) -> Result<(), SensorError> {
        self.fanout.close();
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| SensorError::BleError(e.to_string()))
    }
}
