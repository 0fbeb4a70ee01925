//! Sensor types and errors for the trainer link.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

/// A signal a trainer may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    /// Instantaneous power in watts
    Power,
    /// Wheel or flywheel speed
    Speed,
    /// Crank cadence in RPM
    Cadence,
}

impl CapabilityKind {
    /// Every capability slot a device has.
    pub const ALL: [CapabilityKind; 3] = [
        CapabilityKind::Power,
        CapabilityKind::Speed,
        CapabilityKind::Cadence,
    ];
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityKind::Power => write!(f, "Power"),
            CapabilityKind::Speed => write!(f, "Speed"),
            CapabilityKind::Cadence => write!(f, "Cadence"),
        }
    }
}

/// A trainer that passed service discovery.
#[derive(Debug, Clone)]
pub struct DiscoveredTrainer {
    /// BLE device address/identifier
    pub device_id: String,
    /// User-friendly name (from BLE advertisement)
    pub name: String,
    /// Signal strength (RSSI)
    pub signal_strength: Option<i16>,
    /// When the trainer was accepted
    pub found_at: Instant,
}

/// Configuration for trainer discovery and control.
#[derive(Debug, Clone)]
pub struct SensorConfig {
    /// Hard deadline for finding a usable trainer
    pub discovery_timeout: Duration,
    /// Timeout for connecting to a single candidate
    pub connection_timeout: Duration,
    /// How long a write waits for the control point indication
    pub write_ack_timeout: Duration,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_secs(10),
            connection_timeout: Duration::from_secs(5),
            write_ack_timeout: Duration::from_secs(1),
        }
    }
}

/// Errors that can occur on the trainer link.
#[derive(Debug, Clone, Error)]
pub enum SensorError {
    /// BLE adapter not found or unavailable
    #[error("Bluetooth adapter not found")]
    AdapterNotFound,

    /// Failed to start or stop BLE scanning
    #[error("Failed to scan: {0}")]
    ScanFailed(String),

    /// No trainer with the required services showed up before the deadline
    #[error("No supported trainer found within {0:?}")]
    DiscoveryTimeout(Duration),

    /// Candidate peer lacks a required service
    #[error("Service missing: {0}")]
    ServiceMissing(Uuid),

    /// Candidate peer lacks a required characteristic
    #[error("Characteristic missing: {0}")]
    CharacteristicMissing(Uuid),

    /// Connection to a peer failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection attempt timed out
    #[error("Connection timed out")]
    ConnectionTimeout,

    /// Failed to subscribe to notifications
    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    /// Failed to start reading a capability
    #[error("Read failed: {0}")]
    ReadFailed(String),

    /// Failed to write to the control point, or the trainer rejected it
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// A write was attempted before the request-control handshake
    #[error("Trainer control not granted")]
    ControlNotGranted,

    /// Frame shorter than the field being decoded
    #[error("Frame too short: needed {needed} bytes, got {actual}")]
    FrameTooShort { needed: usize, actual: usize },

    /// Frame does not have the expected layout
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Generic BLE error
    #[error("BLE error: {0}")]
    BleError(String),
}

impl SensorError {
    /// Whether discovery should skip the candidate and keep scanning.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SensorError::ServiceMissing(_)
                | SensorError::CharacteristicMissing(_)
                | SensorError::ConnectionFailed(_)
                | SensorError::ConnectionTimeout
                | SensorError::SubscriptionFailed(_)
                | SensorError::BleError(_)
        )
    }
}
