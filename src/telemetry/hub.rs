//! Joins samples from a device's capabilities into one reading per tick.

use crate::sensors::device::Device;
use crate::sensors::types::CapabilityKind;
use crate::telemetry::fanout::SampleStream;
use std::time::{Duration, Instant};

/// One joined reading. Capabilities that were not requested or are not
/// available are `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    pub power_watts: Option<u16>,
    pub cadence_rpm: Option<u16>,
    pub speed: Option<u16>,
    pub received_at: Instant,
}

impl TelemetrySample {
    /// Value for a capability, if it took part in the join.
    pub fn get(&self, kind: CapabilityKind) -> Option<u16> {
        match kind {
            CapabilityKind::Power => self.power_watts,
            CapabilityKind::Speed => self.speed,
            CapabilityKind::Cadence => self.cadence_rpm,
        }
    }
}

/// How long a joined capability may stay silent before the join stops
/// waiting for it.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(5);

enum Slot {
    Skipped,
    Value(u16),
    Closed,
    Stalled,
}

async fn next_slot(stream: Option<&mut SampleStream>, stall_timeout: Duration) -> Slot {
    match stream {
        None => Slot::Skipped,
        Some(stream) => match tokio::time::timeout(stall_timeout, stream.recv()).await {
            Ok(Some(value)) => Slot::Value(value),
            Ok(None) => Slot::Closed,
            Err(_) => Slot::Stalled,
        },
    }
}

/// Listens on every available capability of a device.
pub struct TelemetryHub {
    device: Device,
    power: Option<SampleStream>,
    speed: Option<SampleStream>,
    cadence: Option<SampleStream>,
    stall_timeout: Duration,
}

impl TelemetryHub {
    /// Register one listener per capability. Absent capabilities and ones
    /// that refuse a listener are marked unavailable.
    pub fn attach(device: &Device) -> Self {
        let listen = |kind: CapabilityKind| {
            let stream = device.capability(kind).and_then(|c| c.add_listener());
            if stream.is_none() {
                tracing::info!("{} unavailable on device, excluded from joins", kind);
            }
            stream
        };

        Self {
            power: listen(CapabilityKind::Power),
            speed: listen(CapabilityKind::Speed),
            cadence: listen(CapabilityKind::Cadence),
            device: device.clone(),
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }

    /// Change how long a join waits on a silent capability.
    pub fn with_stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }

    /// Whether a capability still delivers samples.
    pub fn available(&self, kind: CapabilityKind) -> bool {
        match kind {
            CapabilityKind::Power => self.power.is_some(),
            CapabilityKind::Speed => self.speed.is_some(),
            CapabilityKind::Cadence => self.cadence.is_some(),
        }
    }

    /// All capabilities that still deliver samples.
    pub fn available_kinds(&self) -> Vec<CapabilityKind> {
        CapabilityKind::ALL
            .into_iter()
            .filter(|kind| self.available(*kind))
            .collect()
    }

    /// Extra consumer on one capability of the attached device.
    pub fn subscribe(&self, kind: CapabilityKind) -> Option<SampleStream> {
        self.device.capability(kind).and_then(|c| c.add_listener())
    }

    /// Wait for the next sample of every requested, available capability.
    ///
    /// Unavailable capabilities are skipped so the join never waits on a
    /// signal the device does not provide. A capability whose stream ends
    /// becomes unavailable, and so does one that stays silent past the stall
    /// timeout while another capability delivered. If every requested
    /// capability is silent the join keeps waiting. Returns `None` when
    /// nothing requested is left.
    pub async fn join(&mut self, kinds: &[CapabilityKind]) -> Option<TelemetrySample> {
        let wanted = |kind: CapabilityKind| kinds.contains(&kind);
        let stall_timeout = self.stall_timeout;

        loop {
            if !kinds.iter().any(|kind| self.available(*kind)) {
                return None;
            }

            let (power, speed, cadence) = tokio::join!(
                next_slot(
                    self.power.as_mut().filter(|_| wanted(CapabilityKind::Power)),
                    stall_timeout
                ),
                next_slot(
                    self.speed.as_mut().filter(|_| wanted(CapabilityKind::Speed)),
                    stall_timeout
                ),
                next_slot(
                    self.cadence.as_mut().filter(|_| wanted(CapabilityKind::Cadence)),
                    stall_timeout
                ),
            );

            let received_at = Instant::now();
            let delivered = [&power, &speed, &cadence]
                .iter()
                .any(|slot| matches!(slot, Slot::Value(_)));

            let resolve = |slot: Slot, stream: &mut Option<SampleStream>, kind: CapabilityKind| {
                match slot {
                    Slot::Value(v) => Some(v),
                    Slot::Closed => {
                        tracing::warn!("{} stream ended, marking unavailable", kind);
                        *stream = None;
                        None
                    }
                    Slot::Stalled if delivered => {
                        tracing::warn!(
                            "{} silent for {:?}, marking unavailable",
                            kind,
                            stall_timeout
                        );
                        *stream = None;
                        None
                    }
                    Slot::Stalled | Slot::Skipped => None,
                }
            };

            let sample = TelemetrySample {
                power_watts: resolve(power, &mut self.power, CapabilityKind::Power),
                speed: resolve(speed, &mut self.speed, CapabilityKind::Speed),
                cadence_rpm: resolve(cadence, &mut self.cadence, CapabilityKind::Cadence),
                received_at,
            };

            if delivered {
                return Some(sample);
            }
            tracing::debug!("No capability delivered within {:?}", stall_timeout);
        }
    }
}
