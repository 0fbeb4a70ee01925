//! FTMS (Fitness Machine Service) and Cycling Power wire formats.
//!
//! The trainer is read through the Cycling Power Measurement characteristic
//! and commanded through the Fitness Machine Control Point. Every decoder here
//! returns an error on a short or malformed frame instead of panicking.

use crate::sensors::types::SensorError;
use uuid::Uuid;

/// FTMS Service UUID (0x1826)
pub const FTMS_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_1826_0000_1000_8000_0080_5f9b_34fb);

/// Fitness Machine Control Point UUID (0x2AD9)
pub const FTMS_CONTROL_POINT_UUID: Uuid =
    Uuid::from_u128(0x0000_2ad9_0000_1000_8000_0080_5f9b_34fb);

/// Cycling Power Service UUID (0x1818)
pub const CYCLING_POWER_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_1818_0000_1000_8000_0080_5f9b_34fb);

/// Cycling Power Measurement UUID (0x2A63)
pub const CYCLING_POWER_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x0000_2a63_0000_1000_8000_0080_5f9b_34fb);

/// Cycling Power Feature UUID (0x2A65)
pub const CYCLING_POWER_FEATURE_UUID: Uuid =
    Uuid::from_u128(0x0000_2a65_0000_1000_8000_0080_5f9b_34fb);

/// Byte offset of instantaneous power in a measurement frame (after the flags).
pub const POWER_FIELD_OFFSET: usize = 2;

/// FTMS Control Point opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FtmsControlOpcode {
    /// Request control of the fitness machine
    RequestControl = 0x00,
    /// Reset the fitness machine
    Reset = 0x01,
    /// Set target power
    SetTargetPower = 0x05,
    /// Start or resume training
    StartOrResume = 0x07,
    /// Stop or pause training
    StopOrPause = 0x08,
    /// Response to a previously written opcode
    ResponseCode = 0x80,
}

/// Result codes carried by a control point response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlResult {
    Success,
    OpCodeNotSupported,
    InvalidParameter,
    OperationFailed,
    ControlNotPermitted,
    Unknown(u8),
}

impl From<u8> for ControlResult {
    fn from(code: u8) -> Self {
        match code {
            0x01 => ControlResult::Success,
            0x02 => ControlResult::OpCodeNotSupported,
            0x03 => ControlResult::InvalidParameter,
            0x04 => ControlResult::OperationFailed,
            0x05 => ControlResult::ControlNotPermitted,
            other => ControlResult::Unknown(other),
        }
    }
}

/// Decoded control point indication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlResponse {
    /// Opcode the trainer is answering
    pub request_opcode: u8,
    /// Outcome reported by the trainer
    pub result: ControlResult,
}

fn require_len(data: &[u8], needed: usize) -> Result<(), SensorError> {
    if data.len() < needed {
        return Err(SensorError::FrameTooShort {
            needed,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Build a control point command to request control.
pub fn build_request_control() -> Vec<u8> {
    vec![FtmsControlOpcode::RequestControl as u8]
}

/// Build a control point command to start training.
pub fn build_start_training() -> Vec<u8> {
    vec![FtmsControlOpcode::StartOrResume as u8]
}

/// Encode a set-target-power frame: opcode followed by little-endian watts.
pub fn encode_target_power(target_watts: u16) -> [u8; 3] {
    let [lo, hi] = target_watts.to_le_bytes();
    [FtmsControlOpcode::SetTargetPower as u8, lo, hi]
}

/// Decode a set-target-power frame produced by [`encode_target_power`].
pub fn decode_target_power(frame: &[u8]) -> Result<u16, SensorError> {
    require_len(frame, 3)?;
    if frame[0] != FtmsControlOpcode::SetTargetPower as u8 {
        return Err(SensorError::MalformedFrame(format!(
            "expected opcode 0x05, got {:#04x}",
            frame[0]
        )));
    }
    Ok(u16::from_le_bytes([frame[1], frame[2]]))
}

/// Decode instantaneous power from a Cycling Power Measurement notification.
pub fn decode_power_measurement(data: &[u8]) -> Result<u16, SensorError> {
    require_len(data, POWER_FIELD_OFFSET + 2)?;
    Ok(u16::from_le_bytes([
        data[POWER_FIELD_OFFSET],
        data[POWER_FIELD_OFFSET + 1],
    ]))
}

/// Parse a control point indication (`0x80`, request opcode, result code).
pub fn parse_control_response(data: &[u8]) -> Result<ControlResponse, SensorError> {
    require_len(data, 3)?;
    if data[0] != FtmsControlOpcode::ResponseCode as u8 {
        return Err(SensorError::MalformedFrame(format!(
            "not a control point response: {:#04x}",
            data[0]
        )));
    }
    Ok(ControlResponse {
        request_opcode: data[1],
        result: ControlResult::from(data[2]),
    })
}

/// Whether a Cycling Power Feature value advertises crank revolution data (bit 3).
pub fn supports_crank_revolutions(feature: &[u8]) -> bool {
    if feature.is_empty() {
        return false;
    }
    let mut raw = [0u8; 4];
    let n = feature.len().min(4);
    raw[..n].copy_from_slice(&feature[..n]);
    (u32::from_le_bytes(raw) & 0x0000_0008) != 0
}

/// Parsed Cycling Power Measurement data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CyclingPowerData {
    /// Instantaneous power in watts
    pub power_watts: u16,
    /// Pedal power balance (if present)
    pub power_balance: Option<u8>,
    /// Accumulated torque (if present)
    pub torque: Option<u16>,
    /// Cumulative crank revolutions (if present)
    pub crank_revolutions: Option<u16>,
    /// Last crank event time in 1/1024 s (if present)
    pub last_crank_event_time: Option<u16>,
}

/// Parse a Cycling Power Measurement notification.
///
/// Optional fields that are flagged but truncated are left out rather than
/// failing the whole frame; only the mandatory power field is required.
pub fn parse_cycling_power_measurement(data: &[u8]) -> Result<CyclingPowerData, SensorError> {
    let power_watts = decode_power_measurement(data)?;
    let flags = u16::from_le_bytes([data[0], data[1]]);

    let mut result = CyclingPowerData {
        power_watts,
        ..Default::default()
    };

    let mut offset = 4usize;

    // Pedal Power Balance (bit 0)
    if (flags & 0x0001) != 0 {
        if offset + 1 > data.len() {
            return Ok(result);
        }
        result.power_balance = Some(data[offset]);
        offset += 1;
    }

    // Accumulated Torque (bit 2)
    if (flags & 0x0004) != 0 {
        if offset + 2 > data.len() {
            return Ok(result);
        }
        result.torque = Some(u16::from_le_bytes([data[offset], data[offset + 1]]));
        offset += 2;
    }

    // Wheel Revolution Data (bit 4): u32 revolutions + u16 event time
    if (flags & 0x0010) != 0 {
        offset += 6;
    }

    // Crank Revolution Data (bit 5)
    if (flags & 0x0020) != 0 {
        if offset + 4 > data.len() {
            return Ok(result);
        }
        result.crank_revolutions = Some(u16::from_le_bytes([data[offset], data[offset + 1]]));
        result.last_crank_event_time =
            Some(u16::from_le_bytes([data[offset + 2], data[offset + 3]]));
    }

    Ok(result)
}

/// Number of repeated crank events after which the rider is taken as stopped.
const STALE_CRANK_EVENTS: u8 = 3;

/// Derives cadence from successive crank revolution readings.
#[derive(Debug, Clone, Default)]
pub struct CrankCadence {
    last: Option<(u16, u16)>,
    stale: u8,
}

impl CrankCadence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one measurement; returns RPM when a new crank event arrived,
    /// or 0 once the crank has been idle for a few notifications.
    pub fn update(&mut self, revolutions: u16, event_time: u16) -> Option<u16> {
        let Some((prev_revs, prev_time)) = self.last.replace((revolutions, event_time)) else {
            return None;
        };

        let delta_revs = revolutions.wrapping_sub(prev_revs) as u32;
        let delta_time = event_time.wrapping_sub(prev_time) as u32;

        if delta_time == 0 {
            self.stale = self.stale.saturating_add(1);
            return (self.stale >= STALE_CRANK_EVENTS).then_some(0);
        }

        self.stale = 0;
        let rpm = delta_revs * 60 * 1024 / delta_time;
        Some(rpm.min(u16::MAX as u32) as u16)
    }
}
