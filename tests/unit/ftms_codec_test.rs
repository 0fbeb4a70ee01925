//! Unit tests for the trainer wire codec.

use ergride::sensors::ftms::{
    build_request_control, decode_power_measurement, decode_target_power, encode_target_power,
    parse_control_response, parse_cycling_power_measurement, ControlResult, FtmsControlOpcode,
    POWER_FIELD_OFFSET,
};
use ergride::sensors::SensorError;

#[test]
fn test_target_power_round_trip_full_range() {
    for watts in 0..=u16::MAX {
        let frame = encode_target_power(watts);
        assert_eq!(decode_target_power(&frame).unwrap(), watts);
    }
}

#[test]
fn test_target_power_frame_layout() {
    // 250 W = 0x00FA, little-endian after the opcode
    assert_eq!(encode_target_power(250), [0x05, 0xFA, 0x00]);
    assert_eq!(encode_target_power(0x1234), [0x05, 0x34, 0x12]);
}

#[test]
fn test_decode_rejects_wrong_opcode() {
    let result = decode_target_power(&[0x07, 0xFA, 0x00]);
    assert!(matches!(result, Err(SensorError::MalformedFrame(_))));
}

#[test]
fn test_decode_rejects_short_frame() {
    let result = decode_target_power(&[0x05, 0xFA]);
    assert!(matches!(
        result,
        Err(SensorError::FrameTooShort {
            needed: 3,
            actual: 2
        })
    ));
}

#[test]
fn test_request_control_frame() {
    assert_eq!(
        build_request_control(),
        vec![FtmsControlOpcode::RequestControl as u8]
    );
}

#[test]
fn test_power_measurement_offset() {
    let mut notification = vec![0u8; POWER_FIELD_OFFSET];
    notification.extend_from_slice(&320u16.to_le_bytes());
    assert_eq!(decode_power_measurement(&notification).unwrap(), 320);
}

#[test]
fn test_power_measurement_ignores_trailing_fields() {
    // Flags announce crank data; decode only looks at the power field
    let data = [0x20, 0x00, 0xC8, 0x00, 0x10, 0x00, 0x00, 0x04];
    assert_eq!(decode_power_measurement(&data).unwrap(), 200);

    let parsed = parse_cycling_power_measurement(&data).unwrap();
    assert_eq!(parsed.power_watts, 200);
    assert_eq!(parsed.crank_revolutions, Some(16));
    assert_eq!(parsed.last_crank_event_time, Some(1024));
}

#[test]
fn test_power_measurement_too_short() {
    assert!(decode_power_measurement(&[0x00, 0x00, 0xC8]).is_err());
}

#[test]
fn test_control_response_results() {
    let granted = parse_control_response(&[0x80, 0x00, 0x01]).unwrap();
    assert_eq!(granted.request_opcode, FtmsControlOpcode::RequestControl as u8);
    assert_eq!(granted.result, ControlResult::Success);

    let refused = parse_control_response(&[0x80, 0x05, 0x05]).unwrap();
    assert_eq!(refused.result, ControlResult::ControlNotPermitted);

    assert!(parse_control_response(&[0x05, 0x00, 0x01]).is_err());
}
