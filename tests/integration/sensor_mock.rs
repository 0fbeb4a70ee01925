//! Integration tests for mock trainers and telemetry joins.
//!
//! Exercises the device, capability and hub layers together without BLE
//! hardware.

use ergride::sensors::capability::MockCharacteristic;
use ergride::sensors::{Capability, CapabilityKind, Device, MockPattern, SensorError};
use ergride::telemetry::{Backpressure, TelemetryHub};
use std::time::Duration;

const JOIN_DEADLINE: Duration = Duration::from_secs(1);

fn power_only(watts: u16) -> Device {
    Device::new().with_power(Capability::mock(
        CapabilityKind::Power,
        MockPattern::Constant(watts),
        Duration::from_millis(10),
    ))
}

fn constant_power_with(backpressure: Backpressure) -> Device {
    Device::new().with_power(Capability::Mock(MockCharacteristic::with_backpressure(
        CapabilityKind::Power,
        MockPattern::Constant(180),
        Duration::from_millis(5),
        backpressure,
    )))
}

#[tokio::test]
async fn test_join_without_cadence_completes() {
    let device = power_only(200);
    let mut hub = TelemetryHub::attach(&device);
    device.listen().await;

    let sample = tokio::time::timeout(
        JOIN_DEADLINE,
        hub.join(&[CapabilityKind::Power, CapabilityKind::Cadence]),
    )
    .await
    .expect("join waited on a missing cadence signal")
    .expect("power should be available");

    assert_eq!(sample.power_watts, Some(200));
    assert_eq!(sample.cadence_rpm, None);
    assert_eq!(hub.available_kinds(), vec![CapabilityKind::Power]);
}

#[tokio::test]
async fn test_failing_cadence_is_excluded() {
    let device = Device::mock();
    let mut hub = TelemetryHub::attach(&device);
    device.listen().await;

    assert!(hub.available(CapabilityKind::Power));
    assert!(!hub.available(CapabilityKind::Cadence));

    let sample = tokio::time::timeout(
        JOIN_DEADLINE,
        hub.join(&[CapabilityKind::Power, CapabilityKind::Cadence]),
    )
    .await
    .unwrap()
    .unwrap();

    // First value of the mock power cycle
    assert_eq!(sample.power_watts, Some(150));
    assert_eq!(sample.cadence_rpm, None);

    device.disconnect().await;
}

#[tokio::test]
async fn test_join_power_and_cadence() {
    let device = power_only(240).with_cadence(Capability::mock(
        CapabilityKind::Cadence,
        MockPattern::Cycle(vec![88, 90, 92]),
        Duration::from_millis(10),
    ));
    let mut hub = TelemetryHub::attach(&device);
    device.listen().await;

    let sample = tokio::time::timeout(
        JOIN_DEADLINE,
        hub.join(&[CapabilityKind::Power, CapabilityKind::Cadence]),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(sample.power_watts, Some(240));
    assert_eq!(sample.cadence_rpm, Some(88));
    assert_eq!(sample.get(CapabilityKind::Cadence), Some(88));
    assert_eq!(sample.speed, None);
}

#[tokio::test]
async fn test_block_policy_stalls_other_subscribers() {
    let device = constant_power_with(Backpressure::Block { capacity: 1 });
    // The hub registers first and is never drained
    let _hub = TelemetryHub::attach(&device);
    let mut second = device
        .capability(CapabilityKind::Power)
        .and_then(|c| c.add_listener())
        .unwrap();
    device.listen().await;

    assert_eq!(
        tokio::time::timeout(JOIN_DEADLINE, second.recv()).await.unwrap(),
        Some(180)
    );
    let stalled = tokio::time::timeout(Duration::from_millis(100), second.recv()).await;
    assert!(stalled.is_err(), "slow hub should hold back delivery");

    device.disconnect().await;
}

#[tokio::test]
async fn test_drop_oldest_policy_keeps_others_flowing() {
    let device = constant_power_with(Backpressure::DropOldest { capacity: 1 });
    let hub = TelemetryHub::attach(&device);
    let mut second = hub.subscribe(CapabilityKind::Power).unwrap();
    device.listen().await;

    for _ in 0..5 {
        let value = tokio::time::timeout(JOIN_DEADLINE, second.recv())
            .await
            .expect("delivery stalled behind the idle hub");
        assert_eq!(value, Some(180));
    }

    device.disconnect().await;
}

#[tokio::test]
async fn test_mock_records_writes() {
    let device = Device::mock();
    device.request_control().await.unwrap();

    for watts in [100, 150, 150, 0] {
        assert_eq!(device.set_target_power(watts).await.unwrap(), watts);
    }

    let Some(Capability::Mock(power)) = device.capability(CapabilityKind::Power) else {
        panic!("mock device should have a mock power capability");
    };
    assert_eq!(power.writes(), vec![100, 150, 150, 0]);
}

#[tokio::test]
async fn test_failing_capability() {
    let failing = Capability::failing(CapabilityKind::Cadence);

    assert_eq!(failing.kind(), CapabilityKind::Cadence);
    assert!(failing.add_listener().is_none());
    assert!(matches!(
        failing.continuous_read().await,
        Err(SensorError::ReadFailed(_))
    ));
    assert!(matches!(
        failing.write(90).await,
        Err(SensorError::WriteFailed(_))
    ));
    assert!(failing.request_control().await.is_err());
}

#[tokio::test]
async fn test_no_listeners_after_disconnect() {
    let device = power_only(200);
    device.listen().await;
    device.disconnect().await;

    let power = device.capability(CapabilityKind::Power).unwrap();
    assert!(power.add_listener().is_none());

    let mut hub = TelemetryHub::attach(&device);
    assert!(hub.join(&[CapabilityKind::Power]).await.is_none());
}

fn power_with_silent_cadence() -> Device {
    power_only(220).with_cadence(Capability::mock(
        CapabilityKind::Cadence,
        MockPattern::Constant(90),
        Duration::from_millis(10),
    ))
}

#[tokio::test]
async fn test_join_drops_silent_cadence() {
    let device = power_with_silent_cadence();
    let mut hub =
        TelemetryHub::attach(&device).with_stall_timeout(Duration::from_millis(100));
    // Only power streams; cadence stays open and never publishes
    device
        .capability(CapabilityKind::Power)
        .unwrap()
        .continuous_read()
        .await
        .unwrap();

    assert!(hub.available(CapabilityKind::Cadence));

    let sample = tokio::time::timeout(
        JOIN_DEADLINE,
        hub.join(&[CapabilityKind::Power, CapabilityKind::Cadence]),
    )
    .await
    .expect("join blocked on a silent cadence signal")
    .expect("power should be available");

    assert_eq!(sample.power_watts, Some(220));
    assert_eq!(sample.cadence_rpm, None);
    assert!(!hub.available(CapabilityKind::Cadence));

    // Later joins no longer wait for the stall timeout
    let started = std::time::Instant::now();
    let next = hub
        .join(&[CapabilityKind::Power, CapabilityKind::Cadence])
        .await
        .unwrap();
    assert_eq!(next.power_watts, Some(220));
    assert!(started.elapsed() < Duration::from_millis(100));

    device.disconnect().await;
}

#[tokio::test]
async fn test_join_waits_while_everything_is_silent() {
    let device = power_with_silent_cadence();
    let mut hub =
        TelemetryHub::attach(&device).with_stall_timeout(Duration::from_millis(20));

    let waited = tokio::time::timeout(
        Duration::from_millis(150),
        hub.join(&[CapabilityKind::Power, CapabilityKind::Cadence]),
    )
    .await;

    assert!(waited.is_err(), "join should keep waiting for a first sample");
    assert!(hub.available(CapabilityKind::Power));
    assert!(hub.available(CapabilityKind::Cadence));
}
