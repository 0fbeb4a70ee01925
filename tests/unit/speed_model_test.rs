//! Unit tests for the power-to-speed model.

use ergride::world::{solve_cubic, SpeedModel};

#[test]
fn test_zero_power_is_standstill() {
    let model = SpeedModel::default();
    assert_eq!(model.calculate_speed(0.0, 0.0), 0.0);
}

#[test]
fn test_more_power_is_faster() {
    let model = SpeedModel::default();
    let easy = model.calculate_speed(150.0, 0.0);
    let hard = model.calculate_speed(300.0, 0.0);
    assert!(easy > 0.0);
    assert!(hard > easy);
}

#[test]
fn test_speed_is_always_a_number() {
    let model = SpeedModel::default();
    for watts in [0.0, 1.0, 50.0, 400.0, 2000.0, f64::INFINITY, f64::NAN] {
        for slope in [-0.2, -0.05, 0.0, 0.05, 0.2] {
            let speed = model.calculate_speed(watts, slope);
            assert!(speed.is_finite(), "{} W on {} rad gave {}", watts, slope, speed);
            assert!(speed >= 0.0);
        }
    }
}

#[test]
fn test_heavier_rider_climbs_slower() {
    let light = SpeedModel {
        mass_kg: 65.0,
        ..SpeedModel::default()
    };
    let heavy = SpeedModel {
        mass_kg: 100.0,
        ..SpeedModel::default()
    };
    assert!(light.calculate_speed(250.0, 0.06) > heavy.calculate_speed(250.0, 0.06));
}

#[test]
fn test_cold_air_is_denser() {
    let cold = SpeedModel {
        temperature_c: 0.0,
        ..SpeedModel::default()
    };
    assert!(cold.air_density() > SpeedModel::default().air_density());
    assert!(cold.calculate_speed(200.0, 0.0) < SpeedModel::default().calculate_speed(200.0, 0.0));
}

#[test]
fn test_cubic_roots_are_finite() {
    let cases = [
        (1.0, -6.0, 11.0, -6.0),
        (1.0, 0.0, -4.0, 0.0),
        (1.0, 0.0, -3.0, 2.0),
        (1.0, 0.0, 0.0, 0.0),
        (0.0, 1.0, -2.0, 1.0),
        (0.0, 0.0, 0.0, 0.0),
        (1e-12, 0.0, 5.0, -10.0),
    ];
    for (a, b, c, d) in cases {
        for root in solve_cubic(a, b, c, d) {
            assert!(root.is_finite(), "non-finite root for {:?}", (a, b, c, d));
        }
    }
}

#[test]
fn test_cubic_triple_root() {
    // x³ has the single root 0
    assert_eq!(solve_cubic(1.0, 0.0, 0.0, 0.0), vec![0.0]);
}
