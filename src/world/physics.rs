//! Physics model for power-to-speed calculation
//!
//! Steady-state force balance: the rider's power at the wheel equals the power
//! lost to aerodynamic drag, rolling resistance and gravity. With no
//! acceleration term this is a cubic in speed:
//!
//! `½·CdA·ρ·v³ + m·g·(Crr·cos θ + sin θ)·v − P·η = 0`

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Physics constants
const GRAVITY: f64 = 9.81; // m/s²
const GAS_CONSTANT: f64 = 8.31432; // J/(mol·K)
const AIR_MOLAR_MASS: f64 = 0.0289644; // kg/mol
const SEA_LEVEL_PRESSURE: f64 = 101_325.0; // Pa
const KELVIN_OFFSET: f64 = 273.15;
const MS_TO_KMH: f64 = 3.6;

/// Below this magnitude a coefficient is treated as zero
const EPSILON: f64 = 1e-8;

/// Rider and environment parameters for the speed solver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedModel {
    /// Rider plus bike mass in kilograms
    pub mass_kg: f64,
    /// Drag coefficient times frontal area in m²
    pub cda: f64,
    /// Rolling resistance coefficient
    pub crr: f64,
    /// Fraction of pedal power reaching the wheel
    pub drivetrain_efficiency: f64,
    /// Air temperature in °C
    pub temperature_c: f64,
}

impl Default for SpeedModel {
    fn default() -> Self {
        Self {
            mass_kg: 82.0,
            cda: 0.27,
            crr: 0.00366,
            drivetrain_efficiency: 0.965,
            temperature_c: 20.0,
        }
    }
}

impl SpeedModel {
    /// Air density at sea-level pressure for the configured temperature
    pub fn air_density(&self) -> f64 {
        (AIR_MOLAR_MASS * SEA_LEVEL_PRESSURE)
            / (GAS_CONSTANT * (self.temperature_c + KELVIN_OFFSET))
    }

    /// Steady-state speed in km/h for `power_watts` on a road inclined by
    /// `slope_rad` (positive uphill).
    ///
    /// Non-finite or negative power is treated as zero. The result is never
    /// negative and never NaN.
    pub fn calculate_speed(&self, power_watts: f64, slope_rad: f64) -> f64 {
        let power = if power_watts.is_finite() {
            power_watts.max(0.0)
        } else {
            0.0
        };
        let slope = if slope_rad.is_finite() { slope_rad } else { 0.0 };

        let a = 0.5 * self.cda * self.air_density();
        let c = self.mass_kg * GRAVITY * (self.crr * slope.cos() + slope.sin());
        let d = -power * self.drivetrain_efficiency;

        let velocity = solve_cubic(a, 0.0, c, d)
            .into_iter()
            .filter(|root| *root >= 0.0)
            .fold(None, |best: Option<f64>, root| {
                Some(best.map_or(root, |b| b.min(root)))
            })
            .unwrap_or(0.0);

        velocity * MS_TO_KMH
    }
}

/// Real roots of `a·x³ + b·x² + c·x + d = 0`.
///
/// Uses the depressed cubic `t³ + p·t + q = 0` with `x = t − b/(3a)`. Every
/// returned root is finite; a degenerate leading coefficient falls back to the
/// quadratic or linear equation.
pub fn solve_cubic(a: f64, b: f64, c: f64, d: f64) -> Vec<f64> {
    if a.abs() < EPSILON {
        return solve_quadratic(b, c, d);
    }

    let p = (3.0 * a * c - b * b) / (3.0 * a * a);
    let q = (2.0 * b * b * b - 9.0 * a * b * c + 27.0 * a * a * d) / (27.0 * a * a * a);

    let depressed = if p.abs() < EPSILON {
        // t³ = −q
        vec![(-q).cbrt()]
    } else if q.abs() < EPSILON {
        // t·(t² + p) = 0
        if p < 0.0 {
            vec![0.0, (-p).sqrt(), -(-p).sqrt()]
        } else {
            vec![0.0]
        }
    } else {
        let discriminant = q * q / 4.0 + p * p * p / 27.0;

        if discriminant.abs() < EPSILON {
            // Simple root and a double root
            vec![3.0 * q / p, -1.5 * q / p]
        } else if discriminant > 0.0 {
            let sqrt_d = discriminant.sqrt();
            vec![(-q / 2.0 + sqrt_d).cbrt() + (-q / 2.0 - sqrt_d).cbrt()]
        } else {
            // Three distinct real roots, p < 0 here
            let m = 2.0 * (-p / 3.0).sqrt();
            let arg = (3.0 * q / (p * m)).clamp(-1.0, 1.0);
            let theta = arg.acos() / 3.0;
            (0..3)
                .map(|k| m * (theta - 2.0 * PI * k as f64 / 3.0).cos())
                .collect()
        }
    };

    let shift = b / (3.0 * a);
    depressed
        .into_iter()
        .map(|t| t - shift)
        .filter(|x| x.is_finite())
        .collect()
}

fn solve_quadratic(a: f64, b: f64, c: f64) -> Vec<f64> {
    if a.abs() < EPSILON {
        if b.abs() < EPSILON {
            return Vec::new();
        }
        return vec![-c / b];
    }

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        Vec::new()
    } else {
        let sqrt_d = discriminant.sqrt();
        vec![(-b + sqrt_d) / (2.0 * a), (-b - sqrt_d) / (2.0 * a)]
    }
}
