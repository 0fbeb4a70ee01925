//! Application configuration.
//!
//! Stored as TOML in the platform data directory. Every section and field has
//! a default, so a partial or missing file still loads.

use crate::sensors::SensorConfig;
use crate::simulation::{SamplingMode, SimulationConfig};
use crate::telemetry::Backpressure;
use crate::world::{SlopeMode, SpeedModel};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application version
    pub version: String,
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Trainer link settings
    pub trainer: TrainerSettings,
    /// Rider and environment constants for the speed model
    pub rider: SpeedModel,
    /// Ride loop settings
    pub simulation: SimulationSettings,
    /// What to ride
    pub session: SessionSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::new(),
            trainer: TrainerSettings::default(),
            rider: SpeedModel::default(),
            simulation: SimulationSettings::default(),
            session: SessionSettings::default(),
        }
    }
}

impl AppConfig {
    /// Settings for the ride loop.
    pub fn simulation_config(&self) -> SimulationConfig {
        let sampling = match self.simulation.sampling {
            SamplingKind::EventDriven => SamplingMode::EventDriven,
            SamplingKind::FixedInterval => SamplingMode::FixedInterval(Duration::from_secs_f64(
                self.simulation.sample_interval_secs.max(0.01),
            )),
        };

        SimulationConfig {
            ride_name: self.session.ride_name.clone(),
            sampling,
            slope_mode: self.simulation.slope_mode,
            pause_after_zero_samples: self.simulation.pause_after_zero_samples,
            stall_timeout: Duration::from_secs_f64(self.simulation.stall_timeout_secs.max(0.01)),
            speed_model: self.rider,
        }
    }
}

/// Trainer-related settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerSettings {
    /// Use a simulated trainer instead of scanning for one
    pub mock: bool,
    /// Discovery timeout in seconds
    pub discovery_timeout_secs: u64,
    /// Per-candidate connection timeout in seconds
    pub connection_timeout_secs: u64,
    /// How long a target write waits for the trainer's acknowledgement
    pub write_ack_timeout_ms: u64,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            mock: false,
            discovery_timeout_secs: 10,
            connection_timeout_secs: 5,
            write_ack_timeout_ms: 1000,
        }
    }
}

impl TrainerSettings {
    pub fn sensor_config(&self) -> SensorConfig {
        SensorConfig {
            discovery_timeout: Duration::from_secs(self.discovery_timeout_secs),
            connection_timeout: Duration::from_secs(self.connection_timeout_secs),
            write_ack_timeout: Duration::from_millis(self.write_ack_timeout_ms),
        }
    }
}

/// How the ride loop samples telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingKind {
    /// Every joined sample is a tick
    #[default]
    EventDriven,
    /// One tick every `sample_interval_secs`
    FixedInterval,
}

/// Ride loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub sampling: SamplingKind,
    /// Tick period for `fixed_interval` sampling
    pub sample_interval_secs: f64,
    pub slope_mode: SlopeMode,
    /// Consecutive zero-power samples before auto-pause, 0 disables it
    pub pause_after_zero_samples: u32,
    /// Silence after which a joined capability is dropped from the ride
    pub stall_timeout_secs: f64,
    /// Delivery policy for telemetry subscribers
    pub backpressure: Backpressure,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            sampling: SamplingKind::EventDriven,
            sample_interval_secs: 2.0,
            slope_mode: SlopeMode::Terrain,
            pause_after_zero_samples: 5,
            stall_timeout_secs: 5.0,
            backpressure: Backpressure::default(),
        }
    }
}

/// Session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Name of the recorded ride
    pub ride_name: String,
    /// Workout in `name;ftp;start-end-seconds;...` form, built-in session if unset
    pub workout: Option<String>,
    /// GeoJSON route file, bundled loop if unset
    pub route_path: Option<PathBuf>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ride_name: "Hello World Ride".to_string(),
            workout: None,
            route_path: None,
        }
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "ergride", "ErgRide")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load application configuration from the default location.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let mut config = load_config_from(&get_config_path())?;
    config.data_dir = get_data_dir();
    Ok(config)
}

/// Load configuration from `path`. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        tracing::info!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Save application configuration to the default location.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &get_config_path())
}

/// Save configuration to `path`, creating parent directories.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
