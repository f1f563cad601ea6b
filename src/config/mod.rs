// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/magnetometer-rs

//! Configuration module

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::sensors::{AccuracyLevel, SamplingRate, SensorType};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Application version
    pub version: String,

    /// Log level
    pub log_level: String,

    /// Sensor session configuration
    pub session: SessionConfig,

    /// Simulated sensor port configuration
    pub simulator: SimulatorConfig,

    /// Reading client configuration
    pub client: ClientConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Magnetometer".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            session: SessionConfig::default(),
            simulator: SimulatorConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("magnetometer"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Sensor session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sensor type to enumerate and accept events from
    pub sensor_type: SensorType,

    /// Minimum accuracy a sample needs to be reported
    pub min_accuracy: AccuracyLevel,

    /// Delay before the start-up watchdog reports the last known reading
    pub watchdog_timeout_ms: u64,

    /// Rate hint passed on registration
    pub sampling_rate: SamplingRate,
}

impl SessionConfig {
    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sensor_type: SensorType::MagneticFieldUncalibrated,
            min_accuracy: AccuracyLevel::Medium,
            watchdog_timeout_ms: 2000,
            sampling_rate: SamplingRate::Normal,
        }
    }
}

/// Simulated sensor port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Sensor type the simulated devices report
    pub sensor_type: SensorType,

    /// Number of devices returned by enumeration
    pub devices: usize,

    /// Whether registration succeeds
    pub accept_registration: bool,

    /// Accuracy attached to streamed samples
    pub accuracy: AccuracyLevel,

    /// Mean field vector in µT
    pub field_ut: [f32; 3],

    /// Standard deviation of per-axis noise in µT
    pub noise_ut: f32,

    /// Delay between registration and the first streamed sample
    pub startup_delay_ms: u64,

    /// Stream samples on the tokio runtime after registration
    pub streaming: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sensor_type: SensorType::MagneticFieldUncalibrated,
            devices: 1,
            accept_registration: true,
            accuracy: AccuracyLevel::High,
            field_ut: [15.0, 5.0, 45.0],  // ~50 µT, mid-latitude
            noise_ut: 0.1,
            startup_delay_ms: 0,
            streaming: true,
        }
    }
}

/// Reading client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Interval at which watches receive the latest reading
    pub watch_interval_ms: u64,
}

impl ClientConfig {
    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms.max(1))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            watch_interval_ms: 10,
        }
    }
}
