// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/magnetometer-rs

//! Sensor port traits and common types

use std::sync::Arc;
use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Sensor types a port can enumerate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    MagneticField,              // Calibrated, hard-iron compensated
    MagneticFieldUncalibrated,  // Raw field, no bias removal
    Accelerometer,
    Gyroscope,

    // Custom
    Custom(u32),
}

/// Accuracy reported alongside sensor data.
///
/// Levels are ordered, so a gate is a plain `>=` against a minimum level:
/// `NoContact < Unreliable < Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyLevel {
    NoContact,
    Unreliable,
    Low,
    Medium,
    High,
}

impl AccuracyLevel {
    /// Map a raw platform status code onto a level, clamping out-of-range values.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            i32::MIN..=-1 => AccuracyLevel::NoContact,
            0 => AccuracyLevel::Unreliable,
            1 => AccuracyLevel::Low,
            2 => AccuracyLevel::Medium,
            _ => AccuracyLevel::High,
        }
    }

    /// Raw platform status code
    pub fn raw(self) -> i32 {
        match self {
            AccuracyLevel::NoContact => -1,
            AccuracyLevel::Unreliable => 0,
            AccuracyLevel::Low => 1,
            AccuracyLevel::Medium => 2,
            AccuracyLevel::High => 3,
        }
    }

    /// Whether samples at this level pass a gate set at `minimum`
    pub fn meets(self, minimum: AccuracyLevel) -> bool {
        self >= minimum
    }
}

/// Delivery rate hint passed on registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingRate {
    Fastest,
    Game,
    Ui,
    Normal,
}

impl SamplingRate {
    /// Nominal delay between samples
    pub fn period(self) -> Duration {
        match self {
            SamplingRate::Fastest => Duration::ZERO,
            SamplingRate::Game => Duration::from_millis(20),
            SamplingRate::Ui => Duration::from_millis(66),
            SamplingRate::Normal => Duration::from_millis(200),
        }
    }
}

/// A physical (or simulated) sensor device returned by enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHandle {
    pub id: String,
    pub name: String,
    pub sensor_type: SensorType,
}

/// A single sample delivered by a port
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorEvent {
    pub sensor_type: SensorType,
    pub accuracy: AccuracyLevel,
    pub values: [f32; 3],
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Receives asynchronous deliveries from a [`SensorPort`].
///
/// Callbacks may arrive on any thread. Implementations must not call back
/// into the port that is delivering to them.
pub trait SensorListener: Send + Sync {
    /// A new sample is available
    fn on_event(&self, event: &SensorEvent);

    /// The device changed its reported accuracy
    fn on_accuracy_changed(&self, sensor_type: SensorType, accuracy: AccuracyLevel);
}

/// Platform interface for finding sensors and (un)registering listeners.
///
/// `register` must not invoke the listener synchronously; deliveries start
/// after it returns.
pub trait SensorPort: Send + Sync {
    /// List devices of the given type, best match first
    fn enumerate(&self, sensor_type: SensorType) -> Vec<DeviceHandle>;

    /// Start delivering samples from `device` to `listener`. Returns `false`
    /// when the platform rejects the registration.
    fn register(&self, device: &DeviceHandle, listener: Arc<dyn SensorListener>, rate: SamplingRate) -> bool;

    /// Stop all deliveries to `listener`. Unknown listeners are ignored.
    fn unregister(&self, listener: &Arc<dyn SensorListener>);
}

/// Identity comparison for listener trait objects
pub fn same_listener(a: &Arc<dyn SensorListener>, b: &Arc<dyn SensorListener>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
