// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/magnetometer-rs

//! Magnetometer - sensor session adapter
//!
//! Turns a continuous magnetic field sample stream into reading outcomes for
//! a caller, with a bounded-time guarantee that the caller hears back even if
//! the hardware never reports usable data.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   start/stop   ┌──────────┐   start/stop   ┌───────────────┐
//! │  Client  │ ─────────────▶ │  Plugin  │ ─────────────▶ │ SensorSession │
//! └──────────┘                └──────────┘                └───────────────┘
//!      ▲                                                    │    ▲     ▲
//!      │              Outcome (Success / Error)             │    │     │
//!      └────────────────────── ResultSink ◀─────────────────┘    │     │
//!                                                   samples ─────┘     │
//!                                              ┌────────────┐   ┌──────────┐
//!                                              │ SensorPort │   │ Watchdog │
//!                                              └────────────┘   └──────────┘
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod plugin;
pub mod sensors;
pub mod session;

// Re-exports for convenience
pub use client::{MagnetometerClient, WatchId};
pub use config::Config;
pub use error::{ClientError, PluginError, SessionError};
pub use plugin::{Command, MagnetometerPlugin};
pub use sensors::{AccuracyLevel, SensorPort, SensorType, SimulatedSensorPort};
pub use session::{Outcome, Reading, ResultSink, SensorSession, SessionState, TokioWatchdog};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "Magnetometer";
