// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/magnetometer-rs

//! Error types

use thiserror::Error;

use crate::sensors::SensorType;
use crate::session::{ErrorInfo, SessionState};

/// Reasons a session fails to start
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Enumeration returned no device of the configured type
    #[error("No sensors found to register to.")]
    NoMatchingSensor(SensorType),

    /// The platform refused the listener registration
    #[error("Device sensor returned an error.")]
    RegistrationRejected,
}

impl SessionError {
    /// Numeric code reported to callers; both variants share the
    /// `ErrorFailedToStart` state code.
    pub fn code(&self) -> u32 {
        match self {
            SessionError::NoMatchingSensor(_) | SessionError::RegistrationRejected => {
                SessionState::ErrorFailedToStart.code()
            }
        }
    }
}

impl From<&SessionError> for ErrorInfo {
    fn from(err: &SessionError) -> Self {
        ErrorInfo {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Errors raised by the command dispatch layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("unrecognized command: {0}")]
    UnrecognizedCommand(String),
}

/// Errors seen by reading client callers
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    /// The session delivered an error outcome
    #[error("sensor error {0}")]
    Sensor(ErrorInfo),

    /// The session went away before delivering an outcome
    #[error("result channel closed")]
    Closed,
}
