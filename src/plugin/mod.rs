// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/magnetometer-rs

//! Command dispatch - the caller-facing `start`/`stop` surface

use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::PluginError;
use crate::session::{Outcome, ResultSink, SensorSession, SessionState};

/// Commands accepted from callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
}

impl FromStr for Command {
    type Err = PluginError;

    fn from_str(action: &str) -> Result<Self, Self::Err> {
        match action {
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            other => Err(PluginError::UnrecognizedCommand(other.to_string())),
        }
    }
}

/// Routes commands and host lifecycle hooks to a [`SensorSession`]
pub struct MagnetometerPlugin {
    session: Arc<SensorSession>,
}

impl MagnetometerPlugin {
    pub fn new(session: Arc<SensorSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<SensorSession> {
        &self.session
    }

    /// Parse and run `action`, acknowledging on `sink`
    pub fn execute(&self, action: &str, sink: Arc<dyn ResultSink>) -> Result<SessionState, PluginError> {
        let command = action.parse::<Command>()?;
        Ok(self.dispatch(command, sink))
    }

    /// Run `command`.
    ///
    /// `sink` first receives an empty pending acknowledgement. For `Start` it
    /// then becomes the session's result channel.
    pub fn dispatch(&self, command: Command, sink: Arc<dyn ResultSink>) -> SessionState {
        debug!("Dispatching {:?}", command);
        sink.deliver(Outcome::Pending, true);

        match command {
            Command::Start => self.session.start(sink),
            Command::Stop => self.session.stop(),
        }
    }

    /// Host page reloaded
    pub fn on_reset(&self) {
        if self.session.state() == SessionState::Running {
            info!("Host reset, stopping running session");
            self.session.stop();
        }
    }

    /// Host is shutting down
    pub fn on_destroy(&self) {
        self.session.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SessionConfig, SimulatorConfig};
    use crate::sensors::{AccuracyLevel, SensorEvent, SensorType, SimulatedSensorPort};
    use crate::session::{ErrorInfo, ManualWatchdog, RecordingSink};

    fn plugin(simulator: SimulatorConfig) -> (MagnetometerPlugin, Arc<SimulatedSensorPort>) {
        let port = Arc::new(SimulatedSensorPort::new(SimulatorConfig { streaming: false, ..simulator }));
        let session = SensorSession::new(port.clone(), Arc::new(ManualWatchdog::default()), SessionConfig::default());
        (MagnetometerPlugin::new(session), port)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!("start".parse::<Command>().unwrap(), Command::Start);
        assert_eq!("stop".parse::<Command>().unwrap(), Command::Stop);
        assert_eq!(
            "calibrate".parse::<Command>(),
            Err(PluginError::UnrecognizedCommand("calibrate".to_string()))
        );
    }

    #[test]
    fn test_unrecognized_command_sends_nothing() {
        let (plugin, port) = plugin(SimulatorConfig::default());
        let sink = Arc::new(RecordingSink::default());

        assert!(plugin.execute("getHeading", sink.clone()).is_err());
        assert!(sink.deliveries().is_empty());
        assert_eq!(port.register_calls(), 0);
    }

    #[test]
    fn test_start_acknowledges_before_error() {
        let (plugin, _port) = plugin(SimulatorConfig { devices: 0, ..SimulatorConfig::default() });
        let sink = Arc::new(RecordingSink::default());

        let state = plugin.execute("start", sink.clone()).unwrap();

        assert_eq!(state, SessionState::ErrorFailedToStart);
        assert_eq!(
            sink.outcomes(),
            vec![
                Outcome::Pending,
                Outcome::Error(ErrorInfo { code: 3, message: "No sensors found to register to.".to_string() }),
            ]
        );
    }

    #[test]
    fn test_stop_acknowledges_on_its_own_sink() {
        let (plugin, port) = plugin(SimulatorConfig::default());
        let start_sink = Arc::new(RecordingSink::default());
        let stop_sink = Arc::new(RecordingSink::default());

        plugin.execute("start", start_sink.clone()).unwrap();
        assert_eq!(plugin.execute("stop", stop_sink.clone()).unwrap(), SessionState::Stopped);

        assert_eq!(start_sink.outcomes(), vec![Outcome::Pending]);
        assert_eq!(stop_sink.outcomes(), vec![Outcome::Pending]);
        assert_eq!(port.unregister_calls(), 1);
    }

    #[test]
    fn test_reset_only_stops_running_session() {
        let (plugin, port) = plugin(SimulatorConfig::default());
        plugin.execute("start", Arc::new(RecordingSink::default())).unwrap();

        plugin.on_reset();
        assert_eq!(plugin.session().state(), SessionState::Starting);

        port.emit(SensorEvent {
            sensor_type: SensorType::MagneticFieldUncalibrated,
            accuracy: AccuracyLevel::High,
            values: [1.0, 2.0, 3.0],
            timestamp: 42,
        });
        plugin.on_reset();
        assert_eq!(plugin.session().state(), SessionState::Stopped);
    }

    #[test]
    fn test_destroy_always_stops() {
        let (plugin, port) = plugin(SimulatorConfig::default());
        plugin.execute("start", Arc::new(RecordingSink::default())).unwrap();

        plugin.on_destroy();
        plugin.on_destroy();

        assert_eq!(plugin.session().state(), SessionState::Stopped);
        assert_eq!(port.unregister_calls(), 1);
    }
}
