// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/magnetometer-rs

//! Sensor session - turns a sample stream into reading outcomes
//!
//! A [`SensorSession`] registers with a [`SensorPort`] on `start`, gates
//! incoming samples on accuracy and reports accepted ones to the caller's
//! [`ResultSink`]. A start-up watchdog guarantees the caller hears back even
//! when the hardware never delivers a usable sample:
//!
//! ```text
//!            start (device found, registered)
//!  Stopped ─────────────────────────────────▶ Starting ──event ok──▶ Running
//!     ▲  │                                       │  ▲                   │
//!     │  │ start (no device / rejected)          │  └─ watchdog: report │
//!     │  ▼                                       │     last reading     │
//!  ErrorFailedToStart ◀──────────────────────────┴──────── stop ────────┘
//! ```
//!
//! Sensor deliveries and watchdog fires arrive on different threads; all
//! state lives behind one mutex so the two can never interleave.

mod sink;
mod watchdog;

pub use sink::{ChannelSink, Delivery, DiscardSink, ErrorInfo, Outcome, Reading, ResultSink};
pub use watchdog::{TokioWatchdog, Watchdog, WatchdogFn, WatchdogHandle};

#[cfg(test)]
pub(crate) use sink::testing::RecordingSink;
#[cfg(test)]
pub(crate) use watchdog::testing::ManualWatchdog;

use std::sync::{Arc, Weak};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::sensors::{AccuracyLevel, SensorEvent, SensorListener, SensorPort, SensorType};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Stopped,
    Starting,
    Running,
    ErrorFailedToStart,
}

impl SessionState {
    /// Numeric status code, also used as the error code for start failures
    pub fn code(self) -> u32 {
        match self {
            SessionState::Stopped => 0,
            SessionState::Starting => 1,
            SessionState::Running => 2,
            SessionState::ErrorFailedToStart => 3,
        }
    }

    /// Registered with the port and waiting for or receiving samples
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Starting | SessionState::Running)
    }
}

struct ArmedWatchdog {
    handle: WatchdogHandle,
    epoch: u64,
}

struct SessionInner {
    state: SessionState,
    accuracy: AccuracyLevel,
    reading: Reading,
    registered: bool,
    sink: Option<Arc<dyn ResultSink>>,
    watchdog: Option<ArmedWatchdog>,
    epoch: u64,
}

impl SessionInner {
    fn deliver(&self, outcome: Outcome) {
        if let Some(sink) = &self.sink {
            sink.deliver(outcome, true);
        }
    }
}

/// Magnetometer session state machine
pub struct SensorSession {
    port: Arc<dyn SensorPort>,
    watchdog: Arc<dyn Watchdog>,
    config: SessionConfig,
    inner: Mutex<SessionInner>,
    this: Weak<SensorSession>,
}

impl SensorSession {
    pub fn new(port: Arc<dyn SensorPort>, watchdog: Arc<dyn Watchdog>, config: SessionConfig) -> Arc<Self> {
        let accuracy = config.min_accuracy;
        Arc::new_cyclic(|this| Self {
            port,
            watchdog,
            config,
            inner: Mutex::new(SessionInner {
                state: SessionState::Stopped,
                accuracy,
                reading: Reading::default(),
                registered: false,
                sink: None,
                watchdog: None,
                epoch: 0,
            }),
            this: this.clone(),
        })
    }

    /// Begin (or refresh) a session delivering to `sink`.
    ///
    /// The sink replaces any previous one. When already starting or running
    /// this only re-arms the watchdog. Otherwise the first matching device is
    /// registered; failure is delivered to `sink` and reported as
    /// [`SessionState::ErrorFailedToStart`].
    pub fn start(&self, sink: Arc<dyn ResultSink>) -> SessionState {
        let mut inner = self.inner.lock();
        inner.sink = Some(sink);

        if inner.state.is_active() {
            debug!("Session already {:?}, re-arming watchdog", inner.state);
            self.arm_watchdog(&mut inner);
            return inner.state;
        }

        inner.state = SessionState::Starting;
        match self.register() {
            Ok(()) => {
                inner.registered = true;
                inner.accuracy = self.config.min_accuracy;
                self.arm_watchdog(&mut inner);
                info!("Magnetometer session starting");
            }
            Err(err) => {
                warn!("Magnetometer session failed to start: {}", err);
                inner.state = SessionState::ErrorFailedToStart;
                inner.deliver(Outcome::Error(ErrorInfo::from(&err)));
            }
        }

        inner.state
    }

    /// End the session. Safe to call from any state, any number of times.
    ///
    /// A pending watchdog is left to fire; it is a no-op once stopped.
    pub fn stop(&self) -> SessionState {
        let mut inner = self.inner.lock();

        if inner.registered {
            if let Some(this) = self.this.upgrade() {
                let listener: Arc<dyn SensorListener> = this;
                self.port.unregister(&listener);
            }
            inner.registered = false;
        }

        if inner.state != SessionState::Stopped {
            info!("Magnetometer session stopped");
        }
        inner.state = SessionState::Stopped;
        inner.accuracy = AccuracyLevel::Unreliable;
        inner.sink = None;
        inner.state
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn accuracy(&self) -> AccuracyLevel {
        self.inner.lock().accuracy
    }

    pub fn last_reading(&self) -> Reading {
        self.inner.lock().reading
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn register(&self) -> Result<(), SessionError> {
        let sensor_type = self.config.sensor_type;
        let device = self
            .port
            .enumerate(sensor_type)
            .into_iter()
            .next()
            .ok_or(SessionError::NoMatchingSensor(sensor_type))?;

        let listener: Arc<dyn SensorListener> = self
            .this
            .upgrade()
            .ok_or(SessionError::RegistrationRejected)?;

        if self.port.register(&device, listener, self.config.sampling_rate) {
            debug!("Registered with {} ({})", device.id, device.name);
            Ok(())
        } else {
            Err(SessionError::RegistrationRejected)
        }
    }

    fn arm_watchdog(&self, inner: &mut SessionInner) {
        if let Some(armed) = inner.watchdog.take() {
            self.watchdog.cancel(armed.handle);
        }

        inner.epoch += 1;
        let epoch = inner.epoch;
        let session = self.this.clone();
        let handle = self.watchdog.schedule(
            self.config.watchdog_timeout(),
            Box::new(move || {
                if let Some(session) = session.upgrade() {
                    session.on_watchdog_fired(epoch);
                }
            }),
        );

        inner.watchdog = Some(ArmedWatchdog { handle, epoch });
    }

    fn on_watchdog_fired(&self, epoch: u64) {
        let mut inner = self.inner.lock();

        match &inner.watchdog {
            Some(armed) if armed.epoch == epoch => inner.watchdog = None,
            _ => {
                trace!("Ignoring superseded watchdog {}", epoch);
                return;
            }
        }

        if inner.state != SessionState::Starting {
            trace!("Watchdog fired while {:?}, nothing to do", inner.state);
            return;
        }

        if !inner.accuracy.meets(self.config.min_accuracy) {
            debug!("Watchdog fired with accuracy {:?}, still waiting", inner.accuracy);
            return;
        }

        debug!("No sample before watchdog, reporting last known reading");
        let reading = Reading {
            timestamp: Utc::now().timestamp_millis(),
            ..inner.reading
        };
        inner.deliver(Outcome::Success(reading));
    }

    fn accepts(&self, sensor_type: SensorType, state: SessionState) -> bool {
        sensor_type == self.config.sensor_type && state != SessionState::Stopped
    }
}

impl SensorListener for SensorSession {
    fn on_event(&self, event: &SensorEvent) {
        let mut inner = self.inner.lock();
        if !self.accepts(event.sensor_type, inner.state) {
            return;
        }

        inner.accuracy = event.accuracy;
        if !event.accuracy.meets(self.config.min_accuracy) {
            trace!("Dropping sample with accuracy {:?}", event.accuracy);
            return;
        }

        let [x, y, z] = event.values;
        inner.state = SessionState::Running;
        inner.reading = Reading { x, y, z, timestamp: event.timestamp };
        inner.deliver(Outcome::Success(inner.reading));
    }

    fn on_accuracy_changed(&self, sensor_type: SensorType, accuracy: AccuracyLevel) {
        let mut inner = self.inner.lock();
        if !self.accepts(sensor_type, inner.state) {
            return;
        }

        debug!("Accuracy changed to {:?}", accuracy);
        inner.accuracy = accuracy;
    }
}
