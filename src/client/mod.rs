// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/magnetometer-rs

//! Reading client - one-shot and periodic access to magnetometer readings
//!
//! The client keeps the underlying session alive only while somebody is
//! listening. The first listener starts it, the last one to leave stops it.
//! An error outcome is fanned out to every listener and detaches them all.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::plugin::{Command, MagnetometerPlugin};
use crate::session::{ChannelSink, Delivery, DiscardSink, Outcome, Reading};

/// Identifies a watch created by [`MagnetometerClient::watch_readings`]
pub type WatchId = Uuid;

pub type ReadingResult = Result<Reading, ClientError>;

enum ListenerKind {
    Once(oneshot::Sender<ReadingResult>),
    Watch(mpsc::UnboundedSender<ReadingResult>),
}

struct Listener {
    id: Uuid,
    kind: ListenerKind,
}

impl Listener {
    /// The caller dropped its receiving end
    fn is_abandoned(&self) -> bool {
        match &self.kind {
            ListenerKind::Once(tx) => tx.is_closed(),
            ListenerKind::Watch(tx) => tx.is_closed(),
        }
    }
}

#[derive(Default)]
struct ClientState {
    running: bool,
    cycle: u64,
    latest: Option<Reading>,
    listeners: Vec<Listener>,
    watches: HashMap<WatchId, JoinHandle<()>>,
}

struct ClientCore {
    plugin: Arc<MagnetometerPlugin>,
    state: Mutex<ClientState>,
}

impl ClientCore {
    fn add_listener(self: &Arc<Self>, state: &mut ClientState, listener: Listener) {
        state.listeners.push(listener);
        if !state.running {
            self.start_session(state);
        }
    }

    fn start_session(self: &Arc<Self>, state: &mut ClientState) {
        let (sink, rx) = ChannelSink::channel();
        state.running = true;
        state.cycle += 1;

        tokio::spawn(pump(self.clone(), rx, state.cycle));
        self.plugin.dispatch(Command::Start, Arc::new(sink));
        debug!("Client started session cycle {}", state.cycle);
    }

    fn stop_session(&self, state: &mut ClientState) {
        self.plugin.dispatch(Command::Stop, Arc::new(DiscardSink));
        state.running = false;
        state.latest = None;
        debug!("Client stopped session cycle {}", state.cycle);
    }

    fn remove_listener(&self, state: &mut ClientState, id: Uuid) {
        let before = state.listeners.len();
        state.listeners.retain(|l| l.id != id);
        if state.listeners.len() < before && state.listeners.is_empty() && state.running {
            self.stop_session(state);
        }
    }

    /// Forget a watch whose receiver went away
    fn detach_watch(&self, id: WatchId) {
        let mut state = self.state.lock();
        if state.watches.remove(&id).is_some() {
            debug!("Watch {} receiver dropped, detaching", id);
            self.remove_listener(&mut state, id);
        }
    }

    fn prune_abandoned(&self, state: &mut ClientState) {
        let abandoned: Vec<Uuid> = state
            .listeners
            .iter()
            .filter(|l| l.is_abandoned())
            .map(|l| l.id)
            .collect();

        for id in abandoned {
            if let Some(task) = state.watches.remove(&id) {
                task.abort();
            }
            self.remove_listener(state, id);
        }
    }

    fn handle(&self, delivery: Delivery, cycle: u64) {
        let mut state = self.state.lock();
        if cycle != state.cycle || !state.running {
            return;
        }

        self.prune_abandoned(&mut state);
        if !state.running {
            return;
        }

        match delivery.outcome {
            Outcome::Pending => {}
            Outcome::Success(reading) => {
                state.latest = Some(reading);

                let (once, watching): (Vec<_>, Vec<_>) = state
                    .listeners
                    .drain(..)
                    .partition(|l| matches!(l.kind, ListenerKind::Once(_)));
                state.listeners = watching;

                for listener in once {
                    if let ListenerKind::Once(tx) = listener.kind {
                        let _ = tx.send(Ok(reading));
                    }
                }

                if state.listeners.is_empty() {
                    self.stop_session(&mut state);
                }
            }
            Outcome::Error(info) => {
                info!("Session reported error {}: {}", info.code, info.message);

                let listeners: Vec<_> = state.listeners.drain(..).collect();
                for listener in listeners {
                    let err = Err(ClientError::Sensor(info.clone()));
                    match listener.kind {
                        ListenerKind::Once(tx) => {
                            let _ = tx.send(err);
                        }
                        ListenerKind::Watch(tx) => {
                            let _ = tx.send(err);
                            if let Some(task) = state.watches.remove(&listener.id) {
                                task.abort();
                            }
                        }
                    }
                }

                self.stop_session(&mut state);
            }
        }
    }
}

async fn pump(core: Arc<ClientCore>, mut rx: mpsc::UnboundedReceiver<Delivery>, cycle: u64) {
    while let Some(delivery) = rx.recv().await {
        core.handle(delivery, cycle);
    }
    debug!("Result channel for cycle {} closed", cycle);
}

/// Removes a one-shot listener when its future goes away unresolved
struct DetachOnDrop {
    core: Arc<ClientCore>,
    id: Uuid,
}

impl Drop for DetachOnDrop {
    fn drop(&mut self) {
        let mut state = self.core.state.lock();
        self.core.remove_listener(&mut state, self.id);
    }
}

/// Caller-facing reading API over a [`MagnetometerPlugin`].
///
/// Must be used from within a tokio runtime.
pub struct MagnetometerClient {
    core: Arc<ClientCore>,
    watch_interval: Duration,
}

impl MagnetometerClient {
    pub fn new(plugin: Arc<MagnetometerPlugin>, config: &ClientConfig) -> Self {
        Self {
            core: Arc::new(ClientCore {
                plugin,
                state: Mutex::new(ClientState::default()),
            }),
            watch_interval: config.watch_interval(),
        }
    }

    /// Wait for the next reading (or error) from the session.
    ///
    /// Dropping the future before it resolves detaches the caller, stopping
    /// the session if nobody else is listening.
    pub async fn get_current_reading(&self) -> ReadingResult {
        let (tx, rx) = oneshot::channel();
        let id = Uuid::new_v4();
        {
            let mut state = self.core.state.lock();
            self.core.add_listener(&mut state, Listener { id, kind: ListenerKind::Once(tx) });
        }

        let _detach = DetachOnDrop { core: self.core.clone(), id };
        rx.await.unwrap_or(Err(ClientError::Closed))
    }

    /// Receive the latest reading every `interval` (default from config).
    ///
    /// Errors are delivered once, after which the watch is detached and the
    /// receiver closes.
    pub fn watch_readings(&self, interval: Option<Duration>) -> (WatchId, mpsc::UnboundedReceiver<ReadingResult>) {
        let interval = interval.unwrap_or(self.watch_interval);
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let core = self.core.clone();
        let ticker_tx = tx.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if ticker_tx.is_closed() {
                    core.detach_watch(id);
                    break;
                }

                let latest = core.state.lock().latest;
                if let Some(reading) = latest {
                    if ticker_tx.send(Ok(reading)).is_err() {
                        core.detach_watch(id);
                        break;
                    }
                }
            }
        });

        let mut state = self.core.state.lock();
        state.watches.insert(id, task);
        self.core.add_listener(&mut state, Listener { id, kind: ListenerKind::Watch(tx) });

        info!("Watching readings every {:?} ({})", interval, id);
        (id, rx)
    }

    /// Stop a watch. Returns `false` for unknown or already detached ids.
    pub fn clear_watch(&self, id: WatchId) -> bool {
        let mut state = self.core.state.lock();
        match state.watches.remove(&id) {
            Some(task) => {
                task.abort();
                self.core.remove_listener(&mut state, id);
                true
            }
            None => false,
        }
    }

    /// Last reading seen by the current session, if any
    pub fn latest(&self) -> Option<Reading> {
        self.core.state.lock().latest
    }

    pub fn is_running(&self) -> bool {
        self.core.state.lock().running
    }
}

impl Drop for MagnetometerClient {
    fn drop(&mut self) {
        let mut state = self.core.state.lock();
        for (_, task) in state.watches.drain() {
            task.abort();
        }
        state.listeners.clear();
        if state.running {
            self.core.stop_session(&mut state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SessionConfig, SimulatorConfig};
    use crate::sensors::{AccuracyLevel, SimulatedSensorPort};
    use crate::session::{ErrorInfo, SensorSession, SessionState, TokioWatchdog};

    struct Fixture {
        port: Arc<SimulatedSensorPort>,
        plugin: Arc<MagnetometerPlugin>,
        client: MagnetometerClient,
    }

    fn fixture(simulator: SimulatorConfig) -> Fixture {
        let port = Arc::new(SimulatedSensorPort::new(simulator));
        let watchdog = Arc::new(TokioWatchdog::new(tokio::runtime::Handle::current()));
        let session = SensorSession::new(port.clone(), watchdog, SessionConfig::default());
        let plugin = Arc::new(MagnetometerPlugin::new(session));
        let client = MagnetometerClient::new(plugin.clone(), &ClientConfig::default());
        Fixture { port, plugin, client }
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_reading_then_detach() {
        let f = fixture(SimulatorConfig::default());

        let reading = f.client.get_current_reading().await.unwrap();

        assert!((reading.z - 45.0).abs() < 2.0);
        assert_eq!(f.plugin.session().state(), SessionState::Stopped);
        assert!(!f.port.is_registered());
        assert!(!f.client.is_running());
        assert_eq!(f.client.latest(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_reading_reports_start_failure() {
        let f = fixture(SimulatorConfig { devices: 0, ..SimulatorConfig::default() });

        let err = f.client.get_current_reading().await.unwrap_err();

        assert_eq!(
            err,
            ClientError::Sensor(ErrorInfo { code: 3, message: "No sensors found to register to.".to_string() })
        );
        assert!(!f.client.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_reading_falls_back_on_watchdog() {
        let f = fixture(SimulatorConfig { startup_delay_ms: 5_000, ..SimulatorConfig::default() });

        let started = tokio::time::Instant::now();
        let reading = f.client.get_current_reading().await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(2000));
        assert_eq!((reading.x, reading.y, reading.z), (0.0, 0.0, 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_receives_readings_until_cleared() {
        let f = fixture(SimulatorConfig::default());

        let (id, mut rx) = f.client.watch_readings(Some(Duration::from_millis(50)));
        for _ in 0..3 {
            assert!(rx.recv().await.unwrap().is_ok());
        }
        assert!(f.client.is_running());

        assert!(f.client.clear_watch(id));
        assert!(!f.client.clear_watch(id));
        assert!(rx.recv().await.is_none());
        assert_eq!(f.plugin.session().state(), SessionState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_and_one_shot_share_session() {
        let f = fixture(SimulatorConfig::default());

        let (id, mut rx) = f.client.watch_readings(None);
        f.client.get_current_reading().await.unwrap();

        assert!(f.client.is_running());
        assert!(rx.recv().await.unwrap().is_ok());
        assert_eq!(f.port.register_calls(), 1);

        f.client.clear_watch(id);
        assert!(!f.port.is_registered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_error_detaches() {
        let f = fixture(SimulatorConfig { accept_registration: false, ..SimulatorConfig::default() });

        let (id, mut rx) = f.client.watch_readings(None);

        assert!(matches!(rx.recv().await, Some(Err(ClientError::Sensor(_)))));
        assert!(rx.recv().await.is_none());
        assert!(!f.client.clear_watch(id));
        assert!(!f.client.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_one_shot_stops_session() {
        let f = fixture(SimulatorConfig { accuracy: AccuracyLevel::Low, ..SimulatorConfig::default() });

        let result = tokio::time::timeout(Duration::from_secs(5), f.client.get_current_reading()).await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!f.client.is_running());
        assert!(!f.port.is_registered());
        assert_eq!(f.plugin.session().state(), SessionState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_watch_receiver_stops_session() {
        let f = fixture(SimulatorConfig { accuracy: AccuracyLevel::Low, ..SimulatorConfig::default() });

        let (id, rx) = f.client.watch_readings(Some(Duration::from_millis(50)));
        assert!(f.client.is_running());
        drop(rx);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!f.client.is_running());
        assert!(!f.port.is_registered());
        assert!(!f.client.clear_watch(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_listener_leaves_others_attached() {
        let f = fixture(SimulatorConfig { accuracy: AccuracyLevel::Low, ..SimulatorConfig::default() });

        let (id, _rx) = f.client.watch_readings(None);
        let result = tokio::time::timeout(Duration::from_secs(1), f.client.get_current_reading()).await;
        assert!(result.is_err());

        assert!(f.client.is_running());
        assert!(f.port.is_registered());

        assert!(f.client.clear_watch(id));
        assert!(!f.port.is_registered());
    }
}
