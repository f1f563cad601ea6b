// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/magnetometer-rs

//! Simulated sensor port for demo/testing

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use parking_lot::Mutex;
use rand::prelude::*;
use rand_distr::Normal;
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    same_listener, AccuracyLevel, DeviceHandle, SamplingRate, SensorEvent, SensorListener,
    SensorPort, SensorType,
};
use crate::config::SimulatorConfig;

struct Registration {
    listener: Arc<dyn SensorListener>,
    stream: Option<JoinHandle<()>>,
}

/// In-process [`SensorPort`] producing a noisy, roughly constant field.
///
/// With `streaming` enabled, registration spawns a task on the current tokio
/// runtime that delivers one sample per sampling period. Tests typically turn
/// streaming off and script deliveries through [`emit`](Self::emit).
pub struct SimulatedSensorPort {
    config: SimulatorConfig,
    registration: Mutex<Option<Registration>>,
    rng: Arc<Mutex<StdRng>>,
    register_calls: AtomicUsize,
    unregister_calls: AtomicUsize,
}

impl SimulatedSensorPort {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            registration: Mutex::new(None),
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
            register_calls: AtomicUsize::new(0),
            unregister_calls: AtomicUsize::new(0),
        }
    }

    /// Deliver a sample to the registered listener, if any
    pub fn emit(&self, event: SensorEvent) {
        if let Some(listener) = self.listener() {
            listener.on_event(&event);
        }
    }

    /// Deliver an accuracy change to the registered listener, if any
    pub fn emit_accuracy(&self, accuracy: AccuracyLevel) {
        if let Some(listener) = self.listener() {
            listener.on_accuracy_changed(self.config.sensor_type, accuracy);
        }
    }

    /// Generate a sample from the configured field and noise
    pub fn sample(&self) -> SensorEvent {
        generate_sample(&self.config, &mut self.rng.lock())
    }

    pub fn is_registered(&self) -> bool {
        self.registration.lock().is_some()
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn unregister_calls(&self) -> usize {
        self.unregister_calls.load(Ordering::SeqCst)
    }

    fn listener(&self) -> Option<Arc<dyn SensorListener>> {
        self.registration.lock().as_ref().map(|r| r.listener.clone())
    }

    fn spawn_stream(&self, listener: Arc<dyn SensorListener>, rate: SamplingRate) -> Option<JoinHandle<()>> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No tokio runtime available, simulated sensor will not stream");
                return None;
            }
        };

        let config = self.config.clone();
        let rng = self.rng.clone();
        let period = rate.period().max(Duration::from_millis(1));

        Some(runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(config.startup_delay_ms)).await;
            listener.on_accuracy_changed(config.sensor_type, config.accuracy);

            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let event = generate_sample(&config, &mut rng.lock());
                listener.on_event(&event);
            }
        }))
    }
}

impl SensorPort for SimulatedSensorPort {
    fn enumerate(&self, sensor_type: SensorType) -> Vec<DeviceHandle> {
        if sensor_type != self.config.sensor_type {
            return vec![];
        }

        (0..self.config.devices)
            .map(|i| DeviceHandle {
                id: format!("sim-mag-{}", i),
                name: format!("Simulated magnetometer {}", i),
                sensor_type,
            })
            .collect()
    }

    fn register(&self, device: &DeviceHandle, listener: Arc<dyn SensorListener>, rate: SamplingRate) -> bool {
        self.register_calls.fetch_add(1, Ordering::SeqCst);

        if !self.config.accept_registration {
            debug!("Rejecting registration for {}", device.id);
            return false;
        }

        let stream = if self.config.streaming {
            self.spawn_stream(listener.clone(), rate)
        } else {
            None
        };

        let previous = self.registration.lock().replace(Registration { listener, stream });
        if let Some(stream) = previous.and_then(|r| r.stream) {
            stream.abort();
        }

        info!("Registered listener on {} ({:?})", device.id, rate);
        true
    }

    fn unregister(&self, listener: &Arc<dyn SensorListener>) {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);

        let mut registration = self.registration.lock();
        let matches = registration
            .as_ref()
            .map(|r| same_listener(&r.listener, listener))
            .unwrap_or(false);

        if matches {
            if let Some(stream) = registration.take().and_then(|r| r.stream) {
                stream.abort();
            }
            info!("Unregistered listener");
        }
    }
}

fn generate_sample(config: &SimulatorConfig, rng: &mut StdRng) -> SensorEvent {
    let mut values = config.field_ut;
    if let Ok(noise) = Normal::new(0.0f32, config.noise_ut) {
        for v in values.iter_mut() {
            *v += rng.sample(noise);
        }
    }

    SensorEvent {
        sensor_type: config.sensor_type,
        accuracy: config.accuracy,
        values,
        timestamp: Utc::now().timestamp_millis(),
    }
}
