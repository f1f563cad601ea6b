// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/magnetometer-rs

//! Single-shot watchdog timers

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

pub type WatchdogFn = Box<dyn FnOnce() + Send + 'static>;

/// Opaque token for a scheduled callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchdogHandle(u64);

/// Delayed-callback primitive.
///
/// Neither method may run the callback synchronously.
pub trait Watchdog: Send + Sync {
    fn schedule(&self, delay: Duration, callback: WatchdogFn) -> WatchdogHandle;

    /// Best effort; a callback that is already running is not interrupted
    fn cancel(&self, handle: WatchdogHandle);
}

/// Runs each callback in its own task on a tokio runtime
pub struct TokioWatchdog {
    runtime: Handle,
    tasks: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
    next_id: AtomicU64,
}

impl TokioWatchdog {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Number of callbacks scheduled but not yet fired or cancelled
    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl Watchdog for TokioWatchdog {
    fn schedule(&self, delay: Duration, callback: WatchdogFn) -> WatchdogHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tasks = self.tasks.clone();

        // Hold the map lock across spawn so the task cannot finish and
        // remove its entry before it is inserted.
        let mut map = self.tasks.lock();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            tasks.lock().remove(&id);
            callback();
        });
        map.insert(id, task);

        trace!("Scheduled watchdog {} in {:?}", id, delay);
        WatchdogHandle(id)
    }

    fn cancel(&self, handle: WatchdogHandle) {
        if let Some(task) = self.tasks.lock().remove(&handle.0) {
            task.abort();
            trace!("Cancelled watchdog {}", handle.0);
        }
    }
}
