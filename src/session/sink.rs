// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/magnetometer-rs

//! Result delivery to callers

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Last accepted magnetometer sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Error payload delivered to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: u32,
    pub message: String,
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// What a session hands to its result sink
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Acknowledgement, no result yet
    Pending,
    Success(Reading),
    Error(ErrorInfo),
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Pending)
    }

    /// JSON body as seen by a message-passing caller
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Outcome::Pending => serde_json::Value::String(String::new()),
            Outcome::Success(reading) => serde_json::json!(reading),
            Outcome::Error(info) => serde_json::json!(info),
        }
    }
}

/// One message on a result channel
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub outcome: Outcome,
    /// The channel stays usable for later outcomes
    pub keep_open: bool,
}

/// Caller-side result channel.
///
/// `deliver` is invoked while the session holds its lock; implementations
/// must not block or call back into the session.
pub trait ResultSink: Send + Sync {
    fn deliver(&self, outcome: Outcome, keep_open: bool);
}

/// Forwards deliveries into a tokio channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Delivery>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl ResultSink for ChannelSink {
    fn deliver(&self, outcome: Outcome, keep_open: bool) {
        if self.tx.send(Delivery { outcome, keep_open }).is_err() {
            debug!("Result receiver dropped, discarding outcome");
        }
    }
}

/// Drops everything; for acknowledgements nobody reads
pub struct DiscardSink;

impl ResultSink for DiscardSink {
    fn deliver(&self, _outcome: Outcome, _keep_open: bool) {}
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shapes() {
        let success = Outcome::Success(Reading { x: 1.0, y: 2.0, z: 3.0, timestamp: 100 });
        assert_eq!(
            success.payload(),
            serde_json::json!({"x": 1.0, "y": 2.0, "z": 3.0, "timestamp": 100})
        );

        let error = Outcome::Error(ErrorInfo { code: 3, message: "nope".to_string() });
        assert_eq!(error.payload(), serde_json::json!({"code": 3, "message": "nope"}));

        assert_eq!(Outcome::Pending.payload(), serde_json::json!(""));
        assert!(!Outcome::Pending.is_terminal());
    }

    #[test]
    fn test_channel_sink_survives_closed_receiver() {
        let (sink, mut rx) = ChannelSink::channel();
        sink.deliver(Outcome::Pending, true);
        assert_eq!(rx.try_recv().unwrap(), Delivery { outcome: Outcome::Pending, keep_open: true });

        drop(rx);
        sink.deliver(Outcome::Pending, true);
    }
}
