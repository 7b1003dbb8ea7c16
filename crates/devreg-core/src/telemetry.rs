//! Telemetry side channel.
//!
//! Updates to certain devices are republished as telemetry messages for an
//! external message bus. Delivery is fire-and-forget: the registry never
//! retries and never fails an update because a publish failed.
//!
//! [`TelemetryPublisher`] is the seam to the bus. [`TelemetryBus`] is an
//! in-process implementation on a broadcast channel that consumers (a bus
//! bridge, a logger, tests) subscribe to.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default channel capacity for the telemetry bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Water temperature reading republished from a sensor update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterTemperatureTelemetry {
    pub temperature: f64,
    pub device_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl WaterTemperatureTelemetry {
    pub fn new(temperature: f64, device_id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            temperature,
            device_id: device_id.into(),
            latitude,
            longitude,
        }
    }
}

/// Messages carried on the telemetry channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryMessage {
    WaterTemperature(WaterTemperatureTelemetry),
}

impl TelemetryMessage {
    /// Topic the message is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            TelemetryMessage::WaterTemperature(_) => "telemetry.temperature.water",
        }
    }

    /// Message body as sent on the wire.
    pub fn body(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<WaterTemperatureTelemetry> for TelemetryMessage {
    fn from(t: WaterTemperatureTelemetry) -> Self {
        TelemetryMessage::WaterTemperature(t)
    }
}

/// Publish failures. Callers log these and move on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PublishError {
    #[error("no subscribers on telemetry channel")]
    NoSubscribers,

    #[error("telemetry transport error: {0}")]
    Transport(String),
}

/// Outbound telemetry channel.
pub trait TelemetryPublisher: Send + Sync {
    fn publish(&self, message: TelemetryMessage) -> Result<(), PublishError>;
}

/// In-process telemetry bus backed by a broadcast channel.
#[derive(Clone)]
pub struct TelemetryBus {
    tx: broadcast::Sender<TelemetryMessage>,
}

impl TelemetryBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// The capacity bounds how many messages a slow subscriber may lag behind.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn subscribe(&self) -> TelemetryReceiver {
        TelemetryReceiver {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for TelemetryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryPublisher for TelemetryBus {
    fn publish(&self, message: TelemetryMessage) -> Result<(), PublishError> {
        self.tx
            .send(message)
            .map(|_| ())
            .map_err(|_| PublishError::NoSubscribers)
    }
}

/// Subscription to a [`TelemetryBus`].
pub struct TelemetryReceiver {
    rx: broadcast::Receiver<TelemetryMessage>,
}

impl TelemetryReceiver {
    /// Receive the next message. Returns `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<TelemetryMessage> {
        loop {
            match self.rx.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "telemetry subscriber lagged, messages dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<TelemetryMessage> {
        self.rx.try_recv().ok()
    }
}
