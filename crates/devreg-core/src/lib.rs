//! Core types shared across the device registry.
//!
//! This crate defines the error taxonomy every component reports through,
//! the environment configuration surface, and the telemetry side channel
//! that the context adapter publishes to.

pub mod config;
pub mod error;
pub mod telemetry;

pub use config::{ServiceConfig, TelemetryConfig};
pub use error::{Error, Result};
pub use telemetry::{
    PublishError, TelemetryBus, TelemetryMessage, TelemetryPublisher, TelemetryReceiver,
    WaterTemperatureTelemetry,
};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::{ServiceConfig, TelemetryConfig, defaults, env_vars};
    pub use crate::error::{Error, Result};
    pub use crate::telemetry::{TelemetryBus, TelemetryMessage, TelemetryPublisher};
}
