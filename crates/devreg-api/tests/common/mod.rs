//! Common test utilities for API tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use devreg_api::{ContextRegistry, DeviceContextSource, ServerState};
use devreg_core::{PublishError, TelemetryConfig, TelemetryMessage, TelemetryPublisher};
use devreg_storage::{DeviceModelMetadata, DeviceStore, Location};

/// Publisher that records every message it is handed.
#[derive(Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<TelemetryMessage>>,
}

impl RecordingPublisher {
    pub fn messages(&self) -> Vec<TelemetryMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

impl TelemetryPublisher for RecordingPublisher {
    fn publish(&self, message: TelemetryMessage) -> Result<(), PublishError> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

pub struct Fixture {
    pub store: Arc<DeviceStore>,
    pub publisher: Arc<RecordingPublisher>,
    pub source: Arc<DeviceContextSource>,
}

impl Fixture {
    pub fn registry(&self) -> ContextRegistry {
        let mut registry = ContextRegistry::new();
        registry.register(self.source.clone());
        registry
    }

    pub fn server_state(&self) -> ServerState {
        ServerState::new(self.registry())
    }
}

/// Store with a water temperature model, a snow depth model and two devices.
pub fn create_fixture() -> Fixture {
    let store = DeviceStore::memory().expect("Failed to create memory store");
    store
        .create_device_model(
            "elt-temp",
            "sensor",
            &["temperature".to_string()],
            DeviceModelMetadata {
                brand_name: Some("Elsys".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    store
        .create_device_model(
            "snow-gauge",
            "sensor",
            &["snowDepth".to_string(), "temperature".to_string()],
            Default::default(),
        )
        .unwrap();
    store
        .create_device(
            "sk-elt-temp-02",
            Some("elt-temp"),
            Some(Location::new(17.30, 62.39)),
        )
        .unwrap();
    store
        .create_device("snow-01", Some("snow-gauge"), None)
        .unwrap();

    let publisher = Arc::new(RecordingPublisher::default());
    let source = Arc::new(DeviceContextSource::new(
        store.clone(),
        publisher.clone(),
        TelemetryConfig::default(),
    ));

    Fixture {
        store,
        publisher,
        source,
    }
}
