//! Stored records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, abbreviated measurable quantity from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlledProperty {
    pub id: u64,
    pub name: String,
    /// Key used in composite value strings. Empty for the implicit state property.
    pub abbreviation: String,
}

impl ControlledProperty {
    /// Whether values of this property render as a bare token.
    pub fn is_state(&self) -> bool {
        self.abbreviation.is_empty()
    }
}

/// Optional descriptive fields of a device model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceModelMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A categorized bundle of controlled properties shared by devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceModel {
    pub id: u64,
    pub external_model_id: String,
    pub category: String,
    pub metadata: DeviceModelMetadata,
    /// Ordered by catalog position.
    pub controlled_properties: Vec<ControlledProperty>,
}

impl DeviceModel {
    pub fn controlled_property_names(&self) -> Vec<String> {
        self.controlled_properties
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    /// Find the model's property for a composite value key.
    pub fn property_by_abbreviation(&self, abbreviation: &str) -> Option<&ControlledProperty> {
        self.controlled_properties
            .iter()
            .find(|p| p.abbreviation == abbreviation)
    }
}

/// Geographic position as stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A registered physical device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: u64,
    pub external_device_id: String,
    pub device_model_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// The only mutable column, set by every successful ingest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reported_at: Option<DateTime<Utc>>,
}

/// One immutable value snapshot for a device/property pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub id: u64,
    pub device_id: u64,
    pub controlled_property_id: u64,
    pub value: String,
    pub observed_at: DateTime<Utc>,
}

/// Current state of a device, rebuilt from its observation history.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub device: Device,
    /// Composite value string, empty when nothing has been reported.
    pub value: String,
}

impl DeviceState {
    pub fn last_reported_at(&self) -> Option<DateTime<Utc>> {
        self.device.last_reported_at
    }
}
