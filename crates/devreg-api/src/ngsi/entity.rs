//! NGSI-LD entity wire shapes for devices and device models.

use serde::{Deserialize, Serialize};

/// Prefix of every device entity id.
pub const DEVICE_ID_PREFIX: &str = "urn:ngsi-ld:Device:";

/// Prefix of every device model entity id.
pub const DEVICE_MODEL_ID_PREFIX: &str = "urn:ngsi-ld:DeviceModel:";

pub const DEVICE_TYPE: &str = "Device";
pub const DEVICE_MODEL_TYPE: &str = "DeviceModel";

/// JSON-LD contexts attached to produced entities.
pub const DEFAULT_CONTEXT: [&str; 2] = [
    "https://schema.lab.fiware.org/ld/context",
    "https://uri.etsi.org/ngsi-ld/v1/ngsi-ld-core-context.jsonld",
];

fn default_context() -> Option<serde_json::Value> {
    Some(serde_json::json!(DEFAULT_CONTEXT))
}

fn property_type() -> String {
    "Property".to_string()
}

fn relationship_type() -> String {
    "Relationship".to_string()
}

fn geo_property_type() -> String {
    "GeoProperty".to_string()
}

fn point_type() -> String {
    "Point".to_string()
}

/// A plain NGSI-LD property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property<T> {
    #[serde(rename = "type", default = "property_type")]
    pub kind: String,
    pub value: T,
}

impl<T> Property<T> {
    pub fn new(value: T) -> Self {
        Self {
            kind: property_type(),
            value,
        }
    }
}

/// Link to another entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(rename = "type", default = "relationship_type")]
    pub kind: String,
    pub object: String,
}

impl Relationship {
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            kind: relationship_type(),
            object: object.into(),
        }
    }
}

/// GeoJSON point. Coordinates are `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(rename = "type", default = "point_type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoProperty {
    #[serde(rename = "type", default = "geo_property_type")]
    pub kind: String,
    pub value: Point,
}

impl GeoProperty {
    pub fn point(latitude: f64, longitude: f64) -> Self {
        Self {
            kind: geo_property_type(),
            value: Point {
                kind: point_type(),
                coordinates: [longitude, latitude],
            },
        }
    }

    pub fn latitude(&self) -> f64 {
        self.value.coordinates[1]
    }

    pub fn longitude(&self) -> f64 {
        self.value.coordinates[0]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateTimeValue {
    #[serde(rename = "@type")]
    pub kind: String,
    #[serde(rename = "@value")]
    pub value: String,
}

pub type DateTimeProperty = Property<DateTimeValue>;

impl DateTimeProperty {
    /// `value` is an RFC 3339 timestamp.
    pub fn date_time(value: impl Into<String>) -> Self {
        Property::new(DateTimeValue {
            kind: "DateTime".to_string(),
            value: value.into(),
        })
    }
}

/// Device entity. `value` carries the percent-encoded composite value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEntity {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoProperty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Property<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_last_value_reported: Option<DateTimeProperty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_device_model: Option<Relationship>,
}

impl DeviceEntity {
    pub fn new(short_id: &str, encoded_value: impl Into<String>) -> Self {
        Self {
            context: default_context(),
            id: format!("{DEVICE_ID_PREFIX}{short_id}"),
            entity_type: DEVICE_TYPE.to_string(),
            location: None,
            value: Some(Property::new(encoded_value.into())),
            date_last_value_reported: None,
            ref_device_model: None,
        }
    }
}

/// Device model entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceModelEntity {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Property<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controlled_property: Option<Property<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<Property<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<Property<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer_name: Option<Property<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Property<String>>,
}

impl DeviceModelEntity {
    pub fn new(short_id: &str, category: Vec<String>, controlled_property: Vec<String>) -> Self {
        Self {
            context: default_context(),
            id: format!("{DEVICE_MODEL_ID_PREFIX}{short_id}"),
            entity_type: DEVICE_MODEL_TYPE.to_string(),
            category: Some(Property::new(category)),
            controlled_property: Some(Property::new(controlled_property)),
            brand_name: None,
            model_name: None,
            manufacturer_name: None,
            name: None,
        }
    }
}

/// Attributes accepted by a device attribute patch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceAttributes {
    #[serde(default)]
    pub value: Option<Property<String>>,
}

/// Any entity this service produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entity {
    Device(DeviceEntity),
    DeviceModel(DeviceModelEntity),
}

impl Entity {
    pub fn id(&self) -> &str {
        match self {
            Entity::Device(d) => &d.id,
            Entity::DeviceModel(m) => &m.id,
        }
    }

    pub fn entity_type(&self) -> &str {
        match self {
            Entity::Device(d) => &d.entity_type,
            Entity::DeviceModel(m) => &m.entity_type,
        }
    }
}

impl From<DeviceEntity> for Entity {
    fn from(e: DeviceEntity) -> Self {
        Entity::Device(e)
    }
}

impl From<DeviceModelEntity> for Entity {
    fn from(e: DeviceModelEntity) -> Self {
        Entity::DeviceModel(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_wire_shape() {
        let mut device = DeviceEntity::new("sn-1", "t%3D12");
        device.location = Some(GeoProperty::point(62.39, 17.30));
        device.date_last_value_reported = Some(DateTimeProperty::date_time("2024-05-01T10:00:00Z"));
        device.ref_device_model = Some(Relationship::new("urn:ngsi-ld:DeviceModel:elt-2"));

        let value = serde_json::to_value(Entity::from(device)).unwrap();
        assert_eq!(value["id"], "urn:ngsi-ld:Device:sn-1");
        assert_eq!(value["type"], "Device");
        assert_eq!(value["value"], json!({"type": "Property", "value": "t%3D12"}));
        assert_eq!(value["location"]["value"]["coordinates"], json!([17.30, 62.39]));
        assert_eq!(value["dateLastValueReported"]["value"]["@type"], "DateTime");
        assert_eq!(value["refDeviceModel"]["object"], "urn:ngsi-ld:DeviceModel:elt-2");
        assert!(value["@context"].is_array());
    }

    #[test]
    fn test_decode_device_model_body() {
        let body = json!({
            "id": "urn:ngsi-ld:DeviceModel:elt-2",
            "type": "DeviceModel",
            "category": {"type": "Property", "value": ["sensor"]},
            "controlledProperty": {"type": "Property", "value": ["temperature"]},
            "brandName": {"type": "Property", "value": "Elsys"}
        });
        let model: DeviceModelEntity = serde_json::from_value(body).unwrap();
        assert_eq!(model.category.unwrap().value, vec!["sensor"]);
        assert_eq!(model.brand_name.unwrap().value, "Elsys");
        assert!(model.name.is_none());
    }

    #[test]
    fn test_property_type_defaults() {
        let attrs: DeviceAttributes = serde_json::from_value(json!({"value": {"value": "on"}})).unwrap();
        let value = attrs.value.unwrap();
        assert_eq!(value.kind, "Property");
        assert_eq!(value.value, "on");
    }
}
