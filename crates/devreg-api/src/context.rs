//! Context source serving devices and device models from the device store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::SecondsFormat;
use devreg_core::{
    Error, Result, TelemetryConfig, TelemetryPublisher, WaterTemperatureTelemetry,
};
use devreg_storage::{
    DeviceModel, DeviceModelMetadata, DeviceState, DeviceStore, Location,
    correct_swapped_coordinates,
};

use crate::ngsi::{
    ContextSource, DEVICE_ID_PREFIX, DEVICE_MODEL_ID_PREFIX, DEVICE_MODEL_TYPE, DEVICE_TYPE,
    DateTimeProperty, DeviceAttributes, DeviceEntity, DeviceModelEntity, EmitEntity, Entity,
    GeoProperty, Property, Query, Relationship,
};

/// The only attribute device entities expose for filtering and patching.
pub const VALUE_ATTRIBUTE: &str = "value";

/// Decode a percent-encoded attribute value. `+` decodes to a space.
pub fn decode_value(encoded: &str) -> Result<String> {
    let spaced = encoded.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| Error::Validation(format!("unable to decode value {encoded:?}: {e}")))
}

pub fn encode_value(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Temperature carried by the first `t=<value>` token, if it parses.
fn water_temperature(value: &str) -> Option<f64> {
    let token = value.split(';').find_map(|token| {
        let mut parts = token.split('=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("t"), Some(temperature), None) => Some(temperature),
            _ => None,
        }
    })?;
    token.parse().ok()
}

fn strip_prefix<'a>(entity_id: &'a str, prefix: &str) -> Result<&'a str> {
    match entity_id.strip_prefix(prefix) {
        Some(short_id) if !short_id.is_empty() => Ok(short_id),
        _ => Err(Error::Validation(format!(
            "entity id {entity_id} must start with \"{prefix}\""
        ))),
    }
}

/// Serves `Device` and `DeviceModel` entities and publishes water
/// temperature telemetry for matching device updates.
pub struct DeviceContextSource {
    store: Arc<DeviceStore>,
    publisher: Arc<dyn TelemetryPublisher>,
    telemetry: TelemetryConfig,
}

impl DeviceContextSource {
    pub fn new(
        store: Arc<DeviceStore>,
        publisher: Arc<dyn TelemetryPublisher>,
        telemetry: TelemetryConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            telemetry,
        }
    }

    fn create_device(&self, entity_id: &str, body: &serde_json::Value) -> Result<()> {
        let entity: DeviceEntity = serde_json::from_value(body.clone()).map_err(|e| {
            tracing::error!(error = %e, "Failed to decode body into Device");
            Error::from(e)
        })?;
        let short_id = strip_prefix(entity_id, DEVICE_ID_PREFIX)?;

        let model_ref = entity.ref_device_model.as_ref().map(|r| {
            r.object
                .strip_prefix(DEVICE_MODEL_ID_PREFIX)
                .unwrap_or(&r.object)
        });
        let location = entity
            .location
            .as_ref()
            .map(|geo| Location::new(geo.latitude(), geo.longitude()));

        self.store.create_device(short_id, model_ref, location)?;
        Ok(())
    }

    fn create_device_model(&self, entity_id: &str, body: &serde_json::Value) -> Result<()> {
        let entity: DeviceModelEntity = serde_json::from_value(body.clone()).map_err(|e| {
            tracing::error!(error = %e, "Failed to decode body into DeviceModel");
            Error::from(e)
        })?;
        let short_id = strip_prefix(entity_id, DEVICE_MODEL_ID_PREFIX)?;

        let category = entity
            .category
            .and_then(|c| c.value.into_iter().next())
            .unwrap_or_default();
        let controlled_properties = entity
            .controlled_property
            .map(|p| p.value)
            .unwrap_or_default();
        let metadata = DeviceModelMetadata {
            brand_name: entity.brand_name.map(|p| p.value),
            model_name: entity.model_name.map(|p| p.value),
            manufacturer_name: entity.manufacturer_name.map(|p| p.value),
            name: entity.name.map(|p| p.value),
        };

        self.store
            .create_device_model(short_id, &category, &controlled_properties, metadata)?;
        Ok(())
    }

    fn device_entity(state: &DeviceState, model_id: Option<&str>) -> DeviceEntity {
        let mut entity = DeviceEntity::new(
            &state.device.external_device_id,
            encode_value(&state.value),
        );
        entity.location = state
            .device
            .location
            .map(|l| GeoProperty::point(l.latitude, l.longitude));
        entity.date_last_value_reported = state.last_reported_at().map(|at| {
            DateTimeProperty::date_time(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        });
        entity.ref_device_model =
            model_id.map(|id| Relationship::new(format!("{DEVICE_MODEL_ID_PREFIX}{id}")));
        entity
    }

    fn device_model_entity(model: DeviceModel) -> DeviceModelEntity {
        let controlled_properties = model.controlled_property_names();
        let mut entity = DeviceModelEntity::new(
            &model.external_model_id,
            vec![model.category],
            controlled_properties,
        );
        entity.brand_name = model.metadata.brand_name.map(Property::new);
        entity.model_name = model.metadata.model_name.map(Property::new);
        entity.manufacturer_name = model.metadata.manufacturer_name.map(Property::new);
        entity.name = model.metadata.name.map(Property::new);
        entity
    }

    fn emit_devices(&self, emit: &mut EmitEntity<'_>) -> Result<()> {
        let model_ids: HashMap<u64, String> = self
            .store
            .list_device_models()?
            .into_iter()
            .map(|m| (m.id, m.external_model_id))
            .collect();

        self.store.for_each_current_state(|state| {
            let model_id = model_ids.get(&state.device.device_model_id);
            emit(Self::device_entity(&state, model_id.map(String::as_str)).into())
        })
    }

    fn emit_device_models(&self, emit: &mut EmitEntity<'_>) -> Result<()> {
        for model in self.store.list_device_models()? {
            emit(Self::device_model_entity(model).into())?;
        }
        Ok(())
    }

    /// Publish a water temperature reading if the device and value qualify.
    ///
    /// Never fails the update; problems are logged.
    fn publish_water_temperature(&self, short_id: &str, location: Option<Location>, value: &str) {
        if !self.telemetry.matches_device(short_id) {
            return;
        }
        let Some(temperature) = water_temperature(value) else {
            return;
        };
        if !self.telemetry.in_range(temperature) {
            tracing::info!(
                device = short_id,
                temperature,
                min = self.telemetry.min_temperature,
                max = self.telemetry.max_temperature,
                "Ignored water temperature value outside allowed range"
            );
            return;
        }

        let location = location.unwrap_or(Location::new(0.0, 0.0));
        let message = WaterTemperatureTelemetry::new(
            temperature,
            short_id,
            location.latitude,
            location.longitude,
        );
        if let Err(e) = self.publisher.publish(message.into()) {
            tracing::warn!(device = short_id, error = %e, "Failed to publish water temperature");
        }
    }
}

impl ContextSource for DeviceContextSource {
    fn provides_entities_with_matching_id(&self, entity_id: &str) -> bool {
        entity_id.starts_with(DEVICE_ID_PREFIX) || entity_id.starts_with(DEVICE_MODEL_ID_PREFIX)
    }

    fn provides_type(&self, type_name: &str) -> bool {
        type_name == DEVICE_TYPE || type_name == DEVICE_MODEL_TYPE
    }

    fn provides_attribute(&self, attribute_name: &str) -> bool {
        attribute_name == VALUE_ATTRIBUTE
    }

    fn entity_types(&self) -> Vec<String> {
        vec![DEVICE_TYPE.to_string(), DEVICE_MODEL_TYPE.to_string()]
    }

    fn create_entity(
        &self,
        type_name: &str,
        entity_id: &str,
        body: &serde_json::Value,
    ) -> Result<()> {
        match type_name {
            DEVICE_TYPE => self.create_device(entity_id, body),
            DEVICE_MODEL_TYPE => self.create_device_model(entity_id, body),
            other => {
                tracing::error!(entity_type = other, "Entity type is not supported");
                Err(Error::UnsupportedType(other.to_string()))
            }
        }
    }

    fn retrieve_entity(&self, entity_id: &str) -> Result<Entity> {
        if let Some(short_id) = entity_id.strip_prefix(DEVICE_ID_PREFIX) {
            let state = self.store.current_state_of(short_id)?;
            let model = self
                .store
                .get_device_model_by_key(state.device.device_model_id)
                .map_err(|e| Error::Integrity(format!("no valid DeviceModel found: {}", e)))?;
            return Ok(Self::device_entity(&state, Some(&model.external_model_id)).into());
        }
        if let Some(short_id) = entity_id.strip_prefix(DEVICE_MODEL_ID_PREFIX) {
            let model = self.store.get_device_model_by_external_id(short_id)?;
            return Ok(Self::device_model_entity(model).into());
        }
        Err(Error::not_found("entity", entity_id))
    }

    fn get_entities(&self, query: &Query, emit: &mut EmitEntity<'_>) -> Result<()> {
        for type_name in query.entity_types() {
            match type_name.as_str() {
                DEVICE_TYPE => self.emit_devices(emit)?,
                DEVICE_MODEL_TYPE => self.emit_device_models(emit)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn update_entity_attributes(&self, entity_id: &str, body: &serde_json::Value) -> Result<()> {
        let attributes: DeviceAttributes = serde_json::from_value(body.clone()).map_err(|e| {
            tracing::error!(error = %e, "Failed to decode attribute patch body");
            Error::from(e)
        })?;
        let short_id = strip_prefix(entity_id, DEVICE_ID_PREFIX)?;
        let encoded = attributes
            .value
            .map(|p| p.value)
            .ok_or_else(|| Error::Validation("attribute patch requires a value".to_string()))?;

        let device = self.store.get_device(short_id).map_err(|e| {
            tracing::error!(device = short_id, "Unable to find device for attributes update");
            Error::from(e)
        })?;

        let value = decode_value(&encoded).map_err(|e| {
            tracing::error!(device = short_id, error = %e, "Failed to decode device value");
            e
        })?;
        self.store.record_value(short_id, &value)?;

        self.publish_water_temperature(
            short_id,
            device.location.map(correct_swapped_coordinates),
            &value,
        );
        Ok(())
    }
}
