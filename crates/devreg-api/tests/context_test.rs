//! Tests for the device context source and registry dispatch.

mod common;

use devreg_api::ngsi::{ContextSource, Entity, Query};
use devreg_core::{Error, TelemetryMessage, WaterTemperatureTelemetry};
use serde_json::json;

use common::create_fixture;

fn value_patch(encoded: &str) -> serde_json::Value {
    json!({"value": {"type": "Property", "value": encoded}})
}

#[test]
fn test_provides() {
    let fixture = create_fixture();
    let source = &fixture.source;

    assert!(source.provides_entities_with_matching_id("urn:ngsi-ld:Device:sn-1"));
    assert!(source.provides_entities_with_matching_id("urn:ngsi-ld:DeviceModel:m"));
    assert!(!source.provides_entities_with_matching_id("urn:ngsi-ld:Road:r"));
    assert!(source.provides_type("Device"));
    assert!(source.provides_type("DeviceModel"));
    assert!(!source.provides_type("Road"));
    assert!(source.provides_attribute("value"));
    assert!(!source.provides_attribute("temperature"));
}

#[test]
fn test_create_device_model_entity() {
    let fixture = create_fixture();
    let registry = fixture.registry();

    let body = json!({
        "id": "urn:ngsi-ld:DeviceModel:level",
        "type": "DeviceModel",
        "category": {"type": "Property", "value": ["sensor"]},
        "controlledProperty": {"type": "Property", "value": ["fillingLevel"]},
        "name": {"type": "Property", "value": "Level sensor"}
    });
    registry
        .create_entity("DeviceModel", "urn:ngsi-ld:DeviceModel:level", &body)
        .unwrap();

    let model = fixture.store.get_device_model_by_external_id("level").unwrap();
    assert_eq!(model.category, "sensor");
    assert_eq!(model.metadata.name.as_deref(), Some("Level sensor"));
    assert_eq!(model.controlled_property_names(), vec!["fillingLevel"]);
}

#[test]
fn test_create_device_model_with_unknown_property() {
    let fixture = create_fixture();
    let body = json!({
        "id": "urn:ngsi-ld:DeviceModel:rocket",
        "type": "DeviceModel",
        "category": {"type": "Property", "value": ["vehicle"]},
        "controlledProperty": {"type": "Property", "value": ["spaceship"]}
    });

    let err = fixture
        .registry()
        .create_entity("DeviceModel", "urn:ngsi-ld:DeviceModel:rocket", &body)
        .unwrap_err();
    assert_eq!(
        err,
        Error::UnsupportedProperty {
            subject: "catalog".to_string(),
            properties: vec!["spaceship".to_string()],
        }
    );
}

#[test]
fn test_create_device_entity() {
    let fixture = create_fixture();
    let body = json!({
        "id": "urn:ngsi-ld:Device:snow-02",
        "type": "Device",
        "location": {"type": "GeoProperty", "value": {"type": "Point", "coordinates": [17.1, 62.2]}},
        "refDeviceModel": {"type": "Relationship", "object": "urn:ngsi-ld:DeviceModel:snow-gauge"}
    });
    fixture
        .registry()
        .create_entity("Device", "urn:ngsi-ld:Device:snow-02", &body)
        .unwrap();

    let device = fixture.store.get_device("snow-02").unwrap();
    let location = device.location.unwrap();
    assert_eq!(location.latitude, 62.2);
    assert_eq!(location.longitude, 17.1);
}

#[test]
fn test_create_device_requires_model() {
    let fixture = create_fixture();
    let registry = fixture.registry();

    let body = json!({"id": "urn:ngsi-ld:Device:orphan", "type": "Device"});
    assert!(matches!(
        registry.create_entity("Device", "urn:ngsi-ld:Device:orphan", &body),
        Err(Error::Validation(_))
    ));

    let body = json!({
        "id": "urn:ngsi-ld:Device:orphan",
        "type": "Device",
        "refDeviceModel": {"type": "Relationship", "object": "urn:ngsi-ld:DeviceModel:livboj"}
    });
    assert_eq!(
        registry.create_entity("Device", "urn:ngsi-ld:Device:orphan", &body),
        Err(Error::not_found("DeviceModel", "livboj"))
    );
}

#[test]
fn test_create_unsupported_type() {
    let fixture = create_fixture();
    let err = fixture
        .registry()
        .create_entity("Road", "urn:ngsi-ld:Road:r", &json!({}))
        .unwrap_err();
    assert_eq!(err, Error::UnsupportedType("Road".to_string()));

    // Dispatched directly, the source rejects it too
    let err = fixture
        .source
        .create_entity("Road", "urn:ngsi-ld:Road:r", &json!({}))
        .unwrap_err();
    assert_eq!(err, Error::UnsupportedType("Road".to_string()));
}

#[test]
fn test_retrieve_device() {
    let fixture = create_fixture();
    fixture.store.record_value("snow-01", "snow=25;t=-3").unwrap();

    let entity = fixture
        .registry()
        .retrieve_entity("urn:ngsi-ld:Device:snow-01")
        .unwrap();
    let Entity::Device(device) = entity else {
        panic!("expected a device entity");
    };
    assert_eq!(device.value.unwrap().value, "snow%3D25%3Bt%3D-3");
    assert_eq!(
        device.ref_device_model.unwrap().object,
        "urn:ngsi-ld:DeviceModel:snow-gauge"
    );
    assert!(device.date_last_value_reported.is_some());
    assert!(device.location.is_none());
}

#[test]
fn test_retrieve_device_model_and_missing() {
    let fixture = create_fixture();
    let registry = fixture.registry();

    let entity = registry
        .retrieve_entity("urn:ngsi-ld:DeviceModel:elt-temp")
        .unwrap();
    let Entity::DeviceModel(model) = entity else {
        panic!("expected a device model entity");
    };
    assert_eq!(model.brand_name.unwrap().value, "Elsys");
    assert_eq!(model.controlled_property.unwrap().value, vec!["temperature"]);

    assert!(matches!(
        registry.retrieve_entity("urn:ngsi-ld:Device:missing"),
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        registry.retrieve_entity("urn:ngsi-ld:Road:r"),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn test_query_devices_and_models() {
    let fixture = create_fixture();
    fixture.store.record_value("snow-01", "snow=4").unwrap();
    let registry = fixture.registry();

    let query = Query::new(Some("Device"), None).unwrap();
    let ids: Vec<String> = registry
        .collect_entities(&query)
        .unwrap()
        .iter()
        .map(|e| e.id().to_string())
        .collect();
    assert_eq!(
        ids,
        vec!["urn:ngsi-ld:Device:sk-elt-temp-02", "urn:ngsi-ld:Device:snow-01"]
    );

    let query = Query::new(Some("DeviceModel"), None).unwrap();
    let entities = registry.collect_entities(&query).unwrap();
    assert_eq!(entities.len(), 2);
    assert!(entities.iter().all(|e| e.entity_type() == "DeviceModel"));

    // Attribute-only queries reach every type of the providing source
    let query = Query::new(None, Some("value")).unwrap();
    assert_eq!(registry.collect_entities(&query).unwrap().len(), 4);

    let query = Query::new(None, Some("temperature")).unwrap();
    assert!(registry.collect_entities(&query).unwrap().is_empty());
}

#[test]
fn test_query_stops_at_first_callback_error() {
    let fixture = create_fixture();
    let query = Query::new(Some("Device,DeviceModel"), None).unwrap();

    let mut seen = 0;
    let result = fixture.registry().query_entities(&query, &mut |_| {
        seen += 1;
        Err(Error::Validation("enough".to_string()))
    });
    assert_eq!(result, Err(Error::Validation("enough".to_string())));
    assert_eq!(seen, 1);
}

#[test]
fn test_patch_records_decoded_value() {
    let fixture = create_fixture();

    fixture
        .registry()
        .update_entity_attributes("urn:ngsi-ld:Device:snow-01", &value_patch("snow%3D12%3Bt%3D1"))
        .unwrap();
    assert_eq!(
        fixture.store.current_state_of("snow-01").unwrap().value,
        "snow=12;t=1"
    );
    assert_eq!(fixture.store.observation_count("snow-01").unwrap(), 2);
}

#[test]
fn test_successive_reports_have_distinct_timestamps() {
    let fixture = create_fixture();
    let registry = fixture.registry();
    let id = "urn:ngsi-ld:Device:snow-01";

    let reported_at = |registry: &devreg_api::ContextRegistry| {
        let Entity::Device(device) = registry.retrieve_entity(id).unwrap() else {
            panic!("expected a device entity");
        };
        device.date_last_value_reported.unwrap().value.value
    };

    registry.update_entity_attributes(id, &value_patch("snow%3D1")).unwrap();
    let first = reported_at(&registry);
    registry.update_entity_attributes(id, &value_patch("snow%3D2")).unwrap();
    let second = reported_at(&registry);

    assert_ne!(first, second);
    let first = chrono::DateTime::parse_from_rfc3339(&first).unwrap();
    let second = chrono::DateTime::parse_from_rfc3339(&second).unwrap();
    assert!(second > first);
}

#[test]
fn test_padded_temperature_is_not_published() {
    let fixture = create_fixture();

    fixture
        .registry()
        .update_entity_attributes("urn:ngsi-ld:Device:sk-elt-temp-02", &value_patch("t%3D%2012"))
        .unwrap();
    assert_eq!(fixture.publisher.count(), 0);
    assert_eq!(fixture.store.observation_count("sk-elt-temp-02").unwrap(), 1);
}

#[test]
fn test_patch_errors() {
    let fixture = create_fixture();
    let registry = fixture.registry();

    assert!(matches!(
        registry.update_entity_attributes("urn:ngsi-ld:Device:missing", &value_patch("t%3D1")),
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        registry.update_entity_attributes("urn:ngsi-ld:Device:snow-01", &json!({})),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        registry.update_entity_attributes("urn:ngsi-ld:Device:snow-01", &value_patch("l%3D3")),
        Err(Error::UnsupportedProperty { .. })
    ));
    assert_eq!(fixture.store.observation_count("snow-01").unwrap(), 0);
}

#[test]
fn test_telemetry_published_for_in_range_temperature() {
    let fixture = create_fixture();

    fixture
        .registry()
        .update_entity_attributes("urn:ngsi-ld:Device:sk-elt-temp-02", &value_patch("t%3D12"))
        .unwrap();

    assert_eq!(
        fixture.publisher.messages(),
        vec![TelemetryMessage::from(WaterTemperatureTelemetry::new(
            12.0,
            "sk-elt-temp-02",
            17.30,
            62.39,
        ))]
    );
}

#[test]
fn test_telemetry_gating() {
    let fixture = create_fixture();
    let registry = fixture.registry();
    let id = "urn:ngsi-ld:Device:sk-elt-temp-02";

    // Outside the allowed range
    registry.update_entity_attributes(id, &value_patch("t%3D15.5")).unwrap();
    registry.update_entity_attributes(id, &value_patch("t%3D-0.6")).unwrap();
    assert_eq!(fixture.publisher.count(), 0);
    assert_eq!(fixture.store.observation_count("sk-elt-temp-02").unwrap(), 2);

    // Range bounds are inclusive
    registry.update_entity_attributes(id, &value_patch("t%3D15")).unwrap();
    registry.update_entity_attributes(id, &value_patch("t%3D-0.5")).unwrap();
    assert_eq!(fixture.publisher.count(), 2);

    // Devices not named as water temperature sensors never publish
    registry
        .update_entity_attributes("urn:ngsi-ld:Device:snow-01", &value_patch("t%3D4"))
        .unwrap();
    assert_eq!(fixture.publisher.count(), 2);
}

#[test]
fn test_failed_ingest_does_not_publish() {
    let fixture = create_fixture();

    let result = fixture.registry().update_entity_attributes(
        "urn:ngsi-ld:Device:sk-elt-temp-02",
        &value_patch("t%3D4%3Bsnow%3D2"),
    );
    assert!(matches!(result, Err(Error::UnsupportedProperty { .. })));
    assert_eq!(fixture.publisher.count(), 0);
}
