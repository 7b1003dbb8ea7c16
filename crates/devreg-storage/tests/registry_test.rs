//! Tests for the catalog, device model registry and device creation.

use devreg_storage::{CATALOG_SEED, DeviceModelMetadata, DeviceStore, Error, Location};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_catalog_is_seeded_in_order() {
    let store = DeviceStore::memory().expect("Failed to create memory store");
    let catalog = store.catalog();

    let seeded: Vec<(&str, &str)> = catalog
        .all()
        .iter()
        .map(|p| (p.name.as_str(), p.abbreviation.as_str()))
        .collect();
    assert_eq!(seeded, CATALOG_SEED.to_vec());
    assert_eq!(catalog.lookup_by_abbreviation("snow").unwrap().name, "snowDepth");
}

#[test]
fn test_seeding_is_idempotent_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("devices.redb");

    let first_ids: Vec<u64> = {
        let store = DeviceStore::open(&path).expect("Failed to open store");
        store.catalog().all().iter().map(|p| p.id).collect()
    };

    let store = DeviceStore::open(&path).expect("Failed to reopen store");
    let second_ids: Vec<u64> = store.catalog().all().iter().map(|p| p.id).collect();
    assert_eq!(first_ids, second_ids);
    assert_eq!(store.catalog().len(), CATALOG_SEED.len());
}

#[test]
fn test_create_device_model() {
    let store = DeviceStore::memory().unwrap();
    let metadata = DeviceModelMetadata {
        brand_name: Some("Elsys".to_string()),
        model_name: Some("ELT-2".to_string()),
        ..Default::default()
    };

    let model = store
        .create_device_model(
            "elt-2",
            "sensor",
            &names(&["temperature", "snowDepth"]),
            metadata.clone(),
        )
        .unwrap();
    // Catalog order, not request order
    assert_eq!(model.controlled_property_names(), names(&["snowDepth", "temperature"]));

    let fetched = store.get_device_model_by_external_id("elt-2").unwrap();
    assert_eq!(fetched, model);
    assert_eq!(fetched.metadata, metadata);
    assert_eq!(store.get_device_model_by_key(model.id).unwrap(), model);
}

#[test]
fn test_create_device_model_rejects_unknown_properties() {
    let store = DeviceStore::memory().unwrap();

    let err = store
        .create_device_model("rocket", "vehicle", &names(&["spaceship"]), Default::default())
        .unwrap_err();
    match &err {
        Error::UnsupportedProperty { properties, .. } => {
            assert_eq!(properties, &names(&["spaceship"]));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().ends_with("spaceship"));

    let err = store
        .create_device_model(
            "rocket",
            "vehicle",
            &names(&["temperature", "spaceship", "warpSpeed"]),
            Default::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedProperty { ref properties, .. } if properties == &names(&["spaceship", "warpSpeed"])
    ));

    // Nothing was written
    assert!(matches!(
        store.get_device_model_by_external_id("rocket"),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn test_create_device_model_requires_category_and_properties() {
    let store = DeviceStore::memory().unwrap();

    assert!(matches!(
        store.create_device_model("m", "", &names(&["temperature"]), Default::default()),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        store.create_device_model("m", "sensor", &[], Default::default()),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_duplicate_model_id_is_rejected() {
    let store = DeviceStore::memory().unwrap();
    store
        .create_device_model("m", "sensor", &names(&["temperature"]), Default::default())
        .unwrap();

    let err = store
        .create_device_model("m", "sensor", &names(&["snowDepth"]), Default::default())
        .unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));
    assert_eq!(store.list_device_models().unwrap().len(), 1);
}

#[test]
fn test_list_device_models_is_ordered_by_external_id() {
    let store = DeviceStore::memory().unwrap();
    for id in ["zeta", "alpha", "mu"] {
        store
            .create_device_model(id, "sensor", &names(&["temperature"]), Default::default())
            .unwrap();
    }

    let ids: Vec<String> = store
        .list_device_models()
        .unwrap()
        .into_iter()
        .map(|m| m.external_model_id)
        .collect();
    assert_eq!(ids, names(&["alpha", "mu", "zeta"]));
}

#[test]
fn test_device_creation_requires_model() {
    let store = DeviceStore::memory().unwrap();

    assert!(matches!(
        store.create_device("sn-1", None, None),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        store.create_device("sn-1", Some(""), None),
        Err(Error::InvalidInput(_))
    ));

    let err = store.create_device("sn-1", Some("livboj"), None).unwrap_err();
    match err {
        Error::NotFound { kind, id } => {
            assert_eq!(kind, "DeviceModel");
            assert_eq!(id, "livboj");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(store.get_device("sn-1"), Err(Error::NotFound { .. })));
}

#[test]
fn test_create_and_get_device() {
    let store = DeviceStore::memory().unwrap();
    let model = store
        .create_device_model("m", "sensor", &names(&["temperature"]), Default::default())
        .unwrap();

    let device = store
        .create_device("sn-1", Some("m"), Some(Location::new(17.3, 62.4)))
        .unwrap();
    assert_eq!(device.device_model_id, model.id);
    assert_eq!(device.last_reported_at, None);

    assert_eq!(store.get_device("sn-1").unwrap(), device);
    assert!(matches!(
        store.create_device("sn-1", Some("m"), None),
        Err(Error::Conflict { .. })
    ));
}
