//! Device model registry and device creation.

use redb::{ReadableMultimapTable, ReadableTable};

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::model::{ControlledProperty, Device, DeviceModel, DeviceModelMetadata, Location};
use crate::schema::{
    self, DEVICE_EXTERNAL_ID_INDEX, DEVICE_MODEL_CONTROLLED_PROPERTY,
    DEVICE_MODEL_EXTERNAL_ID_INDEX, DEVICE_MODEL_TABLE, DEVICE_TABLE, DeviceModelRow, columns,
};
use crate::store::DeviceStore;

impl DeviceStore {
    /// Register a device model.
    ///
    /// Every property name must be in the catalog. Unknown names are all
    /// reported together and nothing is written.
    pub fn create_device_model(
        &self,
        external_id: &str,
        category: &str,
        controlled_property_names: &[String],
        metadata: DeviceModelMetadata,
    ) -> Result<DeviceModel> {
        if external_id.is_empty() {
            return Err(Error::InvalidInput(
                "device model id must not be empty".to_string(),
            ));
        }
        if category.is_empty() {
            return Err(Error::InvalidInput(
                "at least one category must be specified".to_string(),
            ));
        }
        if controlled_property_names.is_empty() {
            return Err(Error::InvalidInput(
                "at least one controlled property must be specified".to_string(),
            ));
        }

        let properties = self.resolve_properties(controlled_property_names)?;

        let write_txn = self.db().begin_write()?;
        let id = {
            let mut models = write_txn.open_table(DEVICE_MODEL_TABLE)?;
            let mut index = write_txn.open_table(DEVICE_MODEL_EXTERNAL_ID_INDEX)?;
            let mut links = write_txn.open_multimap_table(DEVICE_MODEL_CONTROLLED_PROPERTY)?;

            let id = schema::next_id(&models)?;
            schema::claim_unique(&mut index, columns::EXTERNAL_MODEL_ID, external_id, id)?;
            let row = DeviceModelRow {
                id,
                external_model_id: external_id.to_string(),
                category: category.to_string(),
                metadata: metadata.clone(),
            };
            schema::write_row(&mut models, id, &row)?;
            for property in &properties {
                links.insert(id, property.id)?;
            }
            id
        };
        write_txn.commit()?;

        tracing::info!(
            id,
            external_id,
            category,
            controlled_properties = properties.len(),
            "Created device model"
        );

        Ok(DeviceModel {
            id,
            external_model_id: external_id.to_string(),
            category: category.to_string(),
            metadata,
            controlled_properties: properties,
        })
    }

    pub fn get_device_model_by_external_id(&self, external_id: &str) -> Result<DeviceModel> {
        let read_txn = self.db().begin_read()?;
        let index = read_txn.open_table(DEVICE_MODEL_EXTERNAL_ID_INDEX)?;
        let models = read_txn.open_table(DEVICE_MODEL_TABLE)?;
        let links = read_txn.open_multimap_table(DEVICE_MODEL_CONTROLLED_PROPERTY)?;

        let id = schema::lookup_id(&index, external_id)?
            .ok_or_else(|| Error::not_found("DeviceModel", external_id))?;
        load_model(&models, &links, self.catalog(), id)?
            .ok_or_else(|| Error::Integrity(format!("index entry for device model {external_id} has no row")))
    }

    pub fn get_device_model_by_key(&self, key: u64) -> Result<DeviceModel> {
        let read_txn = self.db().begin_read()?;
        let models = read_txn.open_table(DEVICE_MODEL_TABLE)?;
        let links = read_txn.open_multimap_table(DEVICE_MODEL_CONTROLLED_PROPERTY)?;

        load_model(&models, &links, self.catalog(), key)?
            .ok_or_else(|| Error::not_found("DeviceModel", key.to_string()))
    }

    /// All device models ordered by external id.
    pub fn list_device_models(&self) -> Result<Vec<DeviceModel>> {
        let read_txn = self.db().begin_read()?;
        let index = read_txn.open_table(DEVICE_MODEL_EXTERNAL_ID_INDEX)?;
        let models = read_txn.open_table(DEVICE_MODEL_TABLE)?;
        let links = read_txn.open_multimap_table(DEVICE_MODEL_CONTROLLED_PROPERTY)?;

        let mut result = Vec::new();
        for entry in index.iter()? {
            let (external_id, id) = entry?;
            let model = load_model(&models, &links, self.catalog(), id.value())?.ok_or_else(|| {
                Error::Integrity(format!(
                    "index entry for device model {} has no row",
                    external_id.value()
                ))
            })?;
            result.push(model);
        }
        Ok(result)
    }

    /// Register a device against an existing device model.
    pub fn create_device(
        &self,
        external_id: &str,
        model_ref: Option<&str>,
        location: Option<Location>,
    ) -> Result<Device> {
        if external_id.is_empty() {
            return Err(Error::InvalidInput("device id must not be empty".to_string()));
        }
        let model_ref = match model_ref {
            Some(model_ref) if !model_ref.is_empty() => model_ref,
            _ => {
                return Err(Error::InvalidInput(
                    "device creation requires a device model reference".to_string(),
                ));
            }
        };

        let write_txn = self.db().begin_write()?;
        let device = {
            let model_index = write_txn.open_table(DEVICE_MODEL_EXTERNAL_ID_INDEX)?;
            let device_model_id = schema::lookup_id(&model_index, model_ref)?
                .ok_or_else(|| Error::not_found("DeviceModel", model_ref))?;

            let mut devices = write_txn.open_table(DEVICE_TABLE)?;
            let mut index = write_txn.open_table(DEVICE_EXTERNAL_ID_INDEX)?;

            let id = schema::next_id(&devices)?;
            schema::claim_unique(&mut index, columns::EXTERNAL_DEVICE_ID, external_id, id)?;
            let device = Device {
                id,
                external_device_id: external_id.to_string(),
                device_model_id,
                location,
                last_reported_at: None,
            };
            schema::write_row(&mut devices, id, &device)?;
            device
        };
        write_txn.commit()?;

        tracing::info!(
            id = device.id,
            external_id,
            device_model = model_ref,
            "Created device"
        );
        Ok(device)
    }

    /// Stored device row, without any read-path corrections.
    pub fn get_device(&self, external_id: &str) -> Result<Device> {
        let read_txn = self.db().begin_read()?;
        let index = read_txn.open_table(DEVICE_EXTERNAL_ID_INDEX)?;
        let devices = read_txn.open_table(DEVICE_TABLE)?;
        load_device(&index, &devices, external_id)
    }

    /// Resolve names against the catalog, collecting every unknown one.
    fn resolve_properties(&self, names: &[String]) -> Result<Vec<ControlledProperty>> {
        let mut resolved: Vec<ControlledProperty> = Vec::new();
        let mut unknown = Vec::new();
        for name in names {
            match self.catalog().lookup_by_name(name) {
                Ok(property) => {
                    if !resolved.iter().any(|p| p.id == property.id) {
                        resolved.push(property.clone());
                    }
                }
                Err(_) => unknown.push(name.clone()),
            }
        }
        if !unknown.is_empty() {
            return Err(Error::UnsupportedProperty {
                subject: "catalog".to_string(),
                properties: unknown,
            });
        }
        sort_by_catalog(self.catalog(), &mut resolved);
        Ok(resolved)
    }
}

pub(crate) fn load_device(
    index: &impl ReadableTable<&'static str, u64>,
    devices: &impl ReadableTable<u64, &'static str>,
    external_id: &str,
) -> Result<Device> {
    let id = schema::lookup_id(index, external_id)?
        .ok_or_else(|| Error::not_found("Device", external_id))?;
    schema::read_row(devices, id)?
        .ok_or_else(|| Error::Integrity(format!("index entry for device {external_id} has no row")))
}

/// Load a model with its property set. `None` if the row is missing.
pub(crate) fn load_model(
    models: &impl ReadableTable<u64, &'static str>,
    links: &impl ReadableMultimapTable<u64, u64>,
    catalog: &Catalog,
    id: u64,
) -> Result<Option<DeviceModel>> {
    let Some(row) = schema::read_row::<DeviceModelRow>(models, id)? else {
        return Ok(None);
    };

    let mut controlled_properties = Vec::new();
    for link in links.get(id)? {
        let property_id = link?.value();
        let property = catalog.get(property_id).ok_or_else(|| {
            Error::Integrity(format!(
                "device model {} references unknown controlled property {}",
                row.external_model_id, property_id
            ))
        })?;
        controlled_properties.push(property.clone());
    }
    sort_by_catalog(catalog, &mut controlled_properties);

    Ok(Some(DeviceModel {
        id: row.id,
        external_model_id: row.external_model_id,
        category: row.category,
        metadata: row.metadata,
        controlled_properties,
    }))
}

fn sort_by_catalog(catalog: &Catalog, properties: &mut [ControlledProperty]) {
    properties.sort_by_key(|p| catalog.position(p.id).unwrap_or(usize::MAX));
}
