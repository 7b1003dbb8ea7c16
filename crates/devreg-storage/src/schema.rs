//! Table layout and row helpers.
//!
//! Entity rows are JSON keyed by a `u64` id allocated as last key + 1.
//! Unique columns live in `<table>_<column>` index tables, which also give
//! iteration ordered by that column. Many-to-many and one-to-many links are
//! multimap tables.

use redb::{MultimapTableDefinition, ReadableTable, Table, TableDefinition, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::DeviceModelMetadata;

// controlled_property: key = id, value = ControlledProperty (JSON)
pub(crate) const CONTROLLED_PROPERTY_TABLE: TableDefinition<u64, &str> =
    TableDefinition::new("controlled_property");

// controlled_property_name: key = name, value = id
pub(crate) const CONTROLLED_PROPERTY_NAME_INDEX: TableDefinition<&str, u64> =
    TableDefinition::new("controlled_property_name");

// device_model: key = id, value = DeviceModelRow (JSON)
pub(crate) const DEVICE_MODEL_TABLE: TableDefinition<u64, &str> =
    TableDefinition::new("device_model");

// device_model_external_id: key = external_model_id, value = id
pub(crate) const DEVICE_MODEL_EXTERNAL_ID_INDEX: TableDefinition<&str, u64> =
    TableDefinition::new("device_model_external_id");

// device_model_controlled_property: key = device_model_id, values = controlled_property_id
pub(crate) const DEVICE_MODEL_CONTROLLED_PROPERTY: MultimapTableDefinition<u64, u64> =
    MultimapTableDefinition::new("device_model_controlled_property");

// device: key = id, value = Device (JSON)
pub(crate) const DEVICE_TABLE: TableDefinition<u64, &str> = TableDefinition::new("device");

// device_external_id: key = external_device_id, value = id
pub(crate) const DEVICE_EXTERNAL_ID_INDEX: TableDefinition<&str, u64> =
    TableDefinition::new("device_external_id");

// device_observation: key = id, value = Observation (JSON), append-only
pub(crate) const DEVICE_OBSERVATION_TABLE: TableDefinition<u64, &str> =
    TableDefinition::new("device_observation");

// device_observation_index: key = device_id, values = observation id
pub(crate) const DEVICE_OBSERVATION_INDEX: MultimapTableDefinition<u64, u64> =
    MultimapTableDefinition::new("device_observation_index");

/// Column names reported on unique index conflicts.
pub(crate) mod columns {
    pub const CONTROLLED_PROPERTY_NAME: &str = "controlled_property.name";
    pub const EXTERNAL_MODEL_ID: &str = "device_model.external_model_id";
    pub const EXTERNAL_DEVICE_ID: &str = "device.external_device_id";
}

/// Stored form of a device model. Its property set lives in the link table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct DeviceModelRow {
    pub id: u64,
    pub external_model_id: String,
    pub category: String,
    #[serde(flatten)]
    pub metadata: DeviceModelMetadata,
}

/// Create every table so later read transactions can open them.
pub(crate) fn create_tables(txn: &WriteTransaction) -> Result<()> {
    txn.open_table(CONTROLLED_PROPERTY_TABLE)?;
    txn.open_table(CONTROLLED_PROPERTY_NAME_INDEX)?;
    txn.open_table(DEVICE_MODEL_TABLE)?;
    txn.open_table(DEVICE_MODEL_EXTERNAL_ID_INDEX)?;
    txn.open_multimap_table(DEVICE_MODEL_CONTROLLED_PROPERTY)?;
    txn.open_table(DEVICE_TABLE)?;
    txn.open_table(DEVICE_EXTERNAL_ID_INDEX)?;
    txn.open_table(DEVICE_OBSERVATION_TABLE)?;
    txn.open_multimap_table(DEVICE_OBSERVATION_INDEX)?;
    Ok(())
}

pub(crate) fn next_id(table: &impl ReadableTable<u64, &'static str>) -> Result<u64> {
    Ok(table.last()?.map(|(key, _)| key.value() + 1).unwrap_or(1))
}

pub(crate) fn read_row<T: DeserializeOwned>(
    table: &impl ReadableTable<u64, &'static str>,
    id: u64,
) -> Result<Option<T>> {
    match table.get(id)? {
        Some(raw) => Ok(Some(serde_json::from_str(raw.value())?)),
        None => Ok(None),
    }
}

pub(crate) fn write_row<T: Serialize>(
    table: &mut Table<'_, u64, &'static str>,
    id: u64,
    row: &T,
) -> Result<()> {
    let json = serde_json::to_string(row)?;
    table.insert(id, json.as_str())?;
    Ok(())
}

pub(crate) fn lookup_id(
    index: &impl ReadableTable<&'static str, u64>,
    key: &str,
) -> Result<Option<u64>> {
    Ok(index.get(key)?.map(|id| id.value()))
}

/// Insert into a unique index, failing if the value is already taken.
pub(crate) fn claim_unique(
    index: &mut Table<'_, &'static str, u64>,
    column: &'static str,
    value: &str,
    id: u64,
) -> Result<()> {
    if index.get(value)?.is_some() {
        return Err(Error::Conflict {
            column,
            value: value.to_string(),
        });
    }
    index.insert(value, id)?;
    Ok(())
}
