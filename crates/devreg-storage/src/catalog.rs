//! Catalog of controlled properties.
//!
//! The catalog is seeded once per store open from [`CATALOG_SEED`] and is
//! read-only afterwards, so the store keeps it in memory. Catalog order is
//! the row id order, which on a fresh store equals the seed order.

use redb::{ReadableTable, WriteTransaction};

use crate::error::{Error, Result};
use crate::model::ControlledProperty;
use crate::schema::{self, CONTROLLED_PROPERTY_NAME_INDEX, CONTROLLED_PROPERTY_TABLE, columns};

/// Name of the implicit property reported as a bare `on`/`off` token.
pub const STATE_PROPERTY: &str = "state";

/// Required properties as (name, abbreviation), in catalog order.
pub const CATALOG_SEED: &[(&str, &str)] = &[
    (STATE_PROPERTY, ""),
    ("fillingLevel", "l"),
    ("snowDepth", "snow"),
    ("temperature", "t"),
];

/// In-memory view of the controlled property table.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    properties: Vec<ControlledProperty>,
}

impl Catalog {
    pub fn lookup_by_name(&self, name: &str) -> Result<&ControlledProperty> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::not_found("ControlledProperty", name))
    }

    pub fn lookup_by_abbreviation(&self, abbreviation: &str) -> Result<&ControlledProperty> {
        self.properties
            .iter()
            .find(|p| p.abbreviation == abbreviation)
            .ok_or_else(|| Error::not_found("ControlledProperty", abbreviation))
    }

    pub fn get(&self, id: u64) -> Option<&ControlledProperty> {
        self.properties.iter().find(|p| p.id == id)
    }

    /// All properties in catalog order.
    pub fn all(&self) -> &[ControlledProperty] {
        &self.properties
    }

    /// Sort key used for deterministic output.
    pub fn position(&self, id: u64) -> Option<usize> {
        self.properties.iter().position(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Create missing seed rows, then load the whole table.
///
/// Existing rows are looked up by name and left untouched.
pub(crate) fn seed(txn: &WriteTransaction) -> Result<Catalog> {
    let mut table = txn.open_table(CONTROLLED_PROPERTY_TABLE)?;
    let mut names = txn.open_table(CONTROLLED_PROPERTY_NAME_INDEX)?;

    for &(name, abbreviation) in CATALOG_SEED {
        if schema::lookup_id(&names, name)?.is_some() {
            continue;
        }
        let id = schema::next_id(&table)?;
        schema::claim_unique(&mut names, columns::CONTROLLED_PROPERTY_NAME, name, id)?;
        let property = ControlledProperty {
            id,
            name: name.to_string(),
            abbreviation: abbreviation.to_string(),
        };
        schema::write_row(&mut table, id, &property)?;
        tracing::info!(id, name, abbreviation, "Seeded controlled property");
    }

    let mut properties = Vec::new();
    for entry in table.iter()? {
        let (_, raw) = entry?;
        properties.push(serde_json::from_str::<ControlledProperty>(raw.value())?);
    }
    Ok(Catalog { properties })
}
