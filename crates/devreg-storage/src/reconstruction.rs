//! State reconstruction.
//!
//! The current value of a device is never stored. It is rebuilt from the
//! observation history by taking, per controlled property, the observation
//! with the latest `observed_at` (highest id on ties) and rendering those
//! in catalog order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use redb::{ReadableMultimapTable, ReadableTable};

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::model::{Device, DeviceState, Location, Observation};
use crate::registry::load_device;
use crate::schema::{
    self, DEVICE_EXTERNAL_ID_INDEX, DEVICE_OBSERVATION_INDEX, DEVICE_OBSERVATION_TABLE,
    DEVICE_TABLE,
};
use crate::store::DeviceStore;

/// Render ordered (abbreviation, value) pairs as a composite value.
///
/// Pairs with an empty abbreviation render as the bare value.
pub fn render_composite_value<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    pairs
        .into_iter()
        .map(|(abbreviation, value)| {
            if abbreviation.is_empty() {
                value.to_string()
            } else {
                format!("{abbreviation}={value}")
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Compatibility shim for rows seeded with latitude and longitude swapped.
///
/// Applied on read only. Remove once the stored coordinates are cleaned up.
pub fn correct_swapped_coordinates(location: Location) -> Location {
    if location.latitude > location.longitude {
        Location::new(location.longitude, location.latitude)
    } else {
        location
    }
}

impl DeviceStore {
    /// Current state of one device.
    pub fn current_state_of(&self, device_key: &str) -> Result<DeviceState> {
        let read_txn = self.db().begin_read()?;
        let index = read_txn.open_table(DEVICE_EXTERNAL_ID_INDEX)?;
        let devices = read_txn.open_table(DEVICE_TABLE)?;
        let history = read_txn.open_multimap_table(DEVICE_OBSERVATION_INDEX)?;
        let observations = read_txn.open_table(DEVICE_OBSERVATION_TABLE)?;

        let device = load_device(&index, &devices, device_key)?;
        reconstruct(self.catalog(), &history, &observations, device)
    }

    /// Stream the current state of every device, ordered by external id.
    ///
    /// Stops at the first error returned by `emit`. All devices are read
    /// from one snapshot.
    pub fn for_each_current_state<E, F>(&self, mut emit: F) -> std::result::Result<(), E>
    where
        E: From<Error>,
        F: FnMut(DeviceState) -> std::result::Result<(), E>,
    {
        let read_txn = self.db().begin_read().map_err(Error::from)?;
        let index = read_txn
            .open_table(DEVICE_EXTERNAL_ID_INDEX)
            .map_err(Error::from)?;
        let devices = read_txn.open_table(DEVICE_TABLE).map_err(Error::from)?;
        let history = read_txn
            .open_multimap_table(DEVICE_OBSERVATION_INDEX)
            .map_err(Error::from)?;
        let observations = read_txn
            .open_table(DEVICE_OBSERVATION_TABLE)
            .map_err(Error::from)?;

        for entry in index.iter().map_err(Error::from)? {
            let (external_id, id) = entry.map_err(Error::from)?;
            let device: Device = schema::read_row(&devices, id.value())?.ok_or_else(|| {
                Error::Integrity(format!(
                    "index entry for device {} has no row",
                    external_id.value()
                ))
            })?;
            emit(reconstruct(self.catalog(), &history, &observations, device)?)?;
        }
        Ok(())
    }

    /// Current state of every device, ordered by external id.
    pub fn current_state_of_all(&self) -> Result<Vec<DeviceState>> {
        let mut states = Vec::new();
        self.for_each_current_state(|state| {
            states.push(state);
            Ok::<(), Error>(())
        })?;
        Ok(states)
    }
}

pub(crate) fn history_of(
    history: &impl ReadableMultimapTable<u64, u64>,
    observations: &impl ReadableTable<u64, &'static str>,
    device_id: u64,
) -> Result<Vec<Observation>> {
    let mut result = Vec::new();
    for entry in history.get(device_id)? {
        let id = entry?.value();
        let observation = schema::read_row(observations, id)?
            .ok_or_else(|| Error::Integrity(format!("observation {id} is indexed but missing")))?;
        result.push(observation);
    }
    Ok(result)
}

fn reconstruct(
    catalog: &Catalog,
    history: &impl ReadableMultimapTable<u64, u64>,
    observations: &impl ReadableTable<u64, &'static str>,
    mut device: Device,
) -> Result<DeviceState> {
    let mut latest: HashMap<u64, (DateTime<Utc>, u64, String)> = HashMap::new();
    for observation in history_of(history, observations, device.id)? {
        let candidate = (observation.observed_at, observation.id);
        let newer = match latest.get(&observation.controlled_property_id) {
            Some((observed_at, id, _)) => candidate > (*observed_at, *id),
            None => true,
        };
        if newer {
            latest.insert(
                observation.controlled_property_id,
                (observation.observed_at, observation.id, observation.value),
            );
        }
    }

    let mut selected = Vec::with_capacity(latest.len());
    for (property_id, (_, _, value)) in latest {
        let position = catalog.position(property_id).ok_or_else(|| {
            Error::Integrity(format!(
                "observation for device {} references unknown controlled property {}",
                device.external_device_id, property_id
            ))
        })?;
        selected.push((position, value));
    }
    selected.sort_by_key(|(position, _)| *position);

    let all = catalog.all();
    let value = render_composite_value(
        selected
            .iter()
            .map(|(position, value)| (all[*position].abbreviation.as_str(), value.as_str())),
    );

    device.location = device.location.map(correct_swapped_coordinates);
    Ok(DeviceState { device, value })
}
