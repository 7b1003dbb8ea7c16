//! Observation ingest.
//!
//! A composite value such as `snow=23;t=4.5` or `on` is split into one
//! reading per token. Every token is validated before anything is written;
//! the readings are then appended in one transaction with a shared capture
//! instant.

use chrono::{DateTime, Duration, Utc};

use crate::catalog::STATE_PROPERTY;
use crate::error::{Error, Result};
use crate::model::{ControlledProperty, Observation};
use crate::registry::{load_device, load_model};
use crate::schema::{
    self, DEVICE_EXTERNAL_ID_INDEX, DEVICE_MODEL_CONTROLLED_PROPERTY, DEVICE_MODEL_TABLE,
    DEVICE_OBSERVATION_INDEX, DEVICE_OBSERVATION_TABLE, DEVICE_TABLE,
};
use crate::store::DeviceStore;

/// Separator between tokens of a composite value.
pub const TOKEN_SEPARATOR: char = ';';

/// Bare tokens accepted for the implicit state property.
pub const STATE_VALUES: [&str; 2] = ["on", "off"];

/// One `abbreviation=value` pair of a composite value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    /// Empty for a bare state token.
    pub abbreviation: String,
    pub value: String,
}

impl Reading {
    /// Name used in error messages.
    fn label(&self) -> &str {
        if self.abbreviation.is_empty() {
            STATE_PROPERTY
        } else {
            &self.abbreviation
        }
    }
}

/// Split a composite value into readings.
///
/// Keyed tokens split on the first `=`. Un-keyed tokens are only valid as
/// `on` or `off`.
pub fn parse_composite_value(raw: &str) -> Result<Vec<Reading>> {
    raw.split(TOKEN_SEPARATOR).map(parse_token).collect()
}

fn parse_token(token: &str) -> Result<Reading> {
    match token.split_once('=') {
        Some((abbreviation, value)) => Ok(Reading {
            abbreviation: abbreviation.to_string(),
            value: value.to_string(),
        }),
        None if STATE_VALUES.contains(&token) => Ok(Reading {
            abbreviation: String::new(),
            value: token.to_string(),
        }),
        None => Err(Error::Parse(format!(
            "unable to parse value token {token:?}: expected abbreviation=value, on or off"
        ))),
    }
}

/// Capture instant for a new report: now, but strictly after the previous one.
fn capture_instant(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(previous) if now <= previous => previous + Duration::microseconds(1),
        _ => now,
    }
}

impl DeviceStore {
    /// Append the readings of a composite value to a device's history.
    ///
    /// Returns the capture instant shared by every appended observation,
    /// which is also the device's new `last_reported_at`.
    pub fn record_value(&self, device_key: &str, raw_value: &str) -> Result<DateTime<Utc>> {
        let planned = self.validate_readings(device_key, raw_value)?;

        let write_txn = self.db().begin_write()?;
        let (device_id, observed_at) = {
            let index = write_txn.open_table(DEVICE_EXTERNAL_ID_INDEX)?;
            let mut devices = write_txn.open_table(DEVICE_TABLE)?;
            let mut observations = write_txn.open_table(DEVICE_OBSERVATION_TABLE)?;
            let mut history = write_txn.open_multimap_table(DEVICE_OBSERVATION_INDEX)?;

            let mut device = load_device(&index, &devices, device_key)?;
            let observed_at = capture_instant(device.last_reported_at);

            let mut next_id = schema::next_id(&observations)?;
            for (property, value) in planned {
                let observation = Observation {
                    id: next_id,
                    device_id: device.id,
                    controlled_property_id: property.id,
                    value,
                    observed_at,
                };
                schema::write_row(&mut observations, observation.id, &observation)?;
                history.insert(device.id, observation.id)?;
                next_id += 1;
            }

            device.last_reported_at = Some(observed_at);
            schema::write_row(&mut devices, device.id, &device)?;
            (device.id, observed_at)
        };
        write_txn.commit()?;

        tracing::debug!(
            device = device_key,
            device_id,
            observed_at = %observed_at,
            "Recorded device value"
        );
        Ok(observed_at)
    }

    /// Resolve every reading against the device's model property set.
    fn validate_readings(
        &self,
        device_key: &str,
        raw_value: &str,
    ) -> Result<Vec<(ControlledProperty, String)>> {
        let read_txn = self.db().begin_read()?;
        let index = read_txn.open_table(DEVICE_EXTERNAL_ID_INDEX)?;
        let devices = read_txn.open_table(DEVICE_TABLE)?;
        let models = read_txn.open_table(DEVICE_MODEL_TABLE)?;
        let links = read_txn.open_multimap_table(DEVICE_MODEL_CONTROLLED_PROPERTY)?;

        let device = load_device(&index, &devices, device_key)?;
        let model = load_model(&models, &links, self.catalog(), device.device_model_id)?
            .ok_or_else(|| {
                Error::Integrity(format!(
                    "device {} references missing device model {}",
                    device_key, device.device_model_id
                ))
            })?;

        let unsupported_error = |properties: Vec<String>| Error::UnsupportedProperty {
            subject: format!("device {device_key}"),
            properties,
        };

        // Tokens are checked in order. A parse failure ends the scan, and
        // reports the unsupported names seen before it if there are any.
        let mut planned = Vec::new();
        let mut unsupported: Vec<String> = Vec::new();
        for token in raw_value.split(TOKEN_SEPARATOR) {
            let reading = match parse_token(token) {
                Ok(reading) => reading,
                Err(_) if !unsupported.is_empty() => return Err(unsupported_error(unsupported)),
                Err(e) => return Err(e),
            };
            match model.property_by_abbreviation(&reading.abbreviation) {
                Some(property) => planned.push((property.clone(), reading.value)),
                None => {
                    let label = reading.label().to_string();
                    if !unsupported.contains(&label) {
                        unsupported.push(label);
                    }
                }
            }
        }
        if !unsupported.is_empty() {
            return Err(unsupported_error(unsupported));
        }
        Ok(planned)
    }

    /// Number of observations recorded for a device.
    pub fn observation_count(&self, device_key: &str) -> Result<u64> {
        let read_txn = self.db().begin_read()?;
        let index = read_txn.open_table(DEVICE_EXTERNAL_ID_INDEX)?;
        let history = read_txn.open_multimap_table(DEVICE_OBSERVATION_INDEX)?;

        let device_id = schema::lookup_id(&index, device_key)?
            .ok_or_else(|| Error::not_found("Device", device_key))?;
        let mut count = 0;
        for entry in history.get(device_id)? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Full observation history of a device, oldest first.
    pub fn observations_of(&self, device_key: &str) -> Result<Vec<Observation>> {
        let read_txn = self.db().begin_read()?;
        let index = read_txn.open_table(DEVICE_EXTERNAL_ID_INDEX)?;
        let history = read_txn.open_multimap_table(DEVICE_OBSERVATION_INDEX)?;
        let observations = read_txn.open_table(DEVICE_OBSERVATION_TABLE)?;

        let device_id = schema::lookup_id(&index, device_key)?
            .ok_or_else(|| Error::not_found("Device", device_key))?;
        crate::reconstruction::history_of(&history, &observations, device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(abbreviation: &str, value: &str) -> Reading {
        Reading {
            abbreviation: abbreviation.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_parse_keyed_tokens() {
        let readings = parse_composite_value("snow=23;t=4.5").unwrap();
        assert_eq!(readings, vec![reading("snow", "23"), reading("t", "4.5")]);
    }

    #[test]
    fn test_parse_splits_on_first_equals() {
        let readings = parse_composite_value("l=a=b").unwrap();
        assert_eq!(readings, vec![reading("l", "a=b")]);
    }

    #[test]
    fn test_parse_bare_state() {
        assert_eq!(parse_composite_value("on").unwrap(), vec![reading("", "on")]);
        assert_eq!(
            parse_composite_value("off;t=3").unwrap(),
            vec![reading("", "off"), reading("t", "3")]
        );
    }

    #[test]
    fn test_parse_rejects_unkeyed_tokens() {
        assert!(matches!(parse_composite_value("maybe"), Err(Error::Parse(_))));
        assert!(matches!(parse_composite_value("t=1;"), Err(Error::Parse(_))));
        assert!(matches!(parse_composite_value(""), Err(Error::Parse(_))));
    }

    #[test]
    fn test_capture_instant_is_strictly_increasing() {
        let future = Utc::now() + Duration::seconds(60);
        let next = capture_instant(Some(future));
        assert!(next > future);

        let past = Utc::now() - Duration::seconds(60);
        assert!(capture_instant(Some(past)) > past);
        assert!(capture_instant(None) <= Utc::now());
    }
}
