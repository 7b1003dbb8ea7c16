//! Device-state storage and reconstruction.
//!
//! Holds the catalog of controlled properties, the device model registry,
//! devices, and their append-only observation history in a redb database.
//! The "current value" of a device is never stored; it is rebuilt from the
//! history on every read.

pub mod catalog;
pub mod error;
pub mod ingest;
pub mod model;
pub mod reconstruction;
pub mod registry;
pub mod schema;
pub mod store;

pub use catalog::{CATALOG_SEED, Catalog, STATE_PROPERTY};
pub use error::{Error, Result};
pub use ingest::{Reading, parse_composite_value};
pub use model::{
    ControlledProperty, Device, DeviceModel, DeviceModelMetadata, DeviceState, Location,
    Observation,
};
pub use reconstruction::{correct_swapped_coordinates, render_composite_value};
pub use store::DeviceStore;
