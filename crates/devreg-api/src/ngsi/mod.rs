//! NGSI-LD protocol surface: wire types, queries and context sources.

pub mod entity;
pub mod query;
pub mod registry;

pub use entity::{
    DEVICE_ID_PREFIX, DEVICE_MODEL_ID_PREFIX, DEVICE_MODEL_TYPE, DEVICE_TYPE, DateTimeProperty,
    DeviceAttributes, DeviceEntity, DeviceModelEntity, Entity, GeoProperty, Property, Relationship,
};
pub use query::{Query, QueryParams};
pub use registry::{ContextRegistry, ContextSource, EmitEntity};
