//! NGSI-LD entity API for the device registry.
//!
//! [`DeviceContextSource`] adapts the device store to the generic
//! [`ContextSource`](ngsi::ContextSource) contract, and the axum router
//! exposes the registry's create, query, retrieve and patch operations.

pub mod context;
pub mod error;
pub mod handlers;
pub mod ngsi;
pub mod server;

pub use context::DeviceContextSource;
pub use error::{ApiResult, ErrorResponse};
pub use ngsi::{ContextRegistry, ContextSource, Entity, Query};
pub use server::{ServerState, create_router, run};
