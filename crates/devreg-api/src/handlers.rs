//! HTTP handlers for the NGSI-LD entity endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::Value;

use devreg_core::Result;

use crate::error::{ApiResult, ErrorResponse};
use crate::ngsi::{self, Entity, QueryParams};
use crate::server::ServerState;

/// Base path of the entity endpoints.
pub const ENTITIES_PATH: &str = "/ngsi-ld/v1/entities";

/// Run a blocking store operation off the async runtime.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

fn required_str<'a>(body: &'a Value, field: &str) -> ApiResult<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ErrorResponse::bad_request(format!("entity body requires a \"{field}\"")))
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: &'static str,
    pub uptime: u64,
}

/// Health probe.
pub async fn health_handler(State(state): State<ServerState>) -> Json<HealthStatus> {
    let uptime = chrono::Utc::now().timestamp() - state.started_at;

    Json(HealthStatus {
        status: "ok".to_string(),
        service: "devreg".to_string(),
        version: env!("CARGO_PKG_VERSION"),
        uptime: uptime.max(0) as u64,
    })
}

/// `POST /ngsi-ld/v1/entities`
pub async fn create_entity_handler(
    State(state): State<ServerState>,
    Json(body): Json<Value>,
) -> ApiResult<impl IntoResponse> {
    let entity_type = required_str(&body, "type")?.to_string();
    let entity_id = required_str(&body, "id")?.to_string();

    let registry = state.registry.clone();
    let id = entity_id.clone();
    blocking(move || registry.create_entity(&entity_type, &id, &body)).await?;

    let location = format!("{ENTITIES_PATH}/{entity_id}");
    Ok((StatusCode::CREATED, [(header::LOCATION, location)]))
}

/// `GET /ngsi-ld/v1/entities?type=..&attrs=..`
pub async fn query_entities_handler(
    State(state): State<ServerState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Vec<Entity>>> {
    let query = ngsi::Query::try_from(&params)?;

    let registry = state.registry.clone();
    let entities = blocking(move || registry.collect_entities(&query)).await?;
    tracing::debug!(count = entities.len(), "Queried entities");
    Ok(Json(entities))
}

/// `GET /ngsi-ld/v1/entities/:entity`
pub async fn retrieve_entity_handler(
    State(state): State<ServerState>,
    Path(entity_id): Path<String>,
) -> ApiResult<Json<Entity>> {
    let registry = state.registry.clone();
    let entity = blocking(move || registry.retrieve_entity(&entity_id)).await?;
    Ok(Json(entity))
}

/// `PATCH /ngsi-ld/v1/entities/:entity/attrs`
pub async fn update_entity_attributes_handler(
    State(state): State<ServerState>,
    Path(entity_id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<StatusCode> {
    let registry = state.registry.clone();
    blocking(move || registry.update_entity_attributes(&entity_id, &body)).await?;
    Ok(StatusCode::NO_CONTENT)
}
