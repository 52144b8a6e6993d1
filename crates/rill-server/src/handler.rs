use axum::extract::{Path, Query, State};
use axum::response::Json;
use bytes::Bytes;
use rill_events::Status;
use rill_pipeline::Pipeline;
use rill_store::TableRecord;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ServerError, ServerResult};

/// Query string of an ingest request. Both fields are validated by the
/// ingress so that rejected requests still get a diagnostic line.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IngestParams {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub id: String,
    pub status: Status,
    pub source: String,
    /// `update`, `delete`, or `filter (...)`.
    pub outcome: String,
    /// The diagnostic line recorded for this request.
    pub line: String,
}

/// Health check handler.
pub async fn health_handler(State(pipeline): State<Pipeline>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "in_flight": pipeline.dispatcher().in_flight(),
    }))
}

/// Submit one record to an ingress endpoint.
pub async fn ingest_handler(
    State(pipeline): State<Pipeline>,
    Path(endpoint): Path<String>,
    Query(params): Query<IngestParams>,
    body: Bytes,
) -> ServerResult<Json<IngestResponse>> {
    let ingress = pipeline
        .ingress(&endpoint)
        .ok_or(ServerError::UnknownEndpoint(endpoint))?;
    let IngestParams { id, status } = params;

    let receipt = tokio::task::spawn_blocking(move || ingress.submit(&id, &status, &body))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    let outcome = receipt.outcome?;

    Ok(Json(IngestResponse {
        id: receipt.context.id,
        status: receipt.context.status,
        source: receipt.context.source.to_string(),
        outcome: outcome.to_string(),
        line: receipt.line,
    }))
}

/// Every record of one table, tombstones included.
pub async fn table_handler(
    State(pipeline): State<Pipeline>,
    Path(name): Path<String>,
) -> ServerResult<Json<Vec<TableRecord>>> {
    let table = pipeline
        .table(&name)
        .cloned()
        .ok_or(ServerError::UnknownTable(name))?;
    let records = tokio::task::spawn_blocking(move || table.records())
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;
    Ok(Json(records))
}
