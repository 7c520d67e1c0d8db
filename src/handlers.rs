// src/handlers.rs

use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct GstinCheckRequest {
    #[serde(default)]
    pub gstin: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GstinCheckResponse {
    pub success: bool,
    pub data: Value,
    pub meta: LookupMeta,
}

#[derive(Debug, Serialize)]
pub struct LookupMeta {
    pub used_key_index: usize,
    pub used_key_label: String,
}

/// Liveness probe.
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Looks up a GSTIN with every configured key slot in order.
///
/// An empty or missing GSTIN is rejected before any network call. Exhaustion
/// of all keys surfaces as the aggregated 502 error body.
pub async fn check_gstin(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GstinCheckRequest>,
) -> Result<Json<GstinCheckResponse>> {
    let gstin = request.gstin.as_deref().unwrap_or("").trim().to_string();
    if gstin.is_empty() {
        return Err(AppError::MissingGstin);
    }

    info!(gstin = %gstin, "Handling GSTIN check request");

    let success = state.lookup.lookup(&state.config.api_keys, &gstin).await?;

    Ok(Json(GstinCheckResponse {
        success: true,
        data: success.result,
        meta: LookupMeta {
            used_key_index: success.used_key_index,
            used_key_label: success.used_key_label,
        },
    }))
}
