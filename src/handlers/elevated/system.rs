// handlers/elevated/system.rs - /api/admin/system/* handlers

use axum::extract::{rejection::JsonRejection, State};
use axum::{Extension, Json};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::SystemState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::progression::TermCloseSummary;

#[derive(Debug, Deserialize)]
pub struct SystemStateRequest {
    pub maintenance: bool,
}

/// POST /api/admin/system/end-quarter - close the term for every student
pub async fn end_quarter(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<TermCloseSummary> {
    tracing::info!("Term close requested by '{}'", auth.sub);
    let summary = state.progression.close_term().await?;
    Ok(ApiResponse::success(summary))
}

/// GET /api/admin/system/state
pub async fn state_get(State(state): State<AppState>) -> ApiResult<SystemState> {
    Ok(ApiResponse::success(state.system.state().await?))
}

/// PATCH /api/admin/system/state - `{ "maintenance": true | false }`
pub async fn state_patch(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<SystemStateRequest>, JsonRejection>,
) -> ApiResult<SystemState> {
    let Json(request) = body?;
    tracing::info!("System maintenance={} requested by '{}'", request.maintenance, auth.sub);
    Ok(ApiResponse::success(state.system.set_maintenance(request.maintenance).await?))
}
