use crate::dtos::{CreateApiKeyRequest, CreatedApiKeyResponse, ValidatedJson};
use crate::error::AppError;
use crate::middleware::TenantContext;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

/// POST /api-keys
///
/// The response carries the plaintext secret; it is never retrievable
/// again.
pub async fn create_api_key(
    State(state): State<AppState>,
    ctx: TenantContext,
    ValidatedJson(req): ValidatedJson<CreateApiKeyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let expires_at = req.expires_in_days.map(|days| Utc::now() + Duration::days(days));

    let issued = state
        .api_keys
        .issue(ctx.company_id, &req.name, expires_at)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedApiKeyResponse {
            api_key: issued.secret,
            api_key_record: issued.key,
        }),
    ))
}

/// GET /api-keys
pub async fn list_api_keys(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, AppError> {
    let api_keys = state.store.list_api_keys(ctx.company_id).await?;
    Ok(Json(json!({ "api_keys": api_keys })))
}

/// PATCH /api-keys/:id/revoke
pub async fn revoke_api_key(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(key_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let api_key = state
        .store
        .revoke_api_key(ctx.company_id, key_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("API key not found")))?;

    tracing::info!(api_key_id = %api_key.id, "API key revoked");

    Ok(Json(json!({ "api_key": api_key })))
}
