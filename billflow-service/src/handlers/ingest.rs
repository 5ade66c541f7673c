use crate::dtos::{RecordUsageRequest, ValidatedJson};
use crate::error::AppError;
use crate::middleware::ApiKeyIdentity;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// POST /v1/usage
///
/// Machine-facing twin of the dashboard usage route; the tenant comes from
/// the presented API key instead of a session.
pub async fn ingest_usage(
    State(state): State<AppState>,
    identity: ApiKeyIdentity,
    ValidatedJson(req): ValidatedJson<RecordUsageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .billing
        .record_usage(
            identity.company_id,
            req.subscription_id,
            req.metric_name,
            req.quantity,
            "api_key",
        )
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "usage_record": record }))))
}
