use crate::dtos::{UpdateSettingsRequest, ValidatedJson};
use crate::error::AppError;
use crate::middleware::TenantContext;
use crate::models::{EffectiveSettings, UpdateBillingSettings};
use crate::startup::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

/// GET /settings
///
/// Returns the documented defaults when the tenant has no settings row yet.
pub async fn get_settings(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, AppError> {
    let settings = EffectiveSettings::from_stored(state.store.get_settings(ctx.company_id).await?);
    Ok(Json(json!({ "settings": settings })))
}

/// PATCH /settings
pub async fn update_settings(
    State(state): State<AppState>,
    ctx: TenantContext,
    ValidatedJson(req): ValidatedJson<UpdateSettingsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let settings = state
        .store
        .upsert_settings(
            ctx.company_id,
            &UpdateBillingSettings {
                tax_rate: req.tax_rate,
                currency: req.currency,
                invoice_prefix: req.invoice_prefix,
                payment_terms_days: req.payment_terms_days,
                webhook_url: req.webhook_url,
            },
        )
        .await?;

    tracing::info!(company_id = %ctx.company_id, "Billing settings updated");

    Ok(Json(json!({ "settings": settings })))
}
