use crate::dtos::{PayInvoiceRequest, PaymentOutcome, ValidatedJson};
use crate::error::AppError;
use crate::middleware::TenantContext;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// POST /payments
pub async fn pay_invoice(
    State(state): State<AppState>,
    ctx: TenantContext,
    ValidatedJson(req): ValidatedJson<PayInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (invoice, payment) = state
        .billing
        .pay_invoice(ctx.company_id, req.invoice_id)
        .await?;

    tracing::info!(
        invoice_id = %invoice.id,
        payment_id = %payment.id,
        amount = %payment.amount,
        "Payment recorded"
    );

    Ok((StatusCode::CREATED, Json(PaymentOutcome { payment, invoice })))
}

/// GET /payments
pub async fn list_payments(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, AppError> {
    let payments = state.store.list_payments(ctx.company_id).await?;
    Ok(Json(json!({ "payments": payments })))
}
