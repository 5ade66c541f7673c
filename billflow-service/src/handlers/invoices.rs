use crate::dtos::{GenerateInvoiceRequest, InvoiceDetail, ListInvoicesQuery, ValidatedJson};
use crate::error::AppError;
use crate::middleware::TenantContext;
use crate::models::InvoiceStatus;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

/// POST /invoices
pub async fn generate_invoice(
    State(state): State<AppState>,
    ctx: TenantContext,
    ValidatedJson(req): ValidatedJson<GenerateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (invoice, item) = state
        .billing
        .generate_invoice(ctx.company_id, req.subscription_id)
        .await?;

    tracing::info!(
        invoice_id = %invoice.id,
        invoice_number = %invoice.invoice_number,
        total = %invoice.total,
        "Invoice generated"
    );

    Ok((
        StatusCode::CREATED,
        Json(InvoiceDetail {
            invoice,
            items: vec![item],
        }),
    ))
}

/// GET /invoices
pub async fn list_invoices(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<impl IntoResponse, AppError> {
    query.validate()?;
    let status = query.status.as_deref().map(InvoiceStatus::from_string);

    let invoices = state.store.list_invoices(ctx.company_id, status).await?;
    Ok(Json(json!({ "invoices": invoices })))
}

/// GET /invoices/:id
pub async fn get_invoice(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state
        .store
        .get_invoice(ctx.company_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;
    let items = state.store.list_invoice_items(invoice.id).await?;

    Ok(Json(InvoiceDetail { invoice, items }))
}
