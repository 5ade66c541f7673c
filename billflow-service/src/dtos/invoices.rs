use crate::dtos::validation::validate_invoice_status;
use crate::models::{Invoice, InvoiceItem, Payment};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Generate-invoice request. Without a subscription id the tenant's oldest
/// active subscription is billed.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateInvoiceRequest {
    pub subscription_id: Option<Uuid>,
}

/// Invoice list filter.
#[derive(Debug, Deserialize, Validate)]
pub struct ListInvoicesQuery {
    #[validate(custom(function = validate_invoice_status))]
    pub status: Option<String>,
}

/// Pay-invoice request.
#[derive(Debug, Deserialize, Validate)]
pub struct PayInvoiceRequest {
    pub invoice_id: Uuid,
}

/// An invoice together with its line items.
#[derive(Debug, Serialize)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

/// Result of paying an invoice.
#[derive(Debug, Serialize)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub invoice: Invoice,
}
