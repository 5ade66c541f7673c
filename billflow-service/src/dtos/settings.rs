use crate::dtos::validation::validate_tax_rate;
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

/// Partial settings update; absent fields keep their stored value.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSettingsRequest {
    #[validate(custom(function = validate_tax_rate))]
    pub tax_rate: Option<Decimal>,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,

    #[validate(length(min = 1, max = 10, message = "Invoice prefix must be 1-10 characters"))]
    pub invoice_prefix: Option<String>,

    #[validate(range(min = 1, max = 365, message = "Payment terms must be 1-365 days"))]
    pub payment_terms_days: Option<i32>,

    #[validate(url(message = "Webhook URL must be a valid URL"))]
    pub webhook_url: Option<String>,
}
