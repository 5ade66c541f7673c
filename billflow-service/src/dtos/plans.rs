use crate::dtos::validation::{validate_interval, validate_non_negative};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

/// Create-plan request. `currency` defaults to USD when omitted.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePlanRequest {
    #[validate(length(min = 1, max = 120, message = "Name is required"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description is too long"))]
    pub description: Option<String>,

    #[validate(custom(function = validate_non_negative))]
    pub price: Decimal,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,

    #[validate(custom(function = validate_interval))]
    pub interval: String,

    pub features: Option<serde_json::Value>,
}
