use crate::dtos::validation::validate_non_negative;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Record-usage request, accepted from both the dashboard session route and
/// the API key ingestion route. Without a subscription id the tenant's
/// oldest active subscription is metered.
#[derive(Debug, Deserialize, Validate)]
pub struct RecordUsageRequest {
    pub subscription_id: Option<Uuid>,

    #[validate(length(min = 1, max = 100, message = "Metric name is required"))]
    pub metric_name: String,

    #[validate(custom(function = validate_non_negative))]
    pub quantity: Decimal,
}

/// Usage list filter.
#[derive(Debug, Deserialize, Validate)]
pub struct UsageListQuery {
    pub subscription_id: Option<Uuid>,

    #[validate(range(min = 1, max = 1000, message = "Limit must be between 1 and 1000"))]
    pub limit: Option<i64>,
}
