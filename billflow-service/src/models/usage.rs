//! Usage metering models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One metered event against a subscription. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageRecord {
    pub id: Uuid,
    pub company_id: Uuid,
    pub subscription_id: Uuid,
    pub metric_name: String,
    pub quantity: Decimal,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Input for appending a usage record.
#[derive(Debug, Clone)]
pub struct RecordUsage {
    pub company_id: Uuid,
    pub subscription_id: Uuid,
    pub metric_name: String,
    pub quantity: Decimal,
}

/// Read-time aggregate over a tenant's usage records for one metric.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageMetricSummary {
    pub metric_name: String,
    pub total: Decimal,
    pub average: Decimal,
    pub minimum: Decimal,
    pub maximum: Decimal,
    pub count: i64,
}
