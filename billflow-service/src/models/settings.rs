//! Tenant billing settings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-tenant billing defaults, one row per company.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BillingSettings {
    pub id: Uuid,
    pub company_id: Uuid,
    pub tax_rate: Decimal,
    pub currency: String,
    pub invoice_prefix: String,
    pub payment_terms_days: i32,
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateBillingSettings {
    pub tax_rate: Option<Decimal>,
    pub currency: Option<String>,
    pub invoice_prefix: Option<String>,
    pub payment_terms_days: Option<i32>,
    pub webhook_url: Option<String>,
}

/// Settings as consumed by billing workflows: stored values when a row
/// exists, documented defaults otherwise (tax 0, USD, "INV", 30 days).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveSettings {
    pub tax_rate: Decimal,
    pub currency: String,
    pub invoice_prefix: String,
    pub payment_terms_days: i32,
    pub webhook_url: Option<String>,
}

impl EffectiveSettings {
    pub fn from_stored(settings: Option<BillingSettings>) -> Self {
        match settings {
            Some(s) => EffectiveSettings {
                tax_rate: s.tax_rate,
                currency: s.currency,
                invoice_prefix: s.invoice_prefix,
                payment_terms_days: s.payment_terms_days,
                webhook_url: s.webhook_url,
            },
            None => EffectiveSettings::default(),
        }
    }
}

impl Default for EffectiveSettings {
    fn default() -> Self {
        EffectiveSettings {
            tax_rate: Decimal::ZERO,
            currency: "USD".to_string(),
            invoice_prefix: "INV".to_string(),
            payment_terms_days: 30,
            webhook_url: None,
        }
    }
}
