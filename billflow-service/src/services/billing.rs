//! Billing workflows: subscription lifecycle, invoice generation, and the
//! demo payment flow.

use crate::error::AppError;
use crate::models::{
    CreateInvoice, CreateInvoiceItem, CreatePayment, CreateSubscription, EffectiveSettings,
    Invoice, InvoiceItem, InvoiceStatus, Payment, PaymentStatus, PlanInterval, RecordUsage,
    RecordWebhook, Subscription, SubscriptionStatus, UsageRecord,
};
use crate::services::metrics::{
    record_invoice_generated, record_payment_recorded, record_usage_ingested,
};
use crate::store::BillingStore;
use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

const NUMBERING_ATTEMPTS: u32 = 3;

/// Subtotal, tax and total for one invoice. `total` is exact; only the tax
/// is rounded (to 4 decimal places, banker's rounding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceAmounts {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Compute invoice amounts from a plan price and a percentage tax rate.
pub fn compute_invoice_amounts(price: Decimal, tax_rate: Decimal) -> InvoiceAmounts {
    let subtotal = price;
    let tax = (subtotal * tax_rate / Decimal::from(100)).round_dp(4);
    InvoiceAmounts {
        subtotal,
        tax,
        total: subtotal + tax,
    }
}

/// Build an invoice number: tenant prefix, the last six digits of the
/// caller's epoch-millis clock, and the first eight hex digits of the
/// subscription id, uppercased. Uniqueness is enforced by the store; on a
/// collision the caller regenerates with a fresh clock reading.
pub fn build_invoice_number(prefix: &str, subscription_id: Uuid, epoch_millis: i64) -> String {
    let millis = epoch_millis.to_string();
    let suffix = &millis[millis.len().saturating_sub(6)..];
    let sub_hex = subscription_id.simple().to_string();
    format!("{}-{}-{}", prefix, suffix, sub_hex[..8].to_uppercase())
}

/// End of the billing period starting at `start`: one calendar month or
/// twelve, clamped to the last day of the target month (Jan 31 -> Feb 28).
pub fn period_end_for(start: DateTime<Utc>, interval: PlanInterval) -> DateTime<Utc> {
    let months = match interval {
        PlanInterval::Month => 1,
        PlanInterval::Year => 12,
    };
    start
        .checked_add_months(Months::new(months))
        .unwrap_or_else(|| start + Duration::days(30 * i64::from(months)))
}

/// Orchestrates billing operations on top of the store.
#[derive(Clone)]
pub struct BillingService {
    store: Arc<dyn BillingStore>,
}

impl BillingService {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    /// Enroll a user in a plan. The period starts now and ends one interval
    /// later; the subscription is active immediately.
    #[instrument(skip(self), fields(company_id = %company_id, plan_id = %plan_id))]
    pub async fn create_subscription(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Subscription, AppError> {
        let plan = self
            .store
            .get_plan(company_id, plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Plan not found")))?;

        if !plan.is_active {
            return Err(AppError::BadRequest(anyhow::anyhow!("Plan is not active")));
        }

        self.store
            .get_user(company_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

        let start = Utc::now();
        let subscription = self
            .store
            .create_subscription(&CreateSubscription {
                company_id,
                plan_id: plan.id,
                user_id,
                status: SubscriptionStatus::Active,
                current_period_start: start,
                current_period_end: period_end_for(start, PlanInterval::from_string(&plan.interval)),
            })
            .await?;

        Ok(subscription)
    }

    /// Cancel a subscription immediately. Repeat cancels return the same
    /// terminal state.
    #[instrument(skip(self), fields(company_id = %company_id, subscription_id = %subscription_id))]
    pub async fn cancel_subscription(
        &self,
        company_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<Subscription, AppError> {
        self.store
            .cancel_subscription(company_id, subscription_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Subscription not found")))
    }

    /// Generate an open invoice for a subscription. Without an explicit
    /// subscription id the tenant's oldest active subscription is billed.
    #[instrument(skip(self), fields(company_id = %company_id))]
    pub async fn generate_invoice(
        &self,
        company_id: Uuid,
        subscription_id: Option<Uuid>,
    ) -> Result<(Invoice, InvoiceItem), AppError> {
        let subscription = self.resolve_subscription(company_id, subscription_id).await?;

        let plan = self
            .store
            .get_plan(company_id, subscription.plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Plan not found")))?;

        let settings = EffectiveSettings::from_stored(self.store.get_settings(company_id).await?);
        let amounts = compute_invoice_amounts(plan.price, settings.tax_rate);
        let due_date = Utc::now() + Duration::days(i64::from(settings.payment_terms_days));

        let interval_label = match PlanInterval::from_string(&plan.interval) {
            PlanInterval::Month => "Monthly",
            PlanInterval::Year => "Yearly",
        };
        let item = CreateInvoiceItem {
            description: format!("{} - {} Subscription", plan.name, interval_label),
            quantity: Decimal::ONE,
            unit_price: plan.price,
            amount: amounts.subtotal,
        };

        let mut attempt = 0;
        let (invoice, item) = loop {
            let input = CreateInvoice {
                company_id,
                subscription_id: subscription.id,
                invoice_number: build_invoice_number(
                    &settings.invoice_prefix,
                    subscription.id,
                    Utc::now().timestamp_millis(),
                ),
                status: InvoiceStatus::Open,
                subtotal: amounts.subtotal,
                tax: amounts.tax,
                total: amounts.total,
                // Invoices are denominated in the plan's currency.
                currency: plan.currency.clone(),
                due_date,
            };

            match self.store.create_invoice_with_item(&input, &item).await {
                Ok(created) => break created,
                Err(e) if e.is_conflict() => {
                    attempt += 1;
                    if attempt >= NUMBERING_ATTEMPTS {
                        return Err(AppError::InternalError(anyhow::anyhow!(
                            "Failed to generate a unique invoice number after {} attempts",
                            NUMBERING_ATTEMPTS
                        )));
                    }
                    warn!(
                        company_id = %company_id,
                        attempt = attempt,
                        "Invoice number collision, regenerating"
                    );
                }
                Err(e) => return Err(e),
            }
        };

        record_invoice_generated(&company_id.to_string());
        if settings.webhook_url.is_some() {
            self.log_webhook(
                company_id,
                "invoice.created",
                serde_json::json!({
                    "invoice_id": invoice.id,
                    "invoice_number": invoice.invoice_number,
                    "amount": invoice.total,
                    "currency": invoice.currency,
                }),
            )
            .await;
        }

        Ok((invoice, item))
    }

    /// Record a simulated payment for an open invoice and mark it paid.
    #[instrument(skip(self), fields(company_id = %company_id, invoice_id = %invoice_id))]
    pub async fn pay_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<(Invoice, Payment), AppError> {
        let invoice = self
            .store
            .get_invoice(company_id, invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        if invoice.is_paid() {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "Invoice already paid"
            )));
        }

        let input = CreatePayment {
            amount: invoice.total,
            currency: invoice.currency.clone(),
            status: PaymentStatus::Completed,
            payment_method: "demo_card".to_string(),
            transaction_id: format!("txn_{}", Utc::now().timestamp_millis()),
        };

        let Some((paid, payment)) = self
            .store
            .pay_invoice(company_id, invoice_id, &input, Utc::now())
            .await?
        else {
            // Another request won the status flip between our read and the
            // guarded update.
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "Invoice already paid"
            )));
        };

        record_payment_recorded(&company_id.to_string());
        // The payment is committed; from here on everything is best-effort.
        let settings =
            EffectiveSettings::from_stored(self.store.get_settings(company_id).await.ok().flatten());
        if settings.webhook_url.is_some() {
            self.log_webhook(
                company_id,
                "payment.completed",
                serde_json::json!({
                    "invoice_id": paid.id,
                    "payment_id": payment.id,
                    "amount": payment.amount,
                    "currency": payment.currency,
                }),
            )
            .await;
        }

        Ok((paid, payment))
    }

    /// Append a usage record. Without an explicit subscription id the
    /// tenant's oldest active subscription is metered. `source` labels the
    /// ingestion path ("dashboard" or "api_key") for metrics.
    #[instrument(skip(self), fields(company_id = %company_id))]
    pub async fn record_usage(
        &self,
        company_id: Uuid,
        subscription_id: Option<Uuid>,
        metric_name: String,
        quantity: Decimal,
        source: &str,
    ) -> Result<UsageRecord, AppError> {
        let subscription = self.resolve_subscription(company_id, subscription_id).await?;

        let record = self
            .store
            .record_usage(&RecordUsage {
                company_id,
                subscription_id: subscription.id,
                metric_name,
                quantity,
            })
            .await?;

        record_usage_ingested(&company_id.to_string(), source);
        Ok(record)
    }

    async fn resolve_subscription(
        &self,
        company_id: Uuid,
        subscription_id: Option<Uuid>,
    ) -> Result<Subscription, AppError> {
        if let Some(id) = subscription_id {
            return self
                .store
                .get_subscription(company_id, id)
                .await?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Subscription not found")));
        }

        if let Some(subscription) = self.store.first_active_subscription(company_id).await? {
            return Ok(subscription);
        }

        if self.store.count_subscriptions(company_id).await? == 0 {
            Err(AppError::NotFound(anyhow::anyhow!(
                "No subscriptions found. Please create a subscription first."
            )))
        } else {
            Err(AppError::NotFound(anyhow::anyhow!(
                "No active subscription found. Please activate a subscription first."
            )))
        }
    }

    /// Append an event to the webhook log. Failures are logged and
    /// swallowed; the billing operation already committed.
    async fn log_webhook(&self, company_id: Uuid, event_type: &str, payload: serde_json::Value) {
        let result = self
            .store
            .record_webhook(&RecordWebhook {
                company_id,
                event_type: event_type.to_string(),
                payload,
            })
            .await;

        if let Err(e) = result {
            warn!(
                company_id = %company_id,
                event_type = event_type,
                error = %e,
                "Failed to record webhook event"
            );
        }
    }
}
