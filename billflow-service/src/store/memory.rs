//! In-memory store backend.
//!
//! Backs the dev profile and the integration test harness. Mirrors the
//! PostgreSQL backend's observable semantics: uniqueness violations come
//! back as `Conflict`, paying an invoice is guarded on its status, and
//! cancel/revoke are idempotent.

use crate::error::AppError;
use crate::models::{
    ApiKey, BillingSettings, Company, CreateApiKey, CreateCompany, CreateInvoice,
    CreateInvoiceItem, CreatePayment, CreatePlan, CreateSubscription, CreateUser,
    EffectiveSettings, Invoice, InvoiceItem, InvoiceStatus, Payment, Plan, RecordUsage,
    RecordWebhook, Subscription, SubscriptionStatus, UpdateBillingSettings, UsageMetricSummary,
    UsageRecord, User, Webhook, WebhookStatus,
};
use crate::store::BillingStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    companies: HashMap<Uuid, Company>,
    users: HashMap<Uuid, User>,
    plans: HashMap<Uuid, Plan>,
    subscriptions: HashMap<Uuid, Subscription>,
    invoices: HashMap<Uuid, Invoice>,
    invoice_items: HashMap<Uuid, InvoiceItem>,
    payments: HashMap<Uuid, Payment>,
    usage_records: HashMap<Uuid, UsageRecord>,
    api_keys: HashMap<Uuid, ApiKey>,
    settings: HashMap<Uuid, BillingSettings>,
    webhooks: HashMap<Uuid, Webhook>,
}

/// Map-backed implementation of [`BillingStore`].
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn conflict() -> AppError {
    AppError::Conflict(anyhow::anyhow!("Record already exists"))
}

#[async_trait]
impl BillingStore for MemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    // =========================================================================
    // Companies & users
    // =========================================================================

    async fn create_company(&self, input: &CreateCompany) -> Result<Company, AppError> {
        let mut state = self.state.write().await;
        if state.companies.values().any(|c| c.slug == input.slug) {
            return Err(conflict());
        }
        let now = Utc::now();
        let company = Company {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            slug: input.slug.clone(),
            created_at: now,
            updated_at: now,
        };
        state.companies.insert(company.id, company.clone());
        Ok(company)
    }

    async fn find_company_by_slug(&self, slug: &str) -> Result<Option<Company>, AppError> {
        let state = self.state.read().await;
        Ok(state.companies.values().find(|c| c.slug == slug).cloned())
    }

    async fn create_user(&self, input: &CreateUser) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|u| u.company_id == input.company_id && u.email == input.email)
        {
            return Err(conflict());
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            company_id: input.company_id,
            email: input.email.clone(),
            name: input.name.clone(),
            role: input.role.as_str().to_string(),
            password_hash: input.password_hash.clone(),
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>, AppError> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| u.email == email)
            .cloned()
            .collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn get_user(&self, company_id: Uuid, user_id: Uuid) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .get(&user_id)
            .filter(|u| u.company_id == company_id)
            .cloned())
    }

    // =========================================================================
    // Plans
    // =========================================================================

    async fn create_plan(&self, input: &CreatePlan) -> Result<Plan, AppError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let plan = Plan {
            id: Uuid::new_v4(),
            company_id: input.company_id,
            name: input.name.clone(),
            description: input.description.clone(),
            price: input.price,
            currency: input.currency.clone(),
            interval: input.interval.as_str().to_string(),
            features: input.features.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.plans.insert(plan.id, plan.clone());
        Ok(plan)
    }

    async fn get_plan(&self, company_id: Uuid, plan_id: Uuid) -> Result<Option<Plan>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .plans
            .get(&plan_id)
            .filter(|p| p.company_id == company_id)
            .cloned())
    }

    async fn list_plans(&self, company_id: Uuid) -> Result<Vec<Plan>, AppError> {
        let state = self.state.read().await;
        let mut plans: Vec<Plan> = state
            .plans
            .values()
            .filter(|p| p.company_id == company_id && p.is_active)
            .cloned()
            .collect();
        plans.sort_by(|a, b| {
            a.price
                .cmp(&b.price)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(plans)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    async fn create_subscription(
        &self,
        input: &CreateSubscription,
    ) -> Result<Subscription, AppError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let subscription = Subscription {
            id: Uuid::new_v4(),
            company_id: input.company_id,
            plan_id: input.plan_id,
            user_id: input.user_id,
            status: input.status.as_str().to_string(),
            current_period_start: input.current_period_start,
            current_period_end: input.current_period_end,
            cancel_at_period_end: false,
            created_at: now,
            updated_at: now,
        };
        state.subscriptions.insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn get_subscription(
        &self,
        company_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .get(&subscription_id)
            .filter(|s| s.company_id == company_id)
            .cloned())
    }

    async fn first_active_subscription(
        &self,
        company_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .values()
            .filter(|s| s.company_id == company_id && s.is_active())
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn count_subscriptions(&self, company_id: Uuid) -> Result<i64, AppError> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .values()
            .filter(|s| s.company_id == company_id)
            .count() as i64)
    }

    async fn list_subscriptions(&self, company_id: Uuid) -> Result<Vec<Subscription>, AppError> {
        let state = self.state.read().await;
        let mut subscriptions: Vec<Subscription> = state
            .subscriptions
            .values()
            .filter(|s| s.company_id == company_id)
            .cloned()
            .collect();
        subscriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(subscriptions)
    }

    async fn cancel_subscription(
        &self,
        company_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        let mut state = self.state.write().await;
        let Some(subscription) = state
            .subscriptions
            .get_mut(&subscription_id)
            .filter(|s| s.company_id == company_id)
        else {
            return Ok(None);
        };
        subscription.status = SubscriptionStatus::Canceled.as_str().to_string();
        subscription.cancel_at_period_end = false;
        subscription.updated_at = Utc::now();
        Ok(Some(subscription.clone()))
    }

    // =========================================================================
    // Invoices
    // =========================================================================

    async fn create_invoice_with_item(
        &self,
        invoice: &CreateInvoice,
        item: &CreateInvoiceItem,
    ) -> Result<(Invoice, InvoiceItem), AppError> {
        let mut state = self.state.write().await;
        if state
            .invoices
            .values()
            .any(|i| i.invoice_number == invoice.invoice_number)
        {
            return Err(conflict());
        }
        let now = Utc::now();
        let created = Invoice {
            id: Uuid::new_v4(),
            company_id: invoice.company_id,
            subscription_id: invoice.subscription_id,
            invoice_number: invoice.invoice_number.clone(),
            status: invoice.status.as_str().to_string(),
            subtotal: invoice.subtotal,
            tax: invoice.tax,
            total: invoice.total,
            currency: invoice.currency.clone(),
            due_date: invoice.due_date,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        let created_item = InvoiceItem {
            id: Uuid::new_v4(),
            invoice_id: created.id,
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            amount: item.amount,
            created_at: now,
        };
        state.invoices.insert(created.id, created.clone());
        state.invoice_items.insert(created_item.id, created_item.clone());
        Ok((created, created_item))
    }

    async fn get_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .invoices
            .get(&invoice_id)
            .filter(|i| i.company_id == company_id)
            .cloned())
    }

    async fn list_invoices(
        &self,
        company_id: Uuid,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<Invoice>, AppError> {
        let state = self.state.read().await;
        let mut invoices: Vec<Invoice> = state
            .invoices
            .values()
            .filter(|i| i.company_id == company_id)
            .filter(|i| status.map_or(true, |s| i.status == s.as_str()))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(invoices)
    }

    async fn list_invoice_items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, AppError> {
        let state = self.state.read().await;
        let mut items: Vec<InvoiceItem> = state
            .invoice_items
            .values()
            .filter(|item| item.invoice_id == invoice_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn pay_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        payment: &CreatePayment,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<(Invoice, Payment)>, AppError> {
        let mut state = self.state.write().await;
        let Some(invoice) = state
            .invoices
            .get_mut(&invoice_id)
            .filter(|i| i.company_id == company_id && !i.is_paid())
        else {
            return Ok(None);
        };
        invoice.status = InvoiceStatus::Paid.as_str().to_string();
        invoice.paid_at = Some(paid_at);
        invoice.updated_at = Utc::now();
        let paid = invoice.clone();

        let created = Payment {
            id: Uuid::new_v4(),
            invoice_id: paid.id,
            amount: payment.amount,
            currency: payment.currency.clone(),
            status: payment.status.as_str().to_string(),
            payment_method: payment.payment_method.clone(),
            transaction_id: payment.transaction_id.clone(),
            created_at: Utc::now(),
        };
        state.payments.insert(created.id, created.clone());
        Ok(Some((paid, created)))
    }

    // =========================================================================
    // Payments
    // =========================================================================

    async fn list_payments(&self, company_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let state = self.state.read().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| {
                state
                    .invoices
                    .get(&p.invoice_id)
                    .is_some_and(|i| i.company_id == company_id)
            })
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(payments)
    }

    // =========================================================================
    // Usage
    // =========================================================================

    async fn record_usage(&self, input: &RecordUsage) -> Result<UsageRecord, AppError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let record = UsageRecord {
            id: Uuid::new_v4(),
            company_id: input.company_id,
            subscription_id: input.subscription_id,
            metric_name: input.metric_name.clone(),
            quantity: input.quantity,
            recorded_at: now,
            created_at: now,
        };
        state.usage_records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_usage(
        &self,
        company_id: Uuid,
        subscription_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<UsageRecord>, AppError> {
        let state = self.state.read().await;
        let mut records: Vec<UsageRecord> = state
            .usage_records
            .values()
            .filter(|r| r.company_id == company_id)
            .filter(|r| subscription_id.map_or(true, |id| r.subscription_id == id))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(b.id.cmp(&a.id)));
        records.truncate(limit.clamp(1, 1000) as usize);
        Ok(records)
    }

    async fn usage_summary(&self, company_id: Uuid) -> Result<Vec<UsageMetricSummary>, AppError> {
        let state = self.state.read().await;
        let mut groups: BTreeMap<String, Vec<Decimal>> = BTreeMap::new();
        for record in state
            .usage_records
            .values()
            .filter(|r| r.company_id == company_id)
        {
            groups
                .entry(record.metric_name.clone())
                .or_default()
                .push(record.quantity);
        }
        let summary = groups
            .into_iter()
            .map(|(metric_name, quantities)| {
                let count = quantities.len() as i64;
                let total: Decimal = quantities.iter().copied().sum();
                let minimum = quantities.iter().copied().min().unwrap_or(Decimal::ZERO);
                let maximum = quantities.iter().copied().max().unwrap_or(Decimal::ZERO);
                let average = (total / Decimal::from(count))
                    .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero);
                UsageMetricSummary {
                    metric_name,
                    total,
                    average,
                    minimum,
                    maximum,
                    count,
                }
            })
            .collect();
        Ok(summary)
    }

    // =========================================================================
    // API keys
    // =========================================================================

    async fn create_api_key(&self, input: &CreateApiKey) -> Result<ApiKey, AppError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let key = ApiKey {
            id: Uuid::new_v4(),
            company_id: input.company_id,
            name: input.name.clone(),
            key_hash: input.key_hash.clone(),
            key_salt: input.key_salt.clone(),
            key_prefix: input.key_prefix.clone(),
            expires_at: input.expires_at,
            is_active: true,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        };
        state.api_keys.insert(key.id, key.clone());
        Ok(key)
    }

    async fn list_api_keys(&self, company_id: Uuid) -> Result<Vec<ApiKey>, AppError> {
        let state = self.state.read().await;
        let mut keys: Vec<ApiKey> = state
            .api_keys
            .values()
            .filter(|k| k.company_id == company_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(keys)
    }

    async fn revoke_api_key(
        &self,
        company_id: Uuid,
        key_id: Uuid,
    ) -> Result<Option<ApiKey>, AppError> {
        let mut state = self.state.write().await;
        let Some(key) = state
            .api_keys
            .get_mut(&key_id)
            .filter(|k| k.company_id == company_id)
        else {
            return Ok(None);
        };
        key.is_active = false;
        key.updated_at = Utc::now();
        Ok(Some(key.clone()))
    }

    async fn list_active_api_keys(&self) -> Result<Vec<ApiKey>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .api_keys
            .values()
            .filter(|k| k.is_active)
            .cloned()
            .collect())
    }

    async fn touch_api_key(&self, key_id: Uuid, used_at: DateTime<Utc>) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if let Some(key) = state.api_keys.get_mut(&key_id) {
            key.last_used_at = Some(used_at);
            key.updated_at = Utc::now();
        }
        Ok(())
    }

    // =========================================================================
    // Settings
    // =========================================================================

    async fn get_settings(&self, company_id: Uuid) -> Result<Option<BillingSettings>, AppError> {
        let state = self.state.read().await;
        Ok(state.settings.get(&company_id).cloned())
    }

    async fn upsert_settings(
        &self,
        company_id: Uuid,
        update: &UpdateBillingSettings,
    ) -> Result<BillingSettings, AppError> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        if let Some(existing) = state.settings.get_mut(&company_id) {
            if let Some(tax_rate) = update.tax_rate {
                existing.tax_rate = tax_rate;
            }
            if let Some(currency) = &update.currency {
                existing.currency = currency.clone();
            }
            if let Some(prefix) = &update.invoice_prefix {
                existing.invoice_prefix = prefix.clone();
            }
            if let Some(days) = update.payment_terms_days {
                existing.payment_terms_days = days;
            }
            if let Some(url) = &update.webhook_url {
                existing.webhook_url = Some(url.clone());
            }
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let defaults = EffectiveSettings::default();
        let settings = BillingSettings {
            id: Uuid::new_v4(),
            company_id,
            tax_rate: update.tax_rate.unwrap_or(defaults.tax_rate),
            currency: update.currency.clone().unwrap_or(defaults.currency),
            invoice_prefix: update
                .invoice_prefix
                .clone()
                .unwrap_or(defaults.invoice_prefix),
            payment_terms_days: update
                .payment_terms_days
                .unwrap_or(defaults.payment_terms_days),
            webhook_url: update.webhook_url.clone(),
            created_at: now,
            updated_at: now,
        };
        state.settings.insert(company_id, settings.clone());
        Ok(settings)
    }

    // =========================================================================
    // Webhook event log
    // =========================================================================

    async fn record_webhook(&self, input: &RecordWebhook) -> Result<Webhook, AppError> {
        let mut state = self.state.write().await;
        let webhook = Webhook {
            id: Uuid::new_v4(),
            company_id: input.company_id,
            event_type: input.event_type.clone(),
            payload: input.payload.clone(),
            status: WebhookStatus::Pending.as_str().to_string(),
            response_status: None,
            response_body: None,
            attempts: 0,
            created_at: Utc::now(),
        };
        state.webhooks.insert(webhook.id, webhook.clone());
        Ok(webhook)
    }

    async fn list_webhooks(&self, company_id: Uuid) -> Result<Vec<Webhook>, AppError> {
        let state = self.state.read().await;
        let mut webhooks: Vec<Webhook> = state
            .webhooks
            .values()
            .filter(|w| w.company_id == company_id)
            .cloned()
            .collect();
        webhooks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(webhooks)
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Flip a plan inactive. No endpoint soft-deletes plans, so tests set
    /// the flag directly.
    pub(crate) async fn deactivate_plan(&self, plan_id: Uuid) {
        let mut state = self.state.write().await;
        if let Some(plan) = state.plans.get_mut(&plan_id) {
            plan.is_active = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlanInterval, UserRole};
    use chrono::Duration;

    async fn store_with_company() -> (MemoryStore, Company) {
        let store = MemoryStore::new();
        let company = store
            .create_company(&CreateCompany {
                name: "Acme Corp".to_string(),
                slug: "acme".to_string(),
            })
            .await
            .unwrap();
        (store, company)
    }

    fn invoice_input(company_id: Uuid, number: &str) -> CreateInvoice {
        CreateInvoice {
            company_id,
            subscription_id: Uuid::new_v4(),
            invoice_number: number.to_string(),
            status: InvoiceStatus::Open,
            subtotal: Decimal::new(2999, 2),
            tax: Decimal::new(25492, 4),
            total: Decimal::new(325392, 4),
            currency: "USD".to_string(),
            due_date: Utc::now() + Duration::days(30),
        }
    }

    fn item_input() -> CreateInvoiceItem {
        CreateInvoiceItem {
            description: "Basic - Monthly Subscription".to_string(),
            quantity: Decimal::ONE,
            unit_price: Decimal::new(2999, 2),
            amount: Decimal::new(2999, 2),
        }
    }

    fn payment_input(amount: Decimal) -> CreatePayment {
        CreatePayment {
            amount,
            currency: "USD".to_string(),
            status: crate::models::PaymentStatus::Completed,
            payment_method: "demo_card".to_string(),
            transaction_id: "txn_1".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_invoice_numbers_conflict() {
        let (store, company) = store_with_company().await;
        let input = invoice_input(company.id, "INV-000001-ABCDEF12");
        store
            .create_invoice_with_item(&input, &item_input())
            .await
            .unwrap();

        let err = store
            .create_invoice_with_item(&input, &item_input())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn pay_invoice_flips_status_exactly_once() {
        let (store, company) = store_with_company().await;
        let (invoice, _) = store
            .create_invoice_with_item(&invoice_input(company.id, "INV-000002-ABCDEF12"), &item_input())
            .await
            .unwrap();

        let paid_at = Utc::now();
        let first = store
            .pay_invoice(company.id, invoice.id, &payment_input(invoice.total), paid_at)
            .await
            .unwrap();
        let (paid, payment) = first.unwrap();
        assert!(paid.is_paid());
        assert_eq!(paid.paid_at, Some(paid_at));
        assert_eq!(payment.amount, invoice.total);

        let second = store
            .pay_invoice(company.id, invoice.id, &payment_input(invoice.total), Utc::now())
            .await
            .unwrap();
        assert!(second.is_none());

        let payments = store.list_payments(company.id).await.unwrap();
        assert_eq!(payments.len(), 1);
    }

    #[tokio::test]
    async fn cancel_subscription_is_idempotent() {
        let (store, company) = store_with_company().await;
        let now = Utc::now();
        let subscription = store
            .create_subscription(&CreateSubscription {
                company_id: company.id,
                plan_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                status: SubscriptionStatus::Active,
                current_period_start: now,
                current_period_end: now + Duration::days(30),
            })
            .await
            .unwrap();

        let first = store
            .cancel_subscription(company.id, subscription.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.status, "canceled");
        assert!(!first.cancel_at_period_end);

        let second = store
            .cancel_subscription(company.id, subscription.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.status, "canceled");
    }

    #[tokio::test]
    async fn rows_are_scoped_by_company() {
        let (store, acme) = store_with_company().await;
        let other = store
            .create_company(&CreateCompany {
                name: "TechStart Inc".to_string(),
                slug: "techstart".to_string(),
            })
            .await
            .unwrap();

        let plan = store
            .create_plan(&CreatePlan {
                company_id: acme.id,
                name: "Basic".to_string(),
                description: None,
                price: Decimal::new(2999, 2),
                currency: "USD".to_string(),
                interval: PlanInterval::Month,
                features: None,
            })
            .await
            .unwrap();

        assert!(store.get_plan(other.id, plan.id).await.unwrap().is_none());
        assert!(store.list_plans(other.id).await.unwrap().is_empty());
        assert!(store.get_plan(acme.id, plan.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_company_slug_conflicts() {
        let (store, _) = store_with_company().await;
        let err = store
            .create_company(&CreateCompany {
                name: "Acme Again".to_string(),
                slug: "acme".to_string(),
            })
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn duplicate_user_email_within_company_conflicts() {
        let (store, company) = store_with_company().await;
        let input = CreateUser {
            company_id: company.id,
            email: "john@acme.com".to_string(),
            name: "John Smith".to_string(),
            role: UserRole::Owner,
            password_hash: "hash".to_string(),
        };
        store.create_user(&input).await.unwrap();
        let err = store.create_user(&input).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn settings_upsert_merges_partial_updates() {
        let (store, company) = store_with_company().await;

        let created = store
            .upsert_settings(
                company.id,
                &UpdateBillingSettings {
                    tax_rate: Some(Decimal::new(85, 1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(created.tax_rate, Decimal::new(85, 1));
        assert_eq!(created.currency, "USD");
        assert_eq!(created.payment_terms_days, 30);

        let updated = store
            .upsert_settings(
                company.id,
                &UpdateBillingSettings {
                    currency: Some("EUR".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.tax_rate, Decimal::new(85, 1));
        assert_eq!(updated.currency, "EUR");
        assert_eq!(updated.id, created.id);
    }

    #[tokio::test]
    async fn usage_summary_aggregates_per_metric() {
        let (store, company) = store_with_company().await;
        let subscription_id = Uuid::new_v4();

        for (metric, quantity) in [
            ("api_calls", Decimal::from(100)),
            ("api_calls", Decimal::from(300)),
            ("storage_gb", Decimal::from(5)),
        ] {
            store
                .record_usage(&RecordUsage {
                    company_id: company.id,
                    subscription_id,
                    metric_name: metric.to_string(),
                    quantity,
                })
                .await
                .unwrap();
        }

        let summary = store.usage_summary(company.id).await.unwrap();
        assert_eq!(summary.len(), 2);

        let api_calls = &summary[0];
        assert_eq!(api_calls.metric_name, "api_calls");
        assert_eq!(api_calls.total, Decimal::from(400));
        assert_eq!(api_calls.average, Decimal::from(200));
        assert_eq!(api_calls.minimum, Decimal::from(100));
        assert_eq!(api_calls.maximum, Decimal::from(300));
        assert_eq!(api_calls.count, 2);

        let storage = &summary[1];
        assert_eq!(storage.metric_name, "storage_gb");
        assert_eq!(storage.count, 1);
    }
}
