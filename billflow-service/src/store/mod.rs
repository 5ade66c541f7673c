//! Storage seam for all tenant data.
//!
//! Every method that touches a tenant-owned table takes the caller's
//! `company_id` and scopes the query with it; rows belonging to another
//! tenant are indistinguishable from absent rows. `payments` and
//! `invoice_items` scope through their parent invoice.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::AppError;
use crate::models::{
    ApiKey, BillingSettings, Company, CreateApiKey, CreateCompany, CreateInvoice,
    CreateInvoiceItem, CreatePayment, CreatePlan, CreateSubscription, CreateUser, Invoice,
    InvoiceItem, InvoiceStatus, Payment, Plan, RecordUsage, RecordWebhook, Subscription,
    UpdateBillingSettings, UsageMetricSummary, UsageRecord, User, Webhook,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    // Companies & users
    async fn create_company(&self, input: &CreateCompany) -> Result<Company, AppError>;
    async fn find_company_by_slug(&self, slug: &str) -> Result<Option<Company>, AppError>;
    async fn create_user(&self, input: &CreateUser) -> Result<User, AppError>;
    /// All users registered under this email, oldest first. Email is unique
    /// only within a company, so the same address may exist under several
    /// tenants; sign-in disambiguates by verifying the password against each
    /// candidate.
    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>, AppError>;
    async fn get_user(&self, company_id: Uuid, user_id: Uuid) -> Result<Option<User>, AppError>;

    // Plans
    async fn create_plan(&self, input: &CreatePlan) -> Result<Plan, AppError>;
    async fn get_plan(&self, company_id: Uuid, plan_id: Uuid) -> Result<Option<Plan>, AppError>;
    /// Active plans only, cheapest first.
    async fn list_plans(&self, company_id: Uuid) -> Result<Vec<Plan>, AppError>;

    // Subscriptions
    async fn create_subscription(
        &self,
        input: &CreateSubscription,
    ) -> Result<Subscription, AppError>;
    async fn get_subscription(
        &self,
        company_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError>;
    /// First active subscription for the tenant, oldest first, used when an
    /// invoice is generated without an explicit subscription id.
    async fn first_active_subscription(
        &self,
        company_id: Uuid,
    ) -> Result<Option<Subscription>, AppError>;
    async fn count_subscriptions(&self, company_id: Uuid) -> Result<i64, AppError>;
    async fn list_subscriptions(&self, company_id: Uuid) -> Result<Vec<Subscription>, AppError>;
    /// Set the terminal canceled status. Applies the same values on repeat
    /// calls, which makes cancellation idempotent. `None` when the row does
    /// not exist for this tenant.
    async fn cancel_subscription(
        &self,
        company_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError>;

    // Invoices
    /// Insert an invoice and its single line item atomically. A duplicate
    /// invoice number surfaces as `AppError::Conflict` so the caller can
    /// regenerate the number and retry.
    async fn create_invoice_with_item(
        &self,
        invoice: &CreateInvoice,
        item: &CreateInvoiceItem,
    ) -> Result<(Invoice, InvoiceItem), AppError>;
    async fn get_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError>;
    async fn list_invoices(
        &self,
        company_id: Uuid,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<Invoice>, AppError>;
    async fn list_invoice_items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, AppError>;
    /// Atomically flip an unpaid invoice to paid and record the payment.
    /// `None` when no unpaid invoice matched (absent, other tenant, or
    /// already paid) so concurrent double-pays cannot both succeed.
    async fn pay_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        payment: &CreatePayment,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<(Invoice, Payment)>, AppError>;

    // Payments
    async fn list_payments(&self, company_id: Uuid) -> Result<Vec<Payment>, AppError>;

    // Usage
    async fn record_usage(&self, input: &RecordUsage) -> Result<UsageRecord, AppError>;
    async fn list_usage(
        &self,
        company_id: Uuid,
        subscription_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<UsageRecord>, AppError>;
    async fn usage_summary(&self, company_id: Uuid) -> Result<Vec<UsageMetricSummary>, AppError>;

    // API keys
    async fn create_api_key(&self, input: &CreateApiKey) -> Result<ApiKey, AppError>;
    async fn list_api_keys(&self, company_id: Uuid) -> Result<Vec<ApiKey>, AppError>;
    /// Soft-revoke. Repeat revokes are accepted no-ops. `None` when the row
    /// does not exist for this tenant.
    async fn revoke_api_key(
        &self,
        company_id: Uuid,
        key_id: Uuid,
    ) -> Result<Option<ApiKey>, AppError>;
    /// All active keys across tenants; the verification path recomputes
    /// each candidate's salted hash against the presented secret.
    async fn list_active_api_keys(&self) -> Result<Vec<ApiKey>, AppError>;
    async fn touch_api_key(&self, key_id: Uuid, used_at: DateTime<Utc>) -> Result<(), AppError>;

    // Settings
    async fn get_settings(&self, company_id: Uuid) -> Result<Option<BillingSettings>, AppError>;
    async fn upsert_settings(
        &self,
        company_id: Uuid,
        update: &UpdateBillingSettings,
    ) -> Result<BillingSettings, AppError>;

    // Webhook event log
    async fn record_webhook(&self, input: &RecordWebhook) -> Result<Webhook, AppError>;
    async fn list_webhooks(&self, company_id: Uuid) -> Result<Vec<Webhook>, AppError>;
}
