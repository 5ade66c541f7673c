//! Typed rows and inputs for every table. Row structs mirror columns
//! one-to-one; status/interval columns stay `String` in rows with the
//! matching enum used at the input boundary.

mod api_key;
mod company;
mod invoice;
mod payment;
mod plan;
mod settings;
mod subscription;
mod usage;
mod user;
mod webhook;

pub use api_key::{ApiKey, CreateApiKey};
pub use company::{Company, CreateCompany};
pub use invoice::{CreateInvoice, CreateInvoiceItem, Invoice, InvoiceItem, InvoiceStatus};
pub use payment::{CreatePayment, Payment, PaymentStatus};
pub use plan::{CreatePlan, Plan, PlanInterval};
pub use settings::{BillingSettings, EffectiveSettings, UpdateBillingSettings};
pub use subscription::{CreateSubscription, Subscription, SubscriptionStatus};
pub use usage::{RecordUsage, UsageMetricSummary, UsageRecord};
pub use user::{CreateUser, User, UserRole};
pub use webhook::{RecordWebhook, Webhook, WebhookStatus};
