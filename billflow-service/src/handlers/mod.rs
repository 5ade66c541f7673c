pub mod api_keys;
pub mod auth;
pub mod health;
pub mod ingest;
pub mod invoices;
pub mod payments;
pub mod plans;
pub mod settings;
pub mod subscriptions;
pub mod usage;
pub mod webhooks;

pub use api_keys::{create_api_key, list_api_keys, revoke_api_key};
pub use auth::{me, sign_in};
pub use health::{health_check, metrics_endpoint, readiness_check};
pub use ingest::ingest_usage;
pub use invoices::{generate_invoice, get_invoice, list_invoices};
pub use payments::{list_payments, pay_invoice};
pub use plans::{create_plan, list_plans};
pub use settings::{get_settings, update_settings};
pub use subscriptions::{cancel_subscription, create_subscription, list_subscriptions};
pub use usage::{list_usage, record_usage, usage_summary};
pub use webhooks::list_webhooks;
