mod api_keys;
mod auth;
mod invoices;
mod plans;
mod settings;
mod subscriptions;
mod usage;
mod validation;

pub use api_keys::{CreateApiKeyRequest, CreatedApiKeyResponse};
pub use auth::{SignInRequest, SignInResponse};
pub use invoices::{
    GenerateInvoiceRequest, InvoiceDetail, ListInvoicesQuery, PayInvoiceRequest, PaymentOutcome,
};
pub use plans::CreatePlanRequest;
pub use settings::UpdateSettingsRequest;
pub use subscriptions::CreateSubscriptionRequest;
pub use usage::{RecordUsageRequest, UsageListQuery};
pub use validation::ValidatedJson;
