pub mod api_keys;
pub mod billing;
pub mod metrics;
pub mod seed;
pub mod sessions;
pub mod telemetry;

pub use api_keys::{ApiKeyService, IssuedApiKey};
pub use billing::BillingService;
pub use metrics::{get_metrics, init_metrics};
pub use sessions::SessionService;
pub use telemetry::init_tracing;
