mod api_key;
mod metrics;
mod request_id;
mod session;

pub use api_key::ApiKeyIdentity;
pub use metrics::metrics_middleware;
pub use request_id::{request_id_middleware, REQUEST_ID_HEADER};
pub use session::TenantContext;
