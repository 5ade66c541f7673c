use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Create-subscription request. `user_id` defaults to the session user.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubscriptionRequest {
    pub plan_id: Uuid,
    pub user_id: Option<Uuid>,
}
