use crate::models::User;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Sign-in request.
#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Session issued for a verified user.
#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}
