use serde::{Deserialize, Serialize};

/// Request body for pre-registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Request body for activation.
#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub email: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
