use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{ActivateRequest, MessageResponse, RegisterRequest},
        password::ACTIVATION_TOKEN_LEN,
    },
    error::AuthError,
    state::AppState,
};

pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 20;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/activate", post(activate))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    if !is_valid_email(email) {
        return Err(AuthError::Validation("invalid email".into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(AuthError::Validation(format!(
            "password must be {PASSWORD_MIN_LEN} to {PASSWORD_MAX_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_token(token: &str) -> Result<(), AuthError> {
    if token.chars().count() != ACTIVATION_TOKEN_LEN {
        return Err(AuthError::Validation(format!(
            "token must be {ACTIVATION_TOKEN_LEN} characters"
        )));
    }
    Ok(())
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AuthError::Validation(rejection.body_text()))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), AuthError> {
    let mut payload = body(payload)?;
    payload.email = payload.email.trim().to_string();

    if let Err(e) = validate_email(&payload.email).and_then(|_| validate_password(&payload.password)) {
        warn!(email = %payload.email, error = %e, "register rejected");
        return Err(e);
    }

    let user = state
        .registration()
        .register(&payload.email, &payload.password)
        .await?;

    info!(user_id = %user.id, "registration accepted");
    Ok((StatusCode::CREATED, Json(MessageResponse { message: "ok" })))
}

#[instrument(skip(state, payload))]
pub async fn activate(
    State(state): State<AppState>,
    payload: Result<Json<ActivateRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    let mut payload = body(payload)?;
    payload.email = payload.email.trim().to_string();

    if let Err(e) = validate_email(&payload.email).and_then(|_| validate_token(&payload.token)) {
        warn!(email = %payload.email, error = %e, "activate rejected");
        return Err(e);
    }

    state
        .registration()
        .activate(&payload.email, &payload.token)
        .await?;

    Ok(Json(MessageResponse {
        message: "activate ok",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn password_length_bounds() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
        assert!(validate_password("12345678901234567890").is_ok());
        assert!(validate_password("123456789012345678901").is_err());
        // counted in characters, not bytes
        assert!(validate_password("ääääää").is_ok());
    }

    #[test]
    fn token_must_be_exactly_eight() {
        assert!(validate_token("Ab3dEf7h").is_ok());
        assert!(validate_token("Ab3dEf7").is_err());
        assert!(validate_token("Ab3dEf7hX").is_err());
    }
}
