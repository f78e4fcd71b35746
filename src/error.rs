use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::auth::password::PasswordError;
use crate::auth::repo::StoreError;
use crate::mail::NotifyError;

/// Errors returned by the registration engine and the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("user already active")]
    AlreadyActive,
    #[error("user not found")]
    NotFound,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("user store unavailable")]
    StoreUnavailable(#[source] anyhow::Error),
    #[error("activation mail delivery failed")]
    DeliveryFailed(#[source] anyhow::Error),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::AlreadyActive => "ALREADY_ACTIVE",
            Self::NotFound => "USER_NOT_FOUND",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::DuplicateEmail => "DUPLICATE_EMAIL",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::DeliveryFailed(_) => "DELIVERY_FAILED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidToken => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AlreadyActive | Self::DuplicateEmail => StatusCode::CONFLICT,
            Self::TokenExpired => StatusCode::GONE,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::DeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => AuthError::NotFound,
            StoreError::DuplicateEmail | StoreError::Conflict => AuthError::DuplicateEmail,
            StoreError::Unavailable(e) => AuthError::StoreUnavailable(e),
        }
    }
}

impl From<NotifyError> for AuthError {
    fn from(e: NotifyError) -> Self {
        match e {
            NotifyError::DeliveryFailed(e) => AuthError::DeliveryFailed(e),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::EmptyPassword => AuthError::Validation(e.to_string()),
            other => AuthError::Internal(other.into()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        // TraceLayer records every response status; only infrastructure
        // failures carry a source chain worth logging here.
        match &self {
            Self::StoreUnavailable(e) | Self::DeliveryFailed(e) | Self::Internal(e) => {
                tracing::error!(error = ?e, kind = self.kind(), "request failed");
            }
            _ => {}
        }
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AuthError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn should_return_validation() {
        let (status, json) = body_of(AuthError::Validation("invalid email".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["kind"], "VALIDATION");
        assert_eq!(json["message"], "invalid email");
    }

    #[tokio::test]
    async fn should_return_already_active() {
        let (status, json) = body_of(AuthError::AlreadyActive).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["kind"], "ALREADY_ACTIVE");
        assert_eq!(json["message"], "user already active");
    }

    #[tokio::test]
    async fn should_distinguish_invalid_and_expired_token() {
        let (status, json) = body_of(AuthError::InvalidToken).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["kind"], "INVALID_TOKEN");

        let (status, json) = body_of(AuthError::TokenExpired).await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(json["kind"], "TOKEN_EXPIRED");
    }

    #[tokio::test]
    async fn should_return_user_not_found() {
        let (status, json) = body_of(AuthError::NotFound).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["kind"], "USER_NOT_FOUND");
    }

    #[tokio::test]
    async fn should_hide_store_failure_details() {
        let err = AuthError::from(StoreError::Unavailable(anyhow::anyhow!(
            "password authentication failed for user postgres"
        )));
        let (status, json) = body_of(err).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["kind"], "STORE_UNAVAILABLE");
        assert_eq!(json["message"], "user store unavailable");
    }

    #[tokio::test]
    async fn should_hide_delivery_failure_details() {
        let err = AuthError::from(NotifyError::DeliveryFailed(anyhow::anyhow!(
            "smtp 550 mailbox unavailable"
        )));
        let (status, json) = body_of(err).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["kind"], "DELIVERY_FAILED");
        assert_eq!(json["message"], "activation mail delivery failed");
    }

    #[tokio::test]
    async fn should_return_internal() {
        let (status, json) = body_of(AuthError::Internal(anyhow::anyhow!("boom"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["kind"], "INTERNAL");
        assert_eq!(json["message"], "internal error");
    }

    #[test]
    fn duplicate_email_maps_to_conflict() {
        let err = AuthError::from(StoreError::DuplicateEmail);
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.kind(), "DUPLICATE_EMAIL");
    }

    #[test]
    fn lost_replacement_race_maps_to_conflict() {
        let err = AuthError::from(StoreError::Conflict);
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.kind(), "DUPLICATE_EMAIL");
    }

    #[test]
    fn empty_password_is_a_validation_error() {
        let err = AuthError::from(PasswordError::EmptyPassword);
        assert!(matches!(err, AuthError::Validation(_)));
    }
}
