use std::sync::Arc;

use time::Duration;
use tracing::{info, instrument, warn};

use crate::auth::password::{derive_hash, random_token, ACTIVATION_TOKEN_LEN, SALT_LEN};
use crate::auth::repo::UserStore;
use crate::auth::repo_types::{NewUser, User, UserState};
use crate::clock::Clock;
use crate::error::AuthError;
use crate::mail::Notifier;

/// Default lifetime of an activation token, counted from the last registration attempt.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::minutes(30);

/// Registration and activation state machine.
///
/// Per email: no user -> inactive -> active. An inactive user is replaced by
/// any new registration for the same email; an active user is final.
#[derive(Clone)]
pub struct RegistrationService {
    pub users: Arc<dyn UserStore>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub token_ttl: Duration,
}

impl RegistrationService {
    pub fn new(
        users: Arc<dyn UserStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            notifier,
            clock,
            token_ttl: DEFAULT_TOKEN_TTL,
        }
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Pre-register `email`, replacing a stale inactive record if there is one.
    ///
    /// The returned user carries the activation token; callers must not
    /// expose it.
    #[instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str) -> Result<User, AuthError> {
        match self.users.get_by_email(email).await? {
            None => {}
            Some(existing) if existing.is_active() => {
                warn!(user_id = %existing.id, "register on active user");
                return Err(AuthError::AlreadyActive);
            }
            Some(existing) => {
                info!(user_id = %existing.id, "replacing inactive registration");
                // fails with Conflict if an activation or another register got there first
                if let Err(e) = self.users.delete_inactive(existing.id).await {
                    warn!(user_id = %existing.id, error = %e, "inactive registration not replaced");
                    return Err(e.into());
                }
            }
        }
        self.create_inactive_user(email, password).await
    }

    async fn create_inactive_user(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let salt = random_token(SALT_LEN);
        let password_hash = derive_hash(password, &salt)?;
        let now = self.clock.now();

        let user = self
            .users
            .create(NewUser {
                email: email.to_string(),
                password_hash,
                salt,
                activation_token: random_token(ACTIVATION_TOKEN_LEN),
                state: UserState::Inactive,
                created_at: now,
                updated_at: now,
            })
            .await?;

        // persisted first: a failed send leaves an inactive user that the next register replaces
        self.notifier
            .send_activation_token(&user.email, &user.activation_token)
            .await?;

        info!(user_id = %user.id, "user pre-registered");
        Ok(user)
    }

    /// Activate `email` with the token it was mailed.
    #[instrument(skip(self, token))]
    pub async fn activate(&self, email: &str, token: &str) -> Result<User, AuthError> {
        let mut user = self
            .users
            .get_by_email(email)
            .await?
            .ok_or(AuthError::NotFound)?;

        if user.is_active() {
            return Err(AuthError::AlreadyActive);
        }
        if token != user.activation_token {
            warn!(user_id = %user.id, "activation token mismatch");
            return Err(AuthError::InvalidToken);
        }
        let now = self.clock.now();
        if now > user.updated_at + self.token_ttl {
            warn!(user_id = %user.id, issued_at = %user.updated_at, "activation token expired");
            return Err(AuthError::TokenExpired);
        }

        user.state = UserState::Active;
        user.updated_at = now;
        self.users.update_state(&user).await?;

        info!(user_id = %user.id, "user activated");
        Ok(user)
    }
}
