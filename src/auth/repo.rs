use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User, UserRow, UserState};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("user is no longer inactive")]
    Conflict,
    #[error("user store unavailable")]
    Unavailable(#[source] anyhow::Error),
}

impl From<anyhow::Error> for StoreError {
    fn from(e: anyhow::Error) -> Self {
        StoreError::Unavailable(e)
    }
}

/// Persistence port used by the registration engine.
///
/// Implementations must enforce email uniqueness themselves: a losing
/// concurrent `create` gets `DuplicateEmail`, and a `delete_inactive` that
/// races an activation or another replacement gets `Conflict`.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new user and return it with its assigned id.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Delete the user with `id` only while it is still inactive.
    async fn delete_inactive(&self, id: Uuid) -> Result<(), StoreError>;
    /// Write `state` and `updated_at` of an existing user.
    async fn update_state(&self, user: &User) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    pub db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (email, password_hash, salt, activation_token, state, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, email, password_hash, salt, activation_token, state, created_at, updated_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.salt)
        .bind(&user.activation_token)
        .bind(user.state.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateEmail
            } else {
                StoreError::Unavailable(anyhow::Error::new(e).context("insert user"))
            }
        })?;
        Ok(User::try_from(row)?)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, salt, activation_token, state, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("get user by email")?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn delete_inactive(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1 AND state = $2")
            .bind(id)
            .bind(UserState::Inactive.as_str())
            .execute(&self.db)
            .await
            .context("delete inactive user")?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn update_state(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET state = $1, updated_at = $2
             WHERE id = $3
            "#,
        )
        .bind(user.state.as_str())
        .bind(user.updated_at)
        .bind(user.id)
        .execute(&self.db)
        .await
        .context("update user state")?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// SQLSTATE 23505: the `users_email_key` unique index rejected the insert.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("test db error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &str {
            "test db error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("40001"),
        }));
        assert!(!is_unique_violation(&err));

        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn anyhow_errors_become_unavailable() {
        let err: StoreError = anyhow::anyhow!("connection reset").into();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(err.to_string(), "user store unavailable");
    }
}
