use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle state of a user account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserState {
    Inactive,
    Active,
}

impl UserState {
    pub fn as_str(self) -> &'static str {
        match self {
            UserState::Inactive => "inactive",
            UserState::Active => "active",
        }
    }
}

impl fmt::Display for UserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(UserState::Inactive),
            "active" => Ok(UserState::Active),
            other => anyhow::bail!("unknown user state {other:?}"),
        }
    }
}

/// User record as seen by the registration engine.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,      // Argon2 PHC string
    #[serde(skip_serializing)]
    pub salt: String,
    #[serde(skip_serializing)]
    pub activation_token: String,   // only meaningful while inactive
    pub state: UserState,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime, // also the token issue time
}

impl User {
    pub fn is_active(&self) -> bool {
        self.state == UserState::Active
    }
}

/// A user before the store has assigned an id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub salt: String,
    pub activation_token: String,
    pub state: UserState,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl NewUser {
    pub fn with_id(self, id: Uuid) -> User {
        User {
            id,
            email: self.email,
            password_hash: self.password_hash,
            salt: self.salt,
            activation_token: self.activation_token,
            state: self.state,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub salt: String,
    pub activation_token: String,
    pub state: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            email: r.email,
            password_hash: r.password_hash,
            salt: r.salt,
            activation_token: r.activation_token,
            state: r.state.parse()?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}
