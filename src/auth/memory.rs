use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::repo::{StoreError, UserStore};
use crate::auth::repo_types::{NewUser, User};

/// In-process user store keyed by email. Used for `STORE_BACKEND=memory`
/// and in tests.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored user.
    pub fn users(&self) -> Vec<User> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, User>> {
        // a poisoned map is still consistent: every mutation is a single insert/remove
        self.users.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.lock();
        if users.contains_key(&user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = user.with_id(Uuid::new_v4());
        users.insert(user.email.clone(), user.clone());
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock().get(email).cloned())
    }

    async fn delete_inactive(&self, id: Uuid) -> Result<(), StoreError> {
        let mut users = self.lock();
        let email = users
            .values()
            .find(|u| u.id == id && !u.is_active())
            .map(|u| u.email.clone())
            .ok_or(StoreError::Conflict)?;
        users.remove(&email);
        Ok(())
    }

    async fn update_state(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.lock();
        let stored = users
            .values_mut()
            .find(|u| u.id == user.id)
            .ok_or(StoreError::NotFound)?;
        stored.state = user.state;
        stored.updated_at = user.updated_at;
        Ok(())
    }
}
