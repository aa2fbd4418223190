//! In-process identity store for tests and local embedding.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::{
    collections::HashMap,
    sync::atomic::{AtomicI64, Ordering},
};
use tokio::sync::RwLock;

use super::{CreateOutcome, NewUser, User, UserRecord, UserStore};
use crate::store::StoreError;

#[derive(Debug)]
struct StoredUser {
    user: User,
    password_hash: String,
}

#[derive(Debug)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<i64, StoredUser>>,
    next_id: AtomicI64,
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Remove a user, leaving any of their sessions in place.
    pub async fn remove(&self, id: i64) -> bool {
        self.users.write().await.remove(&id).is_some()
    }
}

/// RFC 3339 in UTC with whole seconds, the same text the Postgres store
/// renders with `to_char`.
fn created_at_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|stored| stored.user.email == email)
            .map(|stored| UserRecord {
                user: stored.user.clone(),
                password_hash: SecretString::from(stored.password_hash.clone()),
            }))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.get(&id).map(|stored| stored.user.clone()))
    }

    async fn create(&self, new_user: NewUser) -> Result<CreateOutcome, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|stored| stored.user.email == new_user.email) {
            return Ok(CreateOutcome::Conflict);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let user = User {
            id,
            email: new_user.email,
            display_name: new_user.display_name,
            created_at: created_at_now(),
        };
        users.insert(
            id,
            StoredUser {
                user: user.clone(),
                password_hash: new_user.password_hash.expose_secret().to_string(),
            },
        );
        Ok(CreateOutcome::Created(user))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
