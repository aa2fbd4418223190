//! Identity store: user lookup by email or id, and account creation.
//!
//! The session core only reads users. Creation is delegated here so the
//! relational schema stays out of the auth handlers.

pub mod memory;
pub mod postgres;

pub use self::memory::MemoryUserStore;
pub use self::postgres::PgUserStore;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::StoreError;

/// Public view of a user. Never carries the password hash.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: String,
}

/// A user together with the stored password hash, for sign-in only.
#[derive(Debug)]
pub struct UserRecord {
    pub user: User,
    pub password_hash: SecretString,
}

/// Input for account creation. `email` must already be normalized and
/// `password_hash` already computed.
#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub password_hash: SecretString,
    pub display_name: Option<String>,
}

#[derive(Debug)]
pub enum CreateOutcome {
    Created(User),
    Conflict,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn create(&self, new_user: NewUser) -> Result<CreateOutcome, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
