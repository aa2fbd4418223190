//! Session store: token id to user id, with TTL expiry and explicit deletion.
//!
//! The store is the single source of truth for "is this token currently valid".
//! There is no blacklist; deleting an entry revokes the token. Entries expire
//! passively through the backend's own TTL.
//!
//! Keys never contain the raw token. A token is hashed with SHA-256 and the
//! hex digest is namespaced by its kind, so an access token presented where a
//! refresh token is expected (or the reverse) simply misses.

pub mod memory;
pub mod redis;

pub use self::memory::MemorySessionStore;
pub use self::redis::RedisSessionStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{fmt, fmt::Write as _, future::Future, time::Duration};
use utoipa::ToSchema;

const KEY_PREFIX: &str = "gatehouse";

/// Prefix of the per-user index keys; the user id follows it.
pub const USER_INDEX_PREFIX: &str = "gatehouse:user:";

/// The two token kinds minted per login.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage key for one token. Built from the raw token, holds only its digest.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SessionKey {
    kind: TokenKind,
    digest: String,
}

impl SessionKey {
    #[must_use]
    pub fn new(kind: TokenKind, token_id: &str) -> Self {
        Self {
            kind,
            digest: hash_token(token_id),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Fully qualified key as written to the backend.
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("{KEY_PREFIX}:{}:{}", self.kind, self.digest)
    }
}

impl fmt::Debug for SessionKey {
    // Digest prefix only; enough to correlate log lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.digest.get(..8).unwrap_or(&self.digest);
        write!(f, "SessionKey({}:{short}…)", self.kind)
    }
}

/// Key of the per-user set that indexes every session key of that user.
#[must_use]
pub fn user_index_key(user_id: i64) -> String {
    format!("{USER_INDEX_PREFIX}{user_id}")
}

/// Hex SHA-256 of a raw token.
#[must_use]
pub fn hash_token(token_id: &str) -> String {
    let digest = Sha256::digest(token_id.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Key absent or expired.
    #[error("not found")]
    NotFound,
    /// Connectivity failure or timeout. Detail is for server logs only.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value backend holding live session entries.
///
/// Implementations must be safe under concurrent `put`/`get`/`delete` from many
/// requests without external locking and must bound every call with a timeout.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Write `key -> user_id` with `ttl`. Last write wins on collision.
    async fn put(&self, key: &SessionKey, user_id: i64, ttl: Duration) -> Result<(), StoreError>;

    /// Resolve a key to its user id, `NotFound` when absent or expired.
    async fn get(&self, key: &SessionKey) -> Result<i64, StoreError>;

    /// Remove a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &SessionKey) -> Result<(), StoreError>;

    /// Remove every session of a user through the per-user index.
    /// Returns how many live entries were removed.
    async fn revoke_all(&self, user_id: i64) -> Result<u64, StoreError>;

    /// Round-trip to the backend, used by `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Run a backend call under `limit`. Backend errors and elapsed time both
/// become `Unavailable`, prefixed with `what` for the server log.
pub(crate) async fn bounded<T, E, F>(limit: Duration, what: &str, fut: F) -> Result<T, StoreError>
where
    E: fmt::Display,
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(StoreError::Unavailable(format!("{what}: {err}"))),
        Err(_) => Err(StoreError::Unavailable(format!(
            "{what}: timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

/// Clamp a requested TTL into `[1s, max]`.
pub(crate) fn clamp_ttl(ttl: Duration, max: Duration) -> Duration {
    ttl.min(max).max(Duration::from_secs(1))
}
