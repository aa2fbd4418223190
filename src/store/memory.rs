//! In-process session store with passive expiry.
//!
//! Mirrors the Redis semantics closely enough for tests and single-process
//! embedding: expired entries are invisible on read and dropped lazily, and
//! the per-user index loses a key whenever its entry is dropped.

use async_trait::async_trait;
use std::{
    collections::{HashMap, HashSet},
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use super::{SessionKey, SessionStore, StoreError, clamp_ttl};

#[derive(Debug)]
struct Entry {
    user_id: i64,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    by_user: HashMap<i64, HashSet<String>>,
}

impl Inner {
    fn unindex(&mut self, user_id: i64, key: &str) {
        if let Some(keys) = self.by_user.get_mut(&user_id) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_user.remove(&user_id);
            }
        }
    }

    /// Drop every expired entry of `user_id` along with its index member.
    fn prune(&mut self, user_id: i64, now: Instant) {
        let Some(keys) = self.by_user.get_mut(&user_id) else {
            return;
        };
        let entries = &mut self.entries;
        keys.retain(|key| {
            let live = entries.get(key).is_some_and(|entry| entry.is_live(now));
            if !live {
                entries.remove(key);
            }
            live
        });
        if keys.is_empty() {
            self.by_user.remove(&user_id);
        }
    }
}

#[derive(Debug)]
pub struct MemorySessionStore {
    inner: RwLock<Inner>,
    max_ttl: Duration,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(max_ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_ttl,
        }
    }

    /// Number of unexpired entries.
    pub async fn live_entries(&self) -> usize {
        let now = Instant::now();
        let inner = self.inner.read().await;
        inner.entries.values().filter(|e| e.is_live(now)).count()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, key: &SessionKey, user_id: i64, ttl: Duration) -> Result<(), StoreError> {
        let ttl = clamp_ttl(ttl, self.max_ttl);
        let storage_key = key.storage_key();
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        let previous = inner.entries.insert(
            storage_key.clone(),
            Entry {
                user_id,
                expires_at: now + ttl,
            },
        );
        if let Some(previous) = previous.filter(|previous| previous.user_id != user_id) {
            inner.unindex(previous.user_id, &storage_key);
        }
        inner.prune(user_id, now);
        inner.by_user.entry(user_id).or_default().insert(storage_key);
        Ok(())
    }

    async fn get(&self, key: &SessionKey) -> Result<i64, StoreError> {
        let storage_key = key.storage_key();
        let now = Instant::now();
        {
            let inner = self.inner.read().await;
            match inner.entries.get(&storage_key) {
                Some(entry) if entry.is_live(now) => return Ok(entry.user_id),
                Some(_) => {}
                None => return Err(StoreError::NotFound),
            }
        }

        // Expired: drop it and its index member.
        let mut inner = self.inner.write().await;
        let expired = inner
            .entries
            .get(&storage_key)
            .filter(|entry| !entry.is_live(now))
            .map(|entry| entry.user_id);
        if let Some(user_id) = expired {
            inner.entries.remove(&storage_key);
            inner.unindex(user_id, &storage_key);
        }
        Err(StoreError::NotFound)
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), StoreError> {
        let storage_key = key.storage_key();
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.entries.remove(&storage_key) {
            inner.unindex(entry.user_id, &storage_key);
        }
        Ok(())
    }

    async fn revoke_all(&self, user_id: i64) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        let Some(keys) = inner.by_user.remove(&user_id) else {
            return Ok(0);
        };
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = inner.entries.remove(&key) {
                if entry.is_live(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
