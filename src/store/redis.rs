//! Redis-backed session store.
//!
//! Layout:
//! - `gatehouse:{kind}:{sha256}` holds the user id, with `EX` set to the token TTL.
//! - `gatehouse:user:{id}` is a set of that user's session keys. Every write
//!   resets its expiry to the store maximum so it outlives all members.
//!
//! Anything that touches both a session key and an index runs as one Lua
//! script. `put` also drops index members whose key has already expired, and
//! `delete` removes the member from its owner's index. `revoke_all` reads and
//! deletes in one atomic step, so a concurrent sign-in is either revoked or
//! indexed after it. Reads are single commands. Every call is bounded by the
//! configured timeout and never retried.
//!
//! The scripts derive index keys from stored values, so they assume a single
//! Redis node (not a cluster).

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, RedisResult, Script, aio::ConnectionManager};
use std::{future::Future, time::Duration};
use tokio::time::timeout;
use tracing::{Instrument, info_span};

use super::{
    SessionKey, SessionStore, StoreError, USER_INDEX_PREFIX, bounded, clamp_ttl, user_index_key,
};

// KEYS[1] session key, KEYS[2] owner's index.
// ARGV[1] user id, ARGV[2] ttl secs, ARGV[3] index ttl secs, ARGV[4] index prefix.
const PUT_SCRIPT: &str = r"
local previous = redis.call('GET', KEYS[1])
if previous and previous ~= ARGV[1] then
    redis.call('SREM', ARGV[4] .. previous, KEYS[1])
end
redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[2])
for _, member in ipairs(redis.call('SMEMBERS', KEYS[2])) do
    if redis.call('EXISTS', member) == 0 then
        redis.call('SREM', KEYS[2], member)
    end
end
redis.call('SADD', KEYS[2], KEYS[1])
redis.call('EXPIRE', KEYS[2], ARGV[3])
return 1
";

// KEYS[1] session key. ARGV[1] index prefix.
const DELETE_SCRIPT: &str = r"
local owner = redis.call('GET', KEYS[1])
if not owner then
    return 0
end
redis.call('DEL', KEYS[1])
redis.call('SREM', ARGV[1] .. owner, KEYS[1])
return 1
";

// KEYS[1] index. ARGV[1] user id. Only members still owned by the user go.
const REVOKE_ALL_SCRIPT: &str = r"
local removed = 0
for _, member in ipairs(redis.call('SMEMBERS', KEYS[1])) do
    if redis.call('GET', member) == ARGV[1] then
        removed = removed + redis.call('DEL', member)
    end
end
redis.call('DEL', KEYS[1])
return removed
";

#[derive(Clone)]
pub struct RedisSessionStore {
    manager: ConnectionManager,
    timeout: Duration,
    max_ttl: Duration,
    put_script: Script,
    delete_script: Script,
    revoke_all_script: Script,
}

impl std::fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("timeout", &self.timeout)
            .field("max_ttl", &self.max_ttl)
            .finish_non_exhaustive()
    }
}

impl RedisSessionStore {
    /// Connect a managed (auto-reconnecting) connection.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the first connection fails
    /// within `timeout`.
    pub async fn connect(url: &str, timeout_after: Duration, max_ttl: Duration) -> Result<Self> {
        let client = Client::open(url).context("Invalid Redis URL")?;
        let manager = timeout(timeout_after, ConnectionManager::new(client))
            .await
            .context("Timed out connecting to Redis")?
            .context("Failed to connect to Redis")?;

        Ok(Self {
            manager,
            timeout: timeout_after,
            max_ttl,
            put_script: Script::new(PUT_SCRIPT),
            delete_script: Script::new(DELETE_SCRIPT),
            revoke_all_script: Script::new(REVOKE_ALL_SCRIPT),
        })
    }

    async fn bounded<T, F>(&self, command: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>> + Send,
    {
        let span = info_span!("kv.command", db.system = "redis", db.operation = command);
        bounded(self.timeout, &format!("redis {command}"), fut)
            .instrument(span)
            .await
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, key: &SessionKey, user_id: i64, ttl: Duration) -> Result<(), StoreError> {
        let ttl = clamp_ttl(ttl, self.max_ttl);
        let storage_key = key.storage_key();
        let index_ttl = self.max_ttl.as_secs().max(1);

        let mut conn = self.manager.clone();
        let _: i64 = self
            .bounded(
                "EVALSHA put",
                self.put_script
                    .key(&storage_key)
                    .key(user_index_key(user_id))
                    .arg(user_id)
                    .arg(ttl.as_secs())
                    .arg(index_ttl)
                    .arg(USER_INDEX_PREFIX)
                    .invoke_async(&mut conn),
            )
            .await?;
        Ok(())
    }

    async fn get(&self, key: &SessionKey) -> Result<i64, StoreError> {
        let storage_key = key.storage_key();
        let mut conn = self.manager.clone();
        let user_id: Option<i64> = self.bounded("GET", conn.get(&storage_key)).await?;
        user_id.ok_or(StoreError::NotFound)
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), StoreError> {
        let storage_key = key.storage_key();
        let mut conn = self.manager.clone();
        let _removed: i64 = self
            .bounded(
                "EVALSHA delete",
                self.delete_script
                    .key(&storage_key)
                    .arg(USER_INDEX_PREFIX)
                    .invoke_async(&mut conn),
            )
            .await?;
        Ok(())
    }

    async fn revoke_all(&self, user_id: i64) -> Result<u64, StoreError> {
        let mut conn = self.manager.clone();
        let removed: u64 = self
            .bounded(
                "EVALSHA revoke_all",
                self.revoke_all_script
                    .key(user_index_key(user_id))
                    .arg(user_id)
                    .invoke_async(&mut conn),
            )
            .await?;
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let _pong: String = self
            .bounded("PING", redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(())
    }
}
