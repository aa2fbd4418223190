//! # Gatehouse (session and token authority)
//!
//! `gatehouse` authenticates users by email and password and keeps revocable,
//! time-bounded sessions for the HTTP API in front of it.
//!
//! ## Tokens
//!
//! Every sign-in mints two opaque bearer tokens: a short-lived **access token**
//! and a longer-lived **refresh token**. Tokens carry no claims; they are random
//! identifiers that only mean something through a lookup in the session store,
//! so deleting the store entry is the revocation.
//!
//! - **Transport:** `access_token`, `refresh_token` (both `HttpOnly`) and a
//!   script-readable `logged_in` cookie. The access token is also accepted as
//!   `Authorization: Bearer <token>`, which takes precedence over the cookie.
//! - **Refresh:** re-mints the access token only. The refresh token is never
//!   rotated and lives for its full TTL.
//! - **Logout:** deletes both entries and expires all three cookies.
//!
//! ## Stores
//!
//! - Sessions live in Redis (`store`), keyed by the SHA-256 of the token and
//!   namespaced by token kind, with a per-user index for bulk revocation.
//! - Users and application records live in Postgres (`identity`, `records`).
//!
//! Every store call is bounded by a timeout and never retried.

pub mod api;
pub mod cli;
pub mod identity;
pub mod records;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
