//! Auth handlers and supporting modules.
//!
//! Sessions are opaque bearer tokens tracked in the session store. A sign-in
//! mints an access token and a refresh token; the store maps each to the user
//! id with its own TTL.
//!
//! ## Transport
//!
//! - `access_token` cookie (`HttpOnly`), or `Authorization: Bearer`, which wins.
//! - `refresh_token` cookie (`HttpOnly`), read only by refresh and logout.
//! - `logged_in=true` cookie, readable by scripts, same lifetime as the access token.
//!
//! ## Status codes
//!
//! No token is `401`. A token the store does not know (expired, revoked, or
//! pointing at a deleted user) is `403`.

pub(crate) mod cookies;
pub mod lifecycle;
pub mod login;
pub mod logout;
pub mod me;
pub mod password;
pub mod refresh;
pub mod session;
pub mod signup;
mod state;
pub mod token;
pub mod types;
mod utils;

pub use lifecycle::{Refreshed, SignedIn};
pub use password::CredentialVerifier;
pub use session::{Principal, require_auth};
pub use state::{AuthConfig, AuthState};
pub use token::{SessionToken, TokenMinter};
