//! Session validation and the request gate.
//!
//! Flow: take the presented token (bearer header first, then cookie), look it
//! up in the session store, then load the user it points at. A missing entry
//! and a deleted user are both rejections. Validation never writes.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::{cookies::presented_access_token, state::AuthState};
use crate::{
    api::error::AuthError,
    identity::User,
    store::{SessionKey, TokenKind},
};

/// Authenticated request context, inserted by [`require_auth`].
#[derive(Clone, Debug)]
pub struct Principal {
    pub user: User,
    /// Store key of the access token that authenticated this request, so
    /// logout can revoke exactly that entry.
    pub access_key: SessionKey,
}

impl AuthState {
    /// Resolve a raw token of `kind` to its user.
    ///
    /// # Errors
    /// `Unauthenticated(Rejected)` when the store has no entry or the user no
    /// longer exists; `StoreUnavailable` when either store fails.
    pub async fn resolve(&self, kind: TokenKind, token: &str) -> Result<(User, SessionKey), AuthError> {
        let key = SessionKey::new(kind, token);
        let user_id = self.sessions().get(&key).await?;
        let Some(user) = self.users().find_by_id(user_id).await? else {
            debug!(user_id, "session points at a missing user");
            return Err(AuthError::rejected());
        };
        Ok((user, key))
    }

    /// Authenticate a request from its headers.
    ///
    /// # Errors
    /// `Unauthenticated(MissingToken)` when no access token is presented,
    /// otherwise as [`AuthState::resolve`].
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = presented_access_token(headers).ok_or(AuthError::missing(TokenKind::Access))?;
        let (user, access_key) = self.resolve(TokenKind::Access, &token).await?;
        Ok(Principal { user, access_key })
    }
}

/// Gate for protected routes. Inserts the [`Principal`] on success.
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match state.authenticate(request.headers()).await {
        Ok(principal) => {
            debug!(user_id = principal.user.id, "request authenticated");
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}
