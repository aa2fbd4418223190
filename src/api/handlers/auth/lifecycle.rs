//! Session lifecycle: sign-up, sign-in, refresh, logout.
//!
//! States per session are `Unauthenticated -> Authenticated -> Unauthenticated`.
//! Sign-in creates an access and a refresh entry, refresh adds access entries,
//! logout deletes both. The refresh token is never rotated.

use secrecy::{ExposeSecret, SecretString};
use tracing::{error, info};

use super::{
    session::Principal,
    state::AuthState,
    token::SessionToken,
    utils::normalize_email,
};
use crate::{
    api::{error::AuthError, handlers::valid_email},
    identity::{CreateOutcome, NewUser, User},
    store::{SessionKey, TokenKind},
};

/// Result of a successful sign-in.
#[derive(Debug)]
pub struct SignedIn {
    pub user: User,
    pub access: SessionToken,
    pub refresh: SessionToken,
}

/// Result of a successful refresh.
#[derive(Debug)]
pub struct Refreshed {
    pub user: User,
    pub access: SessionToken,
}

fn checked_email(email: &str) -> Result<String, AuthError> {
    let email = normalize_email(email);
    if !valid_email(&email) {
        return Err(AuthError::Validation("invalid email".to_string()));
    }
    Ok(email)
}

fn checked_password(password: &SecretString) -> Result<(), AuthError> {
    if password.expose_secret().is_empty() {
        return Err(AuthError::Validation("password is required".to_string()));
    }
    Ok(())
}

impl AuthState {
    /// Hash the password and create the account through the identity store.
    ///
    /// # Errors
    /// `Validation` for malformed input, `EmailTaken` on conflict, `Hashing`
    /// or `StoreUnavailable` on backend failure.
    pub async fn sign_up(
        &self,
        email: &str,
        password: SecretString,
        display_name: Option<String>,
    ) -> Result<User, AuthError> {
        let email = checked_email(email)?;
        checked_password(&password)?;
        let display_name = display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let password_hash = self.verifier().hash(password).await?;
        let new_user = NewUser {
            email,
            password_hash,
            display_name,
        };

        match self.users().create(new_user).await? {
            CreateOutcome::Created(user) => {
                info!(user_id = user.id, "account created");
                Ok(user)
            }
            CreateOutcome::Conflict => Err(AuthError::EmailTaken),
        }
    }

    /// Verify credentials, mint both tokens and persist them.
    ///
    /// Unknown email and wrong password are the same `InvalidCredentials`.
    ///
    /// # Errors
    /// `Validation`, `InvalidCredentials`, `Hashing`, `TokenGeneration` or
    /// `StoreUnavailable`.
    pub async fn sign_in(&self, email: &str, password: SecretString) -> Result<SignedIn, AuthError> {
        let email = checked_email(email)?;
        checked_password(&password)?;

        let Some(record) = self.users().find_by_email(&email).await? else {
            self.verifier().verify_decoy(password).await?;
            return Err(AuthError::InvalidCredentials);
        };
        if !self.verifier().verify(password, record.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        let user = record.user;
        let access = self.minter().mint_access(user.id)?;
        let refresh = self.minter().mint_refresh(user.id)?;

        self.sessions().put(&access.key(), user.id, access.ttl).await?;
        if let Err(err) = self.sessions().put(&refresh.key(), user.id, refresh.ttl).await {
            // Do not leave a half-created session behind.
            if let Err(cleanup) = self.sessions().delete(&access.key()).await {
                error!("Failed to remove orphaned access entry: {cleanup}");
            }
            return Err(err.into());
        }

        info!(user_id = user.id, "signed in");
        Ok(SignedIn {
            user,
            access,
            refresh,
        })
    }

    /// Mint a new access token from a refresh token. Nothing is minted when
    /// the refresh token does not resolve.
    ///
    /// # Errors
    /// `Unauthenticated` when the refresh token is missing or rejected,
    /// `TokenGeneration` or `StoreUnavailable` on failure.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<Refreshed, AuthError> {
        let refresh_token = refresh_token.ok_or(AuthError::missing(TokenKind::Refresh))?;
        let (user, _) = self.resolve(TokenKind::Refresh, refresh_token).await?;

        let access = self.minter().mint_access(user.id)?;
        self.sessions().put(&access.key(), user.id, access.ttl).await?;

        info!(user_id = user.id, "access token refreshed");
        Ok(Refreshed { user, access })
    }

    /// Delete the presented refresh entry, then the authenticated access entry.
    ///
    /// Both must be present; otherwise nothing is touched.
    ///
    /// # Errors
    /// `Unauthenticated(MissingToken)` when either is absent,
    /// `StoreUnavailable` when a delete fails.
    pub async fn logout(
        &self,
        principal: Option<&Principal>,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        let principal = principal.ok_or(AuthError::missing(TokenKind::Access))?;
        let refresh_token = refresh_token.ok_or(AuthError::missing(TokenKind::Refresh))?;

        // Refresh first, so a failed second delete leaves only the short-lived token.
        self.sessions()
            .delete(&SessionKey::new(TokenKind::Refresh, refresh_token))
            .await?;
        self.sessions().delete(&principal.access_key).await?;

        info!(user_id = principal.user.id, "logged out");
        Ok(())
    }

    /// Revoke every session of the authenticated user.
    ///
    /// # Errors
    /// `StoreUnavailable` when the store fails.
    pub async fn logout_all(&self, principal: &Principal) -> Result<u64, AuthError> {
        let revoked = self.sessions().revoke_all(principal.user.id).await?;
        info!(user_id = principal.user.id, revoked, "all sessions revoked");
        Ok(revoked)
    }
}
