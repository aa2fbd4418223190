//! Error taxonomy for the auth core and its mapping to HTTP responses.
//!
//! Backend detail (driver errors, timeouts, hashing failures) is logged here
//! and never sent to the client.

use axum::{
    Json,
    http::{StatusCode, header::InvalidHeaderValue},
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use super::envelope::Envelope;
use crate::{
    records::RecordError,
    store::{StoreError, TokenKind},
};

const GENERIC_INTERNAL: &str = "internal server error";
const GENERIC_UNAVAILABLE: &str = "service temporarily unavailable";

/// Why a request is not authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unauthenticated {
    /// No token of this kind was presented.
    MissingToken(TokenKind),
    /// A token was presented but the session store (or the identity store)
    /// did not resolve it.
    Rejected,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email already registered")]
    EmailTaken,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("token generation failed: {0}")]
    TokenGeneration(String),
    #[error("invalid cookie header: {0}")]
    Cookie(#[from] InvalidHeaderValue),
    #[error("unauthenticated: {0:?}")]
    Unauthenticated(Unauthenticated),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl AuthError {
    #[must_use]
    pub const fn missing(kind: TokenKind) -> Self {
        Self::Unauthenticated(Unauthenticated::MissingToken(kind))
    }

    #[must_use]
    pub const fn rejected() -> Self {
        Self::Unauthenticated(Unauthenticated::Rejected)
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidCredentials | Self::StoreUnavailable(_) => StatusCode::BAD_REQUEST,
            Self::EmailTaken => StatusCode::CONFLICT,
            Self::Hashing(_) | Self::TokenGeneration(_) | Self::Cookie(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unauthenticated(Unauthenticated::MissingToken(_)) => StatusCode::UNAUTHORIZED,
            Self::Unauthenticated(Unauthenticated::Rejected) => StatusCode::FORBIDDEN,
        }
    }

    /// Message safe to return to the client.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::InvalidCredentials | Self::EmailTaken => self.to_string(),
            Self::Hashing(_) | Self::TokenGeneration(_) | Self::Cookie(_) => {
                GENERIC_INTERNAL.to_string()
            }
            Self::Unauthenticated(Unauthenticated::MissingToken(kind)) => {
                format!("no {kind} token")
            }
            Self::Unauthenticated(Unauthenticated::Rejected) => {
                "token is invalid or expired".to_string()
            }
            Self::StoreUnavailable(_) => GENERIC_UNAVAILABLE.to_string(),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::rejected(),
            StoreError::Unavailable(detail) => Self::StoreUnavailable(detail),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            Self::Hashing(_)
            | Self::TokenGeneration(_)
            | Self::Cookie(_)
            | Self::StoreUnavailable(_) => {
                error!("{self}");
            }
            _ => debug!("{self}"),
        }
        let status = self.status();
        (status, Json(Envelope::<()>::error(self.client_message()))).into_response()
    }
}

impl IntoResponse for RecordError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(message) => (StatusCode::UNPROCESSABLE_ENTITY, message.clone()),
            Self::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            Self::Unavailable(detail) => {
                error!("record store failure: {detail}");
                (StatusCode::BAD_REQUEST, GENERIC_UNAVAILABLE.to_string())
            }
        };
        (status, Json(Envelope::<()>::error(message))).into_response()
    }
}
