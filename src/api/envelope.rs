//! JSON response envelope shared by every endpoint.
//!
//! Every outcome is `{success, ...}`. Token-bearing responses (sign-in,
//! refresh) and plain data responses are variants of one type, so handlers
//! pick a shape instead of building ad hoc maps.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{identity::User, records::Pagination};

/// Body of sign-in and refresh responses. Refresh carries no `user`.
#[derive(ToSchema, Serialize, Debug)]
pub struct TokenGrant {
    pub success: bool,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[derive(ToSchema, Serialize, Debug)]
#[serde(untagged)]
pub enum Envelope<T> {
    Tokens(TokenGrant),
    Page {
        success: bool,
        data: Vec<T>,
        pagination: Pagination,
    },
    Data {
        success: bool,
        data: T,
    },
    Error {
        success: bool,
        message: String,
    },
}

impl<T> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self::Data {
            success: true,
            data,
        }
    }

    pub fn page(data: Vec<T>, pagination: Pagination) -> Self {
        Self::Page {
            success: true,
            data,
            pagination,
        }
    }

    pub fn tokens(access_token: String, user: Option<User>) -> Self {
        Self::Tokens(TokenGrant {
            success: true,
            access_token,
            user,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            success: false,
            message: message.into(),
        }
    }
}
