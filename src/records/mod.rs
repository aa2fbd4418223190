//! Record store: create, paginated list, and update keyed by integer ids.
//!
//! Handlers are generic over [`RecordStore`], so every entity is consumed the
//! same way regardless of its shape. Articles are the one entity shipped here.

pub mod articles;

pub use self::articles::PgArticleStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_LIMIT: i64 = 20;

/// Query parameters for list endpoints.
#[derive(Debug, Default, Clone, Copy, Deserialize, IntoParams)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageParams {
    /// Resolve defaults and reject negative or zero limits.
    ///
    /// # Errors
    /// Returns `RecordError::Validation` for out-of-range values.
    pub fn resolve(self) -> Result<Page, RecordError> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        let offset = self.offset.unwrap_or(0);
        if limit <= 0 {
            return Err(RecordError::Validation("limit must be positive".to_string()));
        }
        if offset < 0 {
            return Err(RecordError::Validation(
                "offset must not be negative".to_string(),
            ));
        }
        Ok(Page { limit, offset })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("{0}")]
    Validation(String),
    #[error("record not found")]
    NotFound,
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    type Input: DeserializeOwned + Send + 'static;
    type Patch: DeserializeOwned + Send + 'static;
    type Output: Serialize + Send + 'static;

    async fn create(&self, input: Self::Input) -> Result<Self::Output, RecordError>;

    async fn list(&self, page: Page) -> Result<(Vec<Self::Output>, Pagination), RecordError>;

    async fn update(&self, id: i64, patch: Self::Patch) -> Result<Self::Output, RecordError>;
}
