//! Articles: title, content, and a set of category ids.
//!
//! Categories live in `article_categories`. Updates replace the set by
//! difference (insert missing ids, delete removed ones) inside the same
//! transaction as the row update.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use std::{future::Future, time::Duration};
use tokio::time::timeout;
use tracing::Instrument;
use utoipa::ToSchema;

use super::{Page, Pagination, RecordError, RecordStore};

const ARTICLE_SELECT: &str = r#"
    SELECT
        a.id,
        a.title,
        a.content,
        COALESCE(
            array_agg(ac.category_id ORDER BY ac.category_id)
                FILTER (WHERE ac.category_id IS NOT NULL),
            '{}'
        ) AS categories,
        to_char(a.updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
    FROM articles a
    LEFT JOIN article_categories ac ON ac.article_id = a.id
"#;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub categories: Vec<i64>,
    pub updated_at: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
pub struct ArticleInput {
    pub title: String,
    pub content: String,
    pub categories: Option<Vec<i64>>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Default)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub categories: Option<Vec<i64>>,
}

impl ArticleInput {
    fn validate(&self) -> Result<(), RecordError> {
        if self.title.trim().is_empty() {
            return Err(RecordError::Validation("title is required".to_string()));
        }
        if self.categories.as_ref().is_some_and(Vec::is_empty) {
            return Err(RecordError::Validation(
                "categories array is empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl ArticlePatch {
    fn validate(&self) -> Result<(), RecordError> {
        if self.title.is_none() && self.content.is_none() && self.categories.is_none() {
            return Err(RecordError::Validation("nothing to update".to_string()));
        }
        if self.title.as_ref().is_some_and(|t| t.trim().is_empty()) {
            return Err(RecordError::Validation("title must not be empty".to_string()));
        }
        Ok(())
    }
}

fn article_from_row(row: &PgRow) -> Article {
    Article {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        categories: row.get("categories"),
        updated_at: row.get("updated_at"),
    }
}

/// Foreign key violations mean an unknown category id; everything else is a backend fault.
fn db_error(err: sqlx::Error) -> RecordError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().is_some_and(|code| code.as_ref() == "23503") {
            return RecordError::Validation("unknown category".to_string());
        }
    }
    RecordError::Unavailable(format!("postgres: {err}"))
}

#[derive(Clone, Debug)]
pub struct PgArticleStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgArticleStore {
    #[must_use]
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, RecordError>
    where
        F: Future<Output = Result<T, RecordError>> + Send,
    {
        timeout(self.timeout, fut).await.unwrap_or_else(|_| {
            Err(RecordError::Unavailable(format!(
                "postgres: timed out after {}ms",
                self.timeout.as_millis()
            )))
        })
    }

    async fn fetch(&self, id: i64) -> Result<Article, RecordError> {
        let query = format!("{ARTICLE_SELECT} WHERE a.id = $1 GROUP BY a.id");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = "articles by id"
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(db_error)?;
        row.as_ref()
            .map(article_from_row)
            .ok_or(RecordError::NotFound)
    }
}

async fn replace_categories(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    article_id: i64,
    categories: &[i64],
) -> Result<(), RecordError> {
    sqlx::query(
        r"
        DELETE FROM article_categories
        WHERE article_id = $1 AND NOT (category_id = ANY($2))
        ",
    )
    .bind(article_id)
    .bind(categories)
    .execute(&mut **tx)
    .await
    .map_err(db_error)?;

    insert_categories(tx, article_id, categories).await
}

async fn insert_categories(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    article_id: i64,
    categories: &[i64],
) -> Result<(), RecordError> {
    sqlx::query(
        r"
        INSERT INTO article_categories (article_id, category_id)
        SELECT $1, UNNEST($2::BIGINT[])
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(article_id)
    .bind(categories)
    .execute(&mut **tx)
    .await
    .map_err(db_error)?;
    Ok(())
}

#[async_trait]
impl RecordStore for PgArticleStore {
    type Input = ArticleInput;
    type Patch = ArticlePatch;
    type Output = Article;

    async fn create(&self, input: ArticleInput) -> Result<Article, RecordError> {
        input.validate()?;
        let id = self
            .bounded(async {
                let mut tx = self.pool.begin().await.map_err(db_error)?;
                let row = sqlx::query(
                    "INSERT INTO articles (title, content) VALUES ($1, $2) RETURNING id",
                )
                .bind(&input.title)
                .bind(&input.content)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_error)?;
                let id: i64 = row.get("id");

                if let Some(categories) = &input.categories {
                    insert_categories(&mut tx, id, categories).await?;
                }
                tx.commit().await.map_err(db_error)?;
                Ok(id)
            })
            .await?;

        self.bounded(self.fetch(id)).await
    }

    async fn list(&self, page: Page) -> Result<(Vec<Article>, Pagination), RecordError> {
        self.bounded(async {
            let query = format!("{ARTICLE_SELECT} GROUP BY a.id ORDER BY a.id LIMIT $1 OFFSET $2");
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "SELECT",
                db.statement = "articles page"
            );
            let rows = sqlx::query(&query)
                .bind(page.limit)
                .bind(page.offset)
                .fetch_all(&self.pool)
                .instrument(span)
                .await
                .map_err(db_error)?;

            let total: i64 = sqlx::query_scalar("SELECT count(*) FROM articles")
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?;

            Ok((
                rows.iter().map(article_from_row).collect(),
                Pagination {
                    limit: page.limit,
                    offset: page.offset,
                    total,
                },
            ))
        })
        .await
    }

    async fn update(&self, id: i64, patch: ArticlePatch) -> Result<Article, RecordError> {
        patch.validate()?;
        self.bounded(async {
            let mut tx = self.pool.begin().await.map_err(db_error)?;

            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("UPDATE articles SET updated_at = NOW()");
            if let Some(title) = &patch.title {
                builder.push(", title = ").push_bind(title);
            }
            if let Some(content) = &patch.content {
                builder.push(", content = ").push_bind(content);
            }
            builder.push(" WHERE id = ").push_bind(id).push(" RETURNING id");

            let updated = builder
                .build()
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error)?;
            if updated.is_none() {
                return Err(RecordError::NotFound);
            }

            if let Some(categories) = &patch.categories {
                replace_categories(&mut tx, id, categories).await?;
            }
            tx.commit().await.map_err(db_error)?;
            Ok(())
        })
        .await?;

        self.bounded(self.fetch(id)).await
    }
}
