//! Postgres-backed identity store.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::{Connection, PgPool, Row, postgres::PgRow};
use std::{future::Future, time::Duration};
use tokio::time::timeout;
use tracing::Instrument;

use super::{CreateOutcome, NewUser, User, UserRecord, UserStore};
use crate::store::{StoreError, bounded};

const USER_COLUMNS: &str = r#"
    id,
    email,
    display_name,
    password_hash,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
"#;

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        bounded(self.timeout, "postgres", fut).await
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        created_at: row.get("created_at"),
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = "users by email"
        );
        let row = self
            .bounded(
                sqlx::query(&query)
                    .bind(email)
                    .fetch_optional(&self.pool)
                    .instrument(span),
            )
            .await?;

        Ok(row.map(|row| UserRecord {
            user: user_from_row(&row),
            password_hash: SecretString::from(row.get::<String, _>("password_hash")),
        }))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = "users by id"
        );
        let row = self
            .bounded(
                sqlx::query(&query)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .instrument(span),
            )
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn create(&self, new_user: NewUser) -> Result<CreateOutcome, StoreError> {
        let query = format!(
            r"
            INSERT INTO users (email, password_hash, display_name)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = "users"
        );
        let insert = sqlx::query(&query)
            .bind(&new_user.email)
            .bind(new_user.password_hash.expose_secret())
            .bind(&new_user.display_name)
            .fetch_one(&self.pool)
            .instrument(span);

        // Unique violations are an outcome, not a store failure.
        let result = match timeout(self.timeout, insert).await {
            Ok(result) => result,
            Err(_) => {
                return Err(StoreError::Unavailable(format!(
                    "postgres: timed out after {}ms",
                    self.timeout.as_millis()
                )));
            }
        };

        match result {
            Ok(row) => Ok(CreateOutcome::Created(user_from_row(&row))),
            Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::Conflict),
            Err(err) => Err(StoreError::Unavailable(format!("postgres: {err}"))),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let span = tracing::info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        let pool = self.pool.clone();
        self.bounded(
            async move {
                let mut conn = pool.acquire().await?;
                conn.ping().await
            }
            .instrument(span),
        )
        .await
    }
}
