use sqlx::{
    postgres::{PgDatabaseError, PgPoolOptions},
    PgPool,
};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from the document store
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Duplicate value for {field}: {value}")]
    UniqueViolation { field: String, value: String },

    #[error("Check constraint violated: {0}")]
    CheckViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.into_owned());
                match code.as_deref() {
                    // unique_violation
                    Some("23505") => {
                        let detail = db
                            .try_downcast_ref::<PgDatabaseError>()
                            .and_then(|pg| pg.detail())
                            .and_then(parse_key_detail);
                        let (field, value) = detail.unwrap_or_else(|| {
                            (db.constraint().unwrap_or("unknown").to_string(), "unknown".to_string())
                        });
                        DatabaseError::UniqueViolation { field, value }
                    }
                    // check_violation
                    Some("23514") => {
                        DatabaseError::CheckViolation(db.constraint().unwrap_or("unknown").to_string())
                    }
                    // invalid_text_representation
                    Some("22P02") => DatabaseError::InvalidValue {
                        field: "value".to_string(),
                        value: db.message().to_string(),
                    },
                    _ => DatabaseError::Sqlx(sqlx::Error::Database(db)),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DatabaseError::Unavailable(err.to_string())
            }
            other => DatabaseError::Sqlx(other),
        }
    }
}

/// Pulls `(field, value)` out of `Key (email)=(a@b.io) already exists.`
fn parse_key_detail(detail: &str) -> Option<(String, String)> {
    let rest = detail.strip_prefix("Key (")?;
    let (field, rest) = rest.split_once(")=(")?;
    let end = rest.rfind(')')?;
    Some((field.to_string(), rest[..end].to_string()))
}

/// Statements applied at startup; each one is idempotent
const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS "tours" (
        "id" TEXT PRIMARY KEY CHECK ("id" ~ '^[0-9a-f]{24}$'),
        "name" TEXT NOT NULL UNIQUE CHECK (char_length("name") BETWEEN 1 AND 40),
        "duration" INTEGER NOT NULL CHECK ("duration" >= 1),
        "max_group_size" INTEGER NOT NULL CHECK ("max_group_size" >= 1),
        "difficulty" TEXT NOT NULL CHECK ("difficulty" IN ('easy', 'medium', 'difficult')),
        "ratings_average" DOUBLE PRECISION NOT NULL DEFAULT 4.5 CHECK ("ratings_average" BETWEEN 1 AND 5),
        "ratings_quantity" INTEGER NOT NULL DEFAULT 0 CHECK ("ratings_quantity" >= 0),
        "price" DOUBLE PRECISION NOT NULL CHECK ("price" >= 0),
        "summary" TEXT NOT NULL,
        "description" TEXT,
        "image_cover" TEXT NOT NULL,
        "images" TEXT[] NOT NULL DEFAULT '{}',
        "start_dates" TIMESTAMPTZ[] NOT NULL DEFAULT '{}',
        "guides" TEXT[] NOT NULL DEFAULT '{}',
        "created_at" TIMESTAMPTZ NOT NULL DEFAULT now(),
        "updated_at" TIMESTAMPTZ NOT NULL DEFAULT now(),
        "version" INTEGER NOT NULL DEFAULT 0
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "users" (
        "id" TEXT PRIMARY KEY CHECK ("id" ~ '^[0-9a-f]{24}$'),
        "name" TEXT NOT NULL,
        "email" TEXT NOT NULL UNIQUE,
        "role" TEXT NOT NULL DEFAULT 'user' CHECK ("role" IN ('user', 'guide', 'lead-guide', 'admin')),
        "photo" TEXT,
        "password" TEXT NOT NULL,
        "password_changed_at" TIMESTAMPTZ,
        "password_reset_token" TEXT,
        "password_reset_expires" TIMESTAMPTZ,
        "tours" TEXT[] NOT NULL DEFAULT '{}',
        "created_at" TIMESTAMPTZ NOT NULL DEFAULT now(),
        "updated_at" TIMESTAMPTZ NOT NULL DEFAULT now(),
        "version" INTEGER NOT NULL DEFAULT 0
    )"#,
    r#"CREATE INDEX IF NOT EXISTS "tours_price_ratings_idx" ON "tours" ("price", "ratings_average" DESC)"#,
    r#"CREATE INDEX IF NOT EXISTS "users_reset_token_idx" ON "users" ("password_reset_token")"#,
];

/// Owns pool construction and schema setup for the single application database
pub struct DatabaseManager;

impl DatabaseManager {
    /// Build a pool without connecting; the first query opens a connection,
    /// so the server can start (and report degraded health) while the
    /// database is down
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        if config.url.is_empty() {
            return Err(DatabaseError::ConfigMissing("DATABASE_URL"));
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_lazy(&config.url)?;

        info!(
            max_connections = config.max_connections,
            "Created database pool"
        );
        Ok(pool)
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    /// Create tables and indexes that do not exist yet
    pub async fn migrate(pool: &PgPool) -> Result<(), DatabaseError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(pool).await?;
        }
        info!("Database schema is up to date");
        Ok(())
    }
}
