//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! `SyllabusStore` and `IdentityService` ports from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool};
use syllabus_core::domain::{Breakdown, Chapter, NewBreakdown, SyllabusSubmission, User};
use syllabus_core::ports::{IdentityService, PortError, PortResult, SyllabusStore};
use uuid::Uuid;

/// Postgres SQLSTATE for `insufficient_privilege`.
const INSUFFICIENT_PRIVILEGE: &str = "42501";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the store and identity ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Converts a `sqlx` error into the port's error vocabulary.
fn port_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(e.to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            PortError::Unavailable(e.to_string())
        }
        sqlx::Error::Database(ref db_err)
            if db_err.code().as_deref() == Some(INSUFFICIENT_PRIVILEGE) =>
        {
            PortError::PermissionDenied(e.to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    display_name: Option<String>,
    email: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            display_name: self.display_name,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct SubmissionRecord {
    id: Uuid,
    user_id: Uuid,
    raw_content: String,
    created_at: DateTime<Utc>,
}
impl SubmissionRecord {
    fn to_domain(self) -> SyllabusSubmission {
        SyllabusSubmission {
            id: self.id,
            owner_id: self.user_id,
            raw_content: self.raw_content,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct BreakdownRecord {
    id: Uuid,
    user_id: Uuid,
    source_content: String,
    chapters: Json<Vec<Chapter>>,
    title: String,
    created_at: DateTime<Utc>,
}
impl BreakdownRecord {
    fn to_domain(self) -> Breakdown {
        Breakdown {
            id: self.id,
            owner_id: self.user_id,
            source_content: self.source_content,
            chapters: self.chapters.0,
            title: self.title,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `SyllabusStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SyllabusStore for DbAdapter {
    async fn list_submissions(&self, owner_id: Uuid) -> PortResult<Vec<SyllabusSubmission>> {
        let records = sqlx::query_as::<_, SubmissionRecord>(
            "SELECT id, user_id, raw_content, created_at FROM syllabuses \
             WHERE user_id = $1 ORDER BY created_at DESC, id ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn insert_submission(
        &self,
        owner_id: Uuid,
        raw_content: &str,
    ) -> PortResult<SyllabusSubmission> {
        let record = sqlx::query_as::<_, SubmissionRecord>(
            "INSERT INTO syllabuses (id, user_id, raw_content) VALUES ($1, $2, $3) \
             RETURNING id, user_id, raw_content, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(raw_content)
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)?;

        Ok(record.to_domain())
    }

    async fn list_breakdowns(&self, owner_id: Uuid) -> PortResult<Vec<Breakdown>> {
        let records = sqlx::query_as::<_, BreakdownRecord>(
            "SELECT id, user_id, source_content, chapters, title, created_at \
             FROM syllabus_breakdowns WHERE user_id = $1 ORDER BY created_at DESC, id ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn insert_breakdown(&self, breakdown: &NewBreakdown) -> PortResult<Breakdown> {
        let record = sqlx::query_as::<_, BreakdownRecord>(
            "INSERT INTO syllabus_breakdowns (id, user_id, source_content, chapters, title) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, user_id, source_content, chapters, title, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(breakdown.owner_id)
        .bind(&breakdown.source_content)
        .bind(Json(&breakdown.chapters))
        .bind(&breakdown.title)
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)?;

        Ok(record.to_domain())
    }
}

//=========================================================================================
// `IdentityService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityService for DbAdapter {
    async fn current_user(&self, session_token: &str) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT u.id, u.display_name, u.email FROM auth_sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > now()",
        )
        .bind(session_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?;

        Ok(record.map(|r| r.to_domain()))
    }

    async fn sign_out(&self, session_token: &str) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_token)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;

        if result.rows_affected() == 0 {
            return Err(PortError::Unauthorized);
        }
        Ok(())
    }
}
