//! crates/syllabus_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the external collaborators.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete store, identity provider and LLM backend.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Breakdown, Chapter, NewBreakdown, SyllabusSubmission, User};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Append-only document store. Every query is scoped to one owner and ordered
/// by `created_at` descending.
#[async_trait]
pub trait SyllabusStore: Send + Sync {
    // --- Submissions ---
    async fn list_submissions(&self, owner_id: Uuid) -> PortResult<Vec<SyllabusSubmission>>;

    async fn insert_submission(
        &self,
        owner_id: Uuid,
        raw_content: &str,
    ) -> PortResult<SyllabusSubmission>;

    // --- Breakdowns ---
    async fn list_breakdowns(&self, owner_id: Uuid) -> PortResult<Vec<Breakdown>>;

    /// Persists a breakdown in a single write and returns the stored record.
    async fn insert_breakdown(&self, breakdown: &NewBreakdown) -> PortResult<Breakdown>;
}

#[async_trait]
pub trait StructuringService: Send + Sync {
    /// Turns raw syllabus text into an ordered list of chapters.
    async fn structure_syllabus(&self, content: &str) -> PortResult<Vec<Chapter>>;
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Resolves a session token to its principal, or `None` when the token is unknown or expired.
    async fn current_user(&self, session_token: &str) -> PortResult<Option<User>>;

    async fn sign_out(&self, session_token: &str) -> PortResult<()>;
}
