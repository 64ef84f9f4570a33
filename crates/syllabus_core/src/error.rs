//! crates/syllabus_core/src/error.rs
//!
//! Error kinds surfaced by the core components. Collaborator failures arrive as
//! `PortError` and are converted here, so none of them reach the selection logic raw.

use uuid::Uuid;

use crate::domain::Chapter;
use crate::ports::PortError;

/// Failure to load one of the owner's collections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl From<PortError> for LoadError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::PermissionDenied(msg) => LoadError::PermissionDenied(msg),
            PortError::Unauthorized => LoadError::PermissionDenied("unauthorized".to_string()),
            other => LoadError::StoreUnavailable(other.to_string()),
        }
    }
}

/// Failure of a single generation request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    /// The submitted text was empty or whitespace only.
    #[error("Please provide syllabus content.")]
    EmptyInput,

    /// The structuring service failed or returned no chapters.
    #[error("Failed to generate chapter breakdown: {0}")]
    Upstream(String),

    /// Structuring succeeded but the breakdown could not be saved.
    /// The chapters are kept so the caller can retry the write alone.
    #[error("Breakdown was generated but could not be saved: {reason}")]
    Persist {
        chapters: Vec<Chapter>,
        reason: String,
    },
}

/// Failure of an identity operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Not signed in")]
    NotSignedIn,
    #[error("Identity provider error: {0}")]
    Provider(String),
}

impl From<PortError> for AuthError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Unauthorized | PortError::NotFound(_) => AuthError::NotSignedIn,
            other => AuthError::Provider(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("Breakdown {0} is not in the loaded list")]
    NotLoaded(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("The session has already shut down")]
    Closed,
}
