//! services/api/src/web/state.rs
//!
//! Defines the application state shared by every handler and connection.

use std::sync::Arc;
use syllabus_core::{
    ports::{IdentityService, SyllabusStore},
    GenerationPipeline,
};

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// Per-connection state lives in the `SyncSession` spawned by the WebSocket handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SyllabusStore>,
    pub identity: Arc<dyn IdentityService>,
    /// One pipeline for the whole process, so an upload made over REST is
    /// announced to every open WebSocket session of the same user.
    pub pipeline: Arc<GenerationPipeline>,
}
