//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for browsing and generating syllabus breakdowns.

use serde::{Deserialize, Serialize};
use syllabus_core::SessionUpdate;
use uuid::Uuid;

use crate::web::rest::{BreakdownResponse, SubmissionResponse};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// The deep-link target changed (the `chat` query parameter). Any string is accepted.
    SetTarget { target: Option<String> },

    /// The user picked a breakdown from the list.
    Select { breakdown_id: Uuid },

    /// Re-query both collections.
    Refresh,

    /// Generate a breakdown from raw syllabus text.
    Upload { content: String },

    /// A breakdown was stored elsewhere (e.g. over REST) and should be shown.
    Uploaded { breakdown_id: Uuid },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The full breakdown list, newest first.
    Breakdowns { items: Vec<BreakdownResponse> },

    /// The full submission list, newest first.
    Syllabuses { items: Vec<SubmissionResponse> },

    /// The active breakdown. `stale` means the last reload failed and it may be outdated.
    Selection {
        active: Option<BreakdownResponse>,
        stale: bool,
    },

    /// A reload failed; the previous list is still valid.
    LoadFailed { collection: String, message: String },

    /// A `select` named a breakdown that is not in the loaded list.
    SelectionRejected { message: String },

    GenerationSucceeded { breakdown_id: Uuid },

    GenerationFailed { message: String },

    /// Reports a protocol error to the client, which should display an error message.
    Error { message: String },
}

impl From<SessionUpdate> for ServerMessage {
    fn from(update: SessionUpdate) -> Self {
        match update {
            SessionUpdate::Breakdowns(items) => ServerMessage::Breakdowns {
                items: items.into_iter().map(BreakdownResponse::from).collect(),
            },
            SessionUpdate::Submissions(items) => ServerMessage::Syllabuses {
                items: items.into_iter().map(SubmissionResponse::from).collect(),
            },
            SessionUpdate::Selection { active, stale } => ServerMessage::Selection {
                active: active.map(BreakdownResponse::from),
                stale,
            },
            SessionUpdate::LoadFailed { collection, error } => ServerMessage::LoadFailed {
                collection: collection.name().to_string(),
                message: error.to_string(),
            },
            SessionUpdate::SelectionRejected(e) => ServerMessage::SelectionRejected {
                message: e.to_string(),
            },
            SessionUpdate::GenerationFinished(Ok(breakdown_id)) => {
                ServerMessage::GenerationSucceeded { breakdown_id }
            }
            SessionUpdate::GenerationFinished(Err(e)) => ServerMessage::GenerationFailed {
                message: e.to_string(),
            },
        }
    }
}
