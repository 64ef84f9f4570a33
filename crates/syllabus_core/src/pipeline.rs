//! crates/syllabus_core/src/pipeline.rs
//!
//! Turns raw syllabus text into a stored breakdown: structuring call, single
//! write, then an upload notice so open sessions of the owner reload.
//!
//! Each call runs at most once. There is no retry and no deduplication, so
//! two identical submissions produce two breakdowns.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{Breakdown, Chapter, NewBreakdown};
use crate::error::GenerationError;
use crate::ports::{StructuringService, SyllabusStore};

const UPLOAD_CHANNEL_CAPACITY: usize = 64;

/// Published after a breakdown has been stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadNotice {
    pub owner_id: Uuid,
    pub breakdown_id: Uuid,
}

pub struct GenerationPipeline {
    store: Arc<dyn SyllabusStore>,
    structuring: Arc<dyn StructuringService>,
    uploads: broadcast::Sender<UploadNotice>,
}

impl GenerationPipeline {
    pub fn new(store: Arc<dyn SyllabusStore>, structuring: Arc<dyn StructuringService>) -> Self {
        let (uploads, _) = broadcast::channel(UPLOAD_CHANNEL_CAPACITY);
        Self {
            store,
            structuring,
            uploads,
        }
    }

    /// Receives a notice for every breakdown stored from now on, for any owner.
    pub fn subscribe(&self) -> broadcast::Receiver<UploadNotice> {
        self.uploads.subscribe()
    }

    /// Generates and stores a breakdown for `raw_text`.
    ///
    /// # Errors
    /// - `EmptyInput` for blank text, before any collaborator is called.
    /// - `Upstream` when structuring fails or yields no chapters. Nothing is written.
    /// - `Persist` when the write fails; the returned chapters can be passed to
    ///   [`GenerationPipeline::persist_chapters`].
    pub async fn generate(
        &self,
        owner_id: Uuid,
        raw_text: &str,
    ) -> Result<Breakdown, GenerationError> {
        if raw_text.trim().is_empty() {
            return Err(GenerationError::EmptyInput);
        }

        info!(%owner_id, chars = raw_text.chars().count(), "Structuring syllabus.");
        let chapters = self
            .structuring
            .structure_syllabus(raw_text)
            .await
            .map_err(|e| {
                error!(%owner_id, error = %e, "Structuring service failed.");
                GenerationError::Upstream(e.to_string())
            })?;

        self.persist_chapters(owner_id, raw_text, chapters).await
    }

    /// Stores already structured chapters without calling the structuring service again.
    pub async fn persist_chapters(
        &self,
        owner_id: Uuid,
        raw_text: &str,
        chapters: Vec<Chapter>,
    ) -> Result<Breakdown, GenerationError> {
        if raw_text.trim().is_empty() {
            return Err(GenerationError::EmptyInput);
        }
        if chapters.is_empty() {
            return Err(GenerationError::Upstream(
                "the structuring service returned no chapters".to_string(),
            ));
        }

        let new_breakdown = NewBreakdown::new(owner_id, raw_text, chapters);
        let breakdown = match self.store.insert_breakdown(&new_breakdown).await {
            Ok(breakdown) => breakdown,
            Err(e) => {
                error!(%owner_id, error = %e, "Failed to save breakdown.");
                return Err(GenerationError::Persist {
                    chapters: new_breakdown.chapters,
                    reason: e.to_string(),
                });
            }
        };
        info!(%owner_id, breakdown_id = %breakdown.id, title = %breakdown.title, "Breakdown saved.");

        if let Err(e) = self.store.insert_submission(owner_id, raw_text).await {
            warn!(%owner_id, error = %e, "Breakdown saved but the submission record was not.");
        }

        self.notify_uploaded(owner_id, breakdown.id);
        Ok(breakdown)
    }

    /// Tells every open session of `owner_id` that `breakdown_id` was just stored.
    pub fn notify_uploaded(&self, owner_id: Uuid, breakdown_id: Uuid) {
        // Sending only fails when no session is listening.
        let listeners = self
            .uploads
            .send(UploadNotice {
                owner_id,
                breakdown_id,
            })
            .unwrap_or(0);
        debug!(%owner_id, %breakdown_id, listeners, "Upload notice published.");
    }
}
