//! crates/syllabus_core/src/session.rs
//!
//! The event loop behind one active view.
//!
//! A `SyncSession` owns the repository and the selection controller for a
//! single user session. Everything that can change them (user actions, load
//! completions, generation results, upload notices) arrives as an event and is
//! applied on this one task, in arrival order. Store queries and generation
//! run on spawned tasks and report back through the same queue.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{Breakdown, Collection, SyllabusSubmission, User};
use crate::error::{GenerationError, LoadError, SelectionError, SessionError};
use crate::pipeline::{GenerationPipeline, UploadNotice};
use crate::ports::{PortResult, SyllabusStore};
use crate::repository::{BreakdownRepository, LoadOutcome, LoadTicket, PendingLoad};
use crate::selection::{Selection, SelectionController};

const EVENT_QUEUE_CAPACITY: usize = 32;

/// Inputs of the session loop.
#[derive(Debug)]
pub enum SessionEvent {
    IdentityChanged(Option<User>),
    TargetChanged(Option<String>),
    Refresh,
    UserSelected(Uuid),
    Upload(String),
    Uploaded(Uuid),
    BreakdownsLoaded {
        ticket: LoadTicket,
        result: PortResult<Vec<Breakdown>>,
    },
    SubmissionsLoaded {
        ticket: LoadTicket,
        result: PortResult<Vec<SyllabusSubmission>>,
    },
    GenerationFinished(Result<Breakdown, GenerationError>),
}

/// Outputs of the session loop, in the order they happened.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    Breakdowns(Vec<Breakdown>),
    Submissions(Vec<SyllabusSubmission>),
    Selection {
        active: Option<Breakdown>,
        stale: bool,
    },
    LoadFailed {
        collection: Collection,
        error: LoadError,
    },
    SelectionRejected(SelectionError),
    GenerationFinished(Result<Uuid, GenerationError>),
}

/// Cheap, cloneable entry point into a running session.
#[derive(Clone)]
pub struct SessionHandle {
    events: mpsc::Sender<SessionEvent>,
    shutdown: CancellationToken,
}

impl SessionHandle {
    pub async fn set_identity(&self, user: Option<User>) -> Result<(), SessionError> {
        self.send(SessionEvent::IdentityChanged(user)).await
    }

    pub async fn set_target(&self, target: Option<String>) -> Result<(), SessionError> {
        self.send(SessionEvent::TargetChanged(target)).await
    }

    pub async fn refresh(&self) -> Result<(), SessionError> {
        self.send(SessionEvent::Refresh).await
    }

    pub async fn select(&self, breakdown_id: Uuid) -> Result<(), SessionError> {
        self.send(SessionEvent::UserSelected(breakdown_id)).await
    }

    /// Runs the generation pipeline for `raw_text` on behalf of the signed-in user.
    pub async fn upload(&self, raw_text: String) -> Result<(), SessionError> {
        self.send(SessionEvent::Upload(raw_text)).await
    }

    /// Reports a breakdown stored outside this session; it is reloaded and selected.
    pub async fn uploaded(&self, breakdown_id: Uuid) -> Result<(), SessionError> {
        self.send(SessionEvent::Uploaded(breakdown_id)).await
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn send(&self, event: SessionEvent) -> Result<(), SessionError> {
        self.events
            .send(event)
            .await
            .map_err(|_| SessionError::Closed)
    }
}

pub struct SyncSession {
    repository: BreakdownRepository,
    pipeline: Arc<GenerationPipeline>,
    selection: SelectionController,
    owner: Option<User>,
    events_tx: mpsc::WeakSender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    uploads: broadcast::Receiver<UploadNotice>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
    shutdown: CancellationToken,
    published: Selection,
}

impl SyncSession {
    /// Builds a session that is not running yet.
    ///
    /// The loop stops when every handle is dropped or `shutdown` is called.
    pub fn new(
        store: Arc<dyn SyllabusStore>,
        pipeline: Arc<GenerationPipeline>,
    ) -> (Self, SessionHandle, mpsc::UnboundedReceiver<SessionUpdate>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (updates, updates_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let uploads = pipeline.subscribe();

        let session = Self {
            repository: BreakdownRepository::new(store),
            pipeline,
            selection: SelectionController::new(),
            owner: None,
            events_tx: events_tx.downgrade(),
            events_rx,
            uploads,
            updates,
            shutdown: shutdown.clone(),
            published: Selection::Unselected,
        };
        let handle = SessionHandle {
            events: events_tx,
            shutdown,
        };
        (session, handle, updates_rx)
    }

    /// Builds a session and runs it on a new tokio task.
    pub fn spawn(
        store: Arc<dyn SyllabusStore>,
        pipeline: Arc<GenerationPipeline>,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<SessionUpdate>) {
        let (session, handle, updates) = Self::new(store, pipeline);
        tokio::spawn(session.run());
        (handle, updates)
    }

    pub async fn run(mut self) {
        info!("Sync session started.");
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                // Notices go first: a generation publishes its notice before it
                // queues its own result.
                notice = self.uploads.recv() => match notice {
                    Ok(notice) => self.on_upload_notice(notice),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed upload notices; reloading.");
                        self.reload();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
            }
        }
        self.shutdown.cancel();
        info!("Sync session ended.");
    }

    fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::IdentityChanged(user) => self.on_identity_changed(user),
            SessionEvent::TargetChanged(target) => {
                self.selection.on_target_changed(target.as_deref());
                self.publish_selection();
            }
            SessionEvent::Refresh => self.reload(),
            SessionEvent::UserSelected(breakdown_id) => match self.selection.select(breakdown_id) {
                Ok(_) => self.publish_selection(),
                Err(e) => {
                    warn!(error = %e, "Rejected selection.");
                    self.emit(SessionUpdate::SelectionRejected(e));
                }
            },
            SessionEvent::Upload(raw_text) => self.start_generation(raw_text),
            SessionEvent::Uploaded(breakdown_id) => self.on_generated(breakdown_id),
            SessionEvent::BreakdownsLoaded { ticket, result } => {
                match self.repository.complete_breakdowns(ticket, result) {
                    LoadOutcome::Applied => {
                        let breakdowns = self.repository.breakdowns();
                        let ids: Vec<Uuid> = breakdowns.iter().map(|b| b.id).collect();
                        self.emit(SessionUpdate::Breakdowns(breakdowns.to_vec()));
                        self.selection.on_loaded(&ids);
                        self.publish_selection();
                    }
                    LoadOutcome::Failed(error) => {
                        self.emit(SessionUpdate::LoadFailed {
                            collection: Collection::Breakdowns,
                            error,
                        });
                        self.selection.on_load_failed();
                        self.publish_selection();
                    }
                    LoadOutcome::Superseded => {}
                }
            }
            SessionEvent::SubmissionsLoaded { ticket, result } => {
                match self.repository.complete_submissions(ticket, result) {
                    LoadOutcome::Applied => {
                        let submissions = self.repository.submissions().to_vec();
                        self.emit(SessionUpdate::Submissions(submissions));
                    }
                    LoadOutcome::Failed(error) => self.emit(SessionUpdate::LoadFailed {
                        collection: Collection::Submissions,
                        error,
                    }),
                    LoadOutcome::Superseded => {}
                }
            }
            SessionEvent::GenerationFinished(result) => {
                // The reload itself is triggered by the upload notice.
                self.emit(SessionUpdate::GenerationFinished(result.map(|b| b.id)));
            }
        }
    }

    fn on_identity_changed(&mut self, user: Option<User>) {
        let changed = self.repository.set_owner(user.as_ref().map(|u| u.id));
        self.owner = user;
        if changed {
            info!(owner_id = ?self.repository.owner_id(), "Session identity changed.");
            self.selection.reset();
            self.emit(SessionUpdate::Breakdowns(Vec::new()));
            self.emit(SessionUpdate::Submissions(Vec::new()));
            self.publish_selection();
        }
        self.reload();
    }

    fn on_upload_notice(&mut self, notice: UploadNotice) {
        if self.repository.owner_id() == Some(notice.owner_id) {
            self.on_generated(notice.breakdown_id);
        }
    }

    fn on_generated(&mut self, breakdown_id: Uuid) {
        debug!(%breakdown_id, "New breakdown; reloading.");
        self.selection.on_generated(breakdown_id);
        self.reload();
    }

    fn reload(&mut self) {
        if let Some(pending) = self.repository.dispatch_breakdowns() {
            self.forward(pending, |ticket, result| SessionEvent::BreakdownsLoaded {
                ticket,
                result,
            });
        }
        if let Some(pending) = self.repository.dispatch_submissions() {
            self.forward(pending, |ticket, result| SessionEvent::SubmissionsLoaded {
                ticket,
                result,
            });
        }
    }

    /// Runs a dispatched load on its own task and queues its result.
    fn forward<T, F>(&self, pending: PendingLoad<T>, into_event: F)
    where
        T: Send + 'static,
        F: FnOnce(LoadTicket, PortResult<Vec<T>>) -> SessionEvent + Send + 'static,
    {
        let Some(events) = self.events_tx.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let PendingLoad { ticket, future } = pending;
            if let Some(result) = future.await {
                let _ = events.send(into_event(ticket, result)).await;
            }
        });
    }

    fn start_generation(&mut self, raw_text: String) {
        let Some(owner_id) = self.owner.as_ref().map(|u| u.id) else {
            warn!("Upload ignored: no signed-in user.");
            return;
        };
        let Some(events) = self.events_tx.upgrade() else {
            return;
        };
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move {
            let result = pipeline.generate(owner_id, &raw_text).await;
            let _ = events.send(SessionEvent::GenerationFinished(result)).await;
        });
    }

    fn publish_selection(&mut self) {
        let state = self.selection.state();
        if self.published == state {
            return;
        }
        self.published = state;
        let active = state
            .active_id()
            .and_then(|id| self.repository.get(id))
            .cloned();
        let stale = matches!(state, Selection::Stale(_));
        self.emit(SessionUpdate::Selection { active, stale });
    }

    fn emit(&self, update: SessionUpdate) {
        if self.updates.send(update).is_err() {
            debug!("Update receiver dropped.");
        }
    }
}
