//! crates/syllabus_core/src/repository.rs
//!
//! In-memory cache of one owner's breakdowns and submissions.
//!
//! Loads can be driven two ways. `load`/`reload` await the store directly.
//! `dispatch_*`/`complete_*` split a load in two so an event loop can run the
//! query elsewhere and apply the result later. Every dispatch gets a sequence
//! number and only the latest dispatched load of a collection may change its
//! cache; older ones are cancelled and their results reported as superseded.

use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{newest_first, Breakdown, Collection, Stamped, SyllabusSubmission};
use crate::error::LoadError;
use crate::ports::{PortResult, SyllabusStore};

/// Identifies one dispatched load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub collection: Collection,
    pub owner_id: Uuid,
    seq: u64,
}

/// The query half of a dispatched load. Resolves to `None` once superseded.
pub type LoadFuture<T> = BoxFuture<'static, Option<PortResult<Vec<T>>>>;

pub struct PendingLoad<T> {
    pub ticket: LoadTicket,
    pub future: LoadFuture<T>,
}

/// What applying a load result did to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The result replaced the cached list.
    Applied,
    /// The load was the latest one but failed; the cached list is untouched.
    Failed(LoadError),
    /// A newer load was dispatched (or the owner changed) in the meantime.
    Superseded,
}

impl LoadOutcome {
    pub fn into_result(self) -> Result<(), LoadError> {
        match self {
            LoadOutcome::Failed(err) => Err(err),
            LoadOutcome::Applied | LoadOutcome::Superseded => Ok(()),
        }
    }
}

struct Slot<T> {
    collection: Collection,
    dispatched: u64,
    items: Vec<T>,
    last_error: Option<LoadError>,
    in_flight: Option<CancellationToken>,
}

impl<T: Stamped> Slot<T> {
    fn new(collection: Collection) -> Self {
        Self {
            collection,
            dispatched: 0,
            items: Vec::new(),
            last_error: None,
            in_flight: None,
        }
    }

    fn supersede_in_flight(&mut self) {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
    }

    fn dispatch(&mut self, owner_id: Uuid) -> (LoadTicket, CancellationToken) {
        self.supersede_in_flight();
        self.dispatched += 1;
        let token = CancellationToken::new();
        self.in_flight = Some(token.clone());
        let ticket = LoadTicket {
            collection: self.collection,
            owner_id,
            seq: self.dispatched,
        };
        (ticket, token)
    }

    fn complete(
        &mut self,
        owner_id: Option<Uuid>,
        ticket: LoadTicket,
        result: Option<PortResult<Vec<T>>>,
    ) -> LoadOutcome {
        if ticket.collection != self.collection
            || Some(ticket.owner_id) != owner_id
            || ticket.seq != self.dispatched
        {
            debug!(
                collection = self.collection.name(),
                seq = ticket.seq,
                latest = self.dispatched,
                "Ignoring superseded load result."
            );
            return LoadOutcome::Superseded;
        }
        let Some(result) = result else {
            return LoadOutcome::Superseded;
        };
        self.in_flight = None;

        match result {
            Ok(mut items) => {
                let before = items.len();
                items.retain(|item| item.owner_id() == ticket.owner_id);
                if items.len() != before {
                    warn!(
                        collection = self.collection.name(),
                        dropped = before - items.len(),
                        "Store returned records of another owner; dropped them."
                    );
                }
                items.sort_by(newest_first);
                self.items = items;
                self.last_error = None;
                LoadOutcome::Applied
            }
            Err(err) => {
                let err = LoadError::from(err);
                warn!(collection = self.collection.name(), error = %err, "Load failed; keeping last-known-good list.");
                self.last_error = Some(err.clone());
                LoadOutcome::Failed(err)
            }
        }
    }

    fn reset(&mut self) {
        self.supersede_in_flight();
        // Bumping the counter also invalidates tickets that were already handed out.
        self.dispatched += 1;
        self.items.clear();
        self.last_error = None;
    }
}

/// Owner-scoped cache over a [`SyllabusStore`].
pub struct BreakdownRepository {
    store: Arc<dyn SyllabusStore>,
    owner_id: Option<Uuid>,
    breakdowns: Slot<Breakdown>,
    submissions: Slot<SyllabusSubmission>,
}

impl BreakdownRepository {
    pub fn new(store: Arc<dyn SyllabusStore>) -> Self {
        Self {
            store,
            owner_id: None,
            breakdowns: Slot::new(Collection::Breakdowns),
            submissions: Slot::new(Collection::Submissions),
        }
    }

    pub fn owner_id(&self) -> Option<Uuid> {
        self.owner_id
    }

    /// Switches the owner. On change both caches are cleared and every
    /// in-flight load is superseded. Returns whether the owner changed.
    pub fn set_owner(&mut self, owner_id: Option<Uuid>) -> bool {
        if self.owner_id == owner_id {
            return false;
        }
        self.owner_id = owner_id;
        self.breakdowns.reset();
        self.submissions.reset();
        true
    }

    /// Breakdowns of the current owner, newest first.
    pub fn breakdowns(&self) -> &[Breakdown] {
        &self.breakdowns.items
    }

    /// Submissions of the current owner, newest first.
    pub fn submissions(&self) -> &[SyllabusSubmission] {
        &self.submissions.items
    }

    pub fn get(&self, breakdown_id: Uuid) -> Option<&Breakdown> {
        self.breakdowns.items.iter().find(|b| b.id == breakdown_id)
    }

    pub fn last_error(&self, collection: Collection) -> Option<&LoadError> {
        match collection {
            Collection::Breakdowns => self.breakdowns.last_error.as_ref(),
            Collection::Submissions => self.submissions.last_error.as_ref(),
        }
    }

    pub fn is_loading(&self, collection: Collection) -> bool {
        match collection {
            Collection::Breakdowns => self.breakdowns.in_flight.is_some(),
            Collection::Submissions => self.submissions.in_flight.is_some(),
        }
    }

    //=====================================================================================
    // Split dispatch / complete API
    //=====================================================================================

    /// Starts a breakdown load for the current owner. Returns `None` when nobody is signed in.
    pub fn dispatch_breakdowns(&mut self) -> Option<PendingLoad<Breakdown>> {
        let owner_id = self.owner_id?;
        let (ticket, token) = self.breakdowns.dispatch(owner_id);
        let store = Arc::clone(&self.store);
        let future = async move {
            tokio::select! {
                _ = token.cancelled() => None,
                result = store.list_breakdowns(owner_id) => Some(result),
            }
        }
        .boxed();
        Some(PendingLoad { ticket, future })
    }

    pub fn dispatch_submissions(&mut self) -> Option<PendingLoad<SyllabusSubmission>> {
        let owner_id = self.owner_id?;
        let (ticket, token) = self.submissions.dispatch(owner_id);
        let store = Arc::clone(&self.store);
        let future = async move {
            tokio::select! {
                _ = token.cancelled() => None,
                result = store.list_submissions(owner_id) => Some(result),
            }
        }
        .boxed();
        Some(PendingLoad { ticket, future })
    }

    pub fn complete_breakdowns(
        &mut self,
        ticket: LoadTicket,
        result: PortResult<Vec<Breakdown>>,
    ) -> LoadOutcome {
        self.breakdowns.complete(self.owner_id, ticket, Some(result))
    }

    pub fn complete_submissions(
        &mut self,
        ticket: LoadTicket,
        result: PortResult<Vec<SyllabusSubmission>>,
    ) -> LoadOutcome {
        self.submissions.complete(self.owner_id, ticket, Some(result))
    }

    //=====================================================================================
    // Awaiting API
    //=====================================================================================

    /// Loads the breakdowns of `owner_id`, newest first.
    ///
    /// On failure the previously cached list (if the owner did not change) stays in place.
    pub async fn load(&mut self, owner_id: Uuid) -> Result<&[Breakdown], LoadError> {
        self.set_owner(Some(owner_id));
        if let Some(pending) = self.dispatch_breakdowns() {
            let result = pending.future.await;
            self.breakdowns
                .complete(self.owner_id, pending.ticket, result)
                .into_result()?;
        }
        Ok(self.breakdowns())
    }

    /// Loads the submissions of `owner_id`, newest first.
    pub async fn load_submissions(
        &mut self,
        owner_id: Uuid,
    ) -> Result<&[SyllabusSubmission], LoadError> {
        self.set_owner(Some(owner_id));
        if let Some(pending) = self.dispatch_submissions() {
            let result = pending.future.await;
            self.submissions
                .complete(self.owner_id, pending.ticket, result)
                .into_result()?;
        }
        Ok(self.submissions())
    }

    /// Reloads both collections of the current owner. Safe to call repeatedly.
    pub async fn reload(&mut self) -> Result<(), LoadError> {
        let (Some(breakdowns), Some(submissions)) =
            (self.dispatch_breakdowns(), self.dispatch_submissions())
        else {
            debug!("Reload skipped: no signed-in owner.");
            return Ok(());
        };
        let (breakdown_result, submission_result) =
            futures::join!(breakdowns.future, submissions.future);
        let breakdown_outcome =
            self.breakdowns
                .complete(self.owner_id, breakdowns.ticket, breakdown_result);
        let submission_outcome =
            self.submissions
                .complete(self.owner_id, submissions.ticket, submission_result);
        breakdown_outcome
            .into_result()
            .and(submission_outcome.into_result())
    }
}
