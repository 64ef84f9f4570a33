#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use syllabus_core::{
    Breakdown, Chapter, NewBreakdown, PortError, PortResult, SessionUpdate, StructuringService,
    SyllabusStore, SyllabusSubmission, User,
};
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

/// In-memory store with call counters, failure injection and a gate that holds
/// breakdown queries open until released.
#[derive(Default)]
pub struct MemoryStore {
    breakdowns: Mutex<Vec<Breakdown>>,
    submissions: Mutex<Vec<SyllabusSubmission>>,
    clock: AtomicI64,
    query_error: Mutex<Option<PortError>>,
    write_error: Mutex<Option<PortError>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    pub breakdown_queries: AtomicUsize,
    pub breakdown_writes: AtomicUsize,
    pub submission_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn tick(&self) -> DateTime<Utc> {
        let secs = 1_700_000_000 + self.clock.fetch_add(1, Ordering::SeqCst);
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    /// Inserts a breakdown directly, bypassing the pipeline.
    pub fn seed(&self, owner_id: Uuid, title: &str) -> Breakdown {
        let breakdown = Breakdown {
            id: Uuid::new_v4(),
            owner_id,
            source_content: title.to_string(),
            chapters: vec![Chapter::titled(title)],
            title: title.to_string(),
            created_at: self.tick(),
        };
        self.breakdowns.lock().unwrap().push(breakdown.clone());
        breakdown
    }

    pub fn seed_at(&self, owner_id: Uuid, id: Uuid, created_at: DateTime<Utc>) -> Breakdown {
        let breakdown = Breakdown {
            id,
            owner_id,
            source_content: String::new(),
            chapters: vec![Chapter::titled("seeded")],
            title: "seeded".to_string(),
            created_at,
        };
        self.breakdowns.lock().unwrap().push(breakdown.clone());
        breakdown
    }

    pub fn fail_queries(&self, error: Option<PortError>) {
        *self.query_error.lock().unwrap() = error;
    }

    pub fn fail_writes(&self, error: Option<PortError>) {
        *self.write_error.lock().unwrap() = error;
    }

    pub fn hold_breakdown_queries(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_breakdown_queries(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn stored_breakdowns(&self) -> usize {
        self.breakdowns.lock().unwrap().len()
    }

    pub fn writes(&self) -> usize {
        self.breakdown_writes.load(Ordering::SeqCst) + self.submission_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SyllabusStore for MemoryStore {
    async fn list_submissions(&self, owner_id: Uuid) -> PortResult<Vec<SyllabusSubmission>> {
        if let Some(err) = self.query_error.lock().unwrap().clone() {
            return Err(err);
        }
        let mut items: Vec<_> = self
            .submissions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        items.reverse();
        Ok(items)
    }

    async fn insert_submission(
        &self,
        owner_id: Uuid,
        raw_content: &str,
    ) -> PortResult<SyllabusSubmission> {
        if let Some(err) = self.write_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.submission_writes.fetch_add(1, Ordering::SeqCst);
        let submission = SyllabusSubmission {
            id: Uuid::new_v4(),
            owner_id,
            raw_content: raw_content.to_string(),
            created_at: self.tick(),
        };
        self.submissions.lock().unwrap().push(submission.clone());
        Ok(submission)
    }

    async fn list_breakdowns(&self, owner_id: Uuid) -> PortResult<Vec<Breakdown>> {
        self.breakdown_queries.fetch_add(1, Ordering::SeqCst);
        let snapshot: PortResult<Vec<Breakdown>> =
            match self.query_error.lock().unwrap().clone() {
                Some(err) => Err(err),
                None => Ok(self
                    .breakdowns
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|b| b.owner_id == owner_id)
                    .cloned()
                    .collect()),
            };
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }
        snapshot
    }

    async fn insert_breakdown(&self, breakdown: &NewBreakdown) -> PortResult<Breakdown> {
        if let Some(err) = self.write_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.breakdown_writes.fetch_add(1, Ordering::SeqCst);
        let stored = Breakdown {
            id: Uuid::new_v4(),
            owner_id: breakdown.owner_id,
            source_content: breakdown.source_content.clone(),
            chapters: breakdown.chapters.clone(),
            title: breakdown.title.clone(),
            created_at: self.tick(),
        };
        self.breakdowns.lock().unwrap().push(stored.clone());
        Ok(stored)
    }
}

/// Structuring service that splits the input into one chapter per non-empty line.
#[derive(Default)]
pub struct LineStructuring {
    failure: Mutex<Option<PortError>>,
    empty: Mutex<bool>,
    pub calls: AtomicUsize,
}

impl LineStructuring {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_with(&self, error: PortError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn return_no_chapters(&self) {
        *self.empty.lock().unwrap() = true;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StructuringService for LineStructuring {
    async fn structure_syllabus(&self, content: &str) -> PortResult<Vec<Chapter>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        if *self.empty.lock().unwrap() {
            return Ok(Vec::new());
        }
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Chapter::titled)
            .collect())
    }
}

pub fn user(n: u128) -> User {
    User {
        id: Uuid::from_u128(n),
        display_name: Some(format!("user {n}")),
        email: None,
    }
}

/// Waits for the next selection update, skipping everything else.
pub async fn next_selection(
    updates: &mut mpsc::UnboundedReceiver<SessionUpdate>,
) -> (Option<Breakdown>, bool) {
    loop {
        match recv(updates).await {
            SessionUpdate::Selection { active, stale } => return (active, stale),
            _ => continue,
        }
    }
}

/// Waits until the session reports a selected breakdown with `id`.
pub async fn wait_selected(updates: &mut mpsc::UnboundedReceiver<SessionUpdate>, id: Uuid) {
    loop {
        if let (Some(active), _) = next_selection(updates).await {
            if active.id == id {
                return;
            }
        }
    }
}

pub async fn recv(updates: &mut mpsc::UnboundedReceiver<SessionUpdate>) -> SessionUpdate {
    tokio::time::timeout(Duration::from_secs(5), updates.recv())
        .await
        .expect("timed out waiting for a session update")
        .expect("session closed")
}

/// Collects every update that arrives within a short quiet period.
pub async fn drain(updates: &mut mpsc::UnboundedReceiver<SessionUpdate>) -> Vec<SessionUpdate> {
    let mut seen = Vec::new();
    while let Ok(Some(update)) =
        tokio::time::timeout(Duration::from_millis(200), updates.recv()).await
    {
        seen.push(update);
    }
    seen
}
