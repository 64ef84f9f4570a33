mod common;

use common::{drain, next_selection, recv, user, wait_selected, LineStructuring, MemoryStore};
use std::sync::Arc;
use syllabus_core::{
    Collection, GenerationError, GenerationPipeline, LoadError, PortError, SelectionError,
    SessionUpdate, SyncSession,
};
use uuid::Uuid;

fn pipeline(store: &Arc<MemoryStore>) -> Arc<GenerationPipeline> {
    Arc::new(GenerationPipeline::new(store.clone(), LineStructuring::new()))
}

#[tokio::test]
async fn first_load_selects_the_newest_breakdown() {
    let store = MemoryStore::new();
    let owner = user(1);
    let _older = store.seed(owner.id, "B2");
    let newer = store.seed(owner.id, "B1");
    let (handle, mut updates) = SyncSession::spawn(store.clone(), pipeline(&store));

    handle.set_identity(Some(owner)).await.unwrap();

    wait_selected(&mut updates, newer.id).await;
}

#[tokio::test]
async fn empty_history_stays_unselected() {
    let store = MemoryStore::new();
    let (handle, mut updates) = SyncSession::spawn(store.clone(), pipeline(&store));

    handle.set_identity(Some(user(1))).await.unwrap();

    let mut saw_empty_list = false;
    for update in drain(&mut updates).await {
        match update {
            SessionUpdate::Breakdowns(items) => saw_empty_list |= items.is_empty(),
            SessionUpdate::Selection { active, .. } => assert!(active.is_none()),
            _ => {}
        }
    }
    assert!(saw_empty_list);
}

#[tokio::test]
async fn deep_link_target_wins_whether_it_arrives_before_or_after_the_load() {
    let store = MemoryStore::new();
    let owner = user(1);
    let target = store.seed(owner.id, "target");
    let newest = store.seed(owner.id, "newest");

    // Target first.
    let (handle, mut updates) = SyncSession::spawn(store.clone(), pipeline(&store));
    handle.set_target(Some(target.id.to_string())).await.unwrap();
    handle.set_identity(Some(owner.clone())).await.unwrap();
    wait_selected(&mut updates, target.id).await;

    // Load first.
    let (handle, mut updates) = SyncSession::spawn(store.clone(), pipeline(&store));
    handle.set_identity(Some(owner)).await.unwrap();
    wait_selected(&mut updates, newest.id).await;
    handle.set_target(Some(target.id.to_string())).await.unwrap();
    wait_selected(&mut updates, target.id).await;
}

#[tokio::test]
async fn unknown_target_falls_back_to_newest_without_error() {
    let store = MemoryStore::new();
    let owner = user(1);
    store.seed(owner.id, "older");
    let newest = store.seed(owner.id, "newest");
    let (handle, mut updates) = SyncSession::spawn(store.clone(), pipeline(&store));

    handle.set_target(Some(Uuid::new_v4().to_string())).await.unwrap();
    handle.set_identity(Some(owner)).await.unwrap();

    let (active, stale) = next_selection(&mut updates).await;
    assert_eq!(active.map(|b| b.id), Some(newest.id));
    assert!(!stale);
    assert!(drain(&mut updates)
        .await
        .iter()
        .all(|u| !matches!(u, SessionUpdate::LoadFailed { .. })));
}

#[tokio::test]
async fn failed_refresh_keeps_the_visible_selection() {
    let store = MemoryStore::new();
    let owner = user(1);
    store.seed(owner.id, "B2");
    let b1 = store.seed(owner.id, "B1");
    let (handle, mut updates) = SyncSession::spawn(store.clone(), pipeline(&store));
    handle.set_identity(Some(owner)).await.unwrap();
    wait_selected(&mut updates, b1.id).await;
    drain(&mut updates).await;

    store.fail_queries(Some(PortError::Unavailable("offline".into())));
    handle.refresh().await.unwrap();

    let mut saw_failure = false;
    let mut last_selection = None;
    for update in drain(&mut updates).await {
        match update {
            SessionUpdate::LoadFailed {
                collection: Collection::Breakdowns,
                error,
            } => {
                assert!(matches!(error, LoadError::StoreUnavailable(_)));
                saw_failure = true;
            }
            SessionUpdate::Breakdowns(_) => panic!("list must not be replaced by a failed load"),
            SessionUpdate::Selection { active, stale } => last_selection = Some((active, stale)),
            _ => {}
        }
    }
    assert!(saw_failure);
    let (active, stale) = last_selection.expect("selection marked stale");
    assert_eq!(active.map(|b| b.id), Some(b1.id));
    assert!(stale);
}

#[tokio::test]
async fn user_selection_survives_background_reloads() {
    let store = MemoryStore::new();
    let owner = user(1);
    let b2 = store.seed(owner.id, "B2");
    let b1 = store.seed(owner.id, "B1");
    let (handle, mut updates) = SyncSession::spawn(store.clone(), pipeline(&store));
    handle.set_identity(Some(owner)).await.unwrap();
    wait_selected(&mut updates, b1.id).await;

    handle.select(b2.id).await.unwrap();
    wait_selected(&mut updates, b2.id).await;

    handle.refresh().await.unwrap();
    handle.refresh().await.unwrap();
    for update in drain(&mut updates).await {
        if let SessionUpdate::Selection { active, .. } = update {
            assert_eq!(active.map(|b| b.id), Some(b2.id));
        }
    }
}

#[tokio::test]
async fn selecting_an_unknown_breakdown_is_rejected() {
    let store = MemoryStore::new();
    let owner = user(1);
    let b1 = store.seed(owner.id, "B1");
    let (handle, mut updates) = SyncSession::spawn(store.clone(), pipeline(&store));
    handle.set_identity(Some(owner)).await.unwrap();
    wait_selected(&mut updates, b1.id).await;

    let missing = Uuid::new_v4();
    handle.select(missing).await.unwrap();

    loop {
        if let SessionUpdate::SelectionRejected(err) = recv(&mut updates).await {
            assert_eq!(err, SelectionError::NotLoaded(missing));
            break;
        }
    }
}

#[tokio::test]
async fn upload_with_no_history_ends_selected_on_the_new_breakdown() {
    let store = MemoryStore::new();
    let (handle, mut updates) = SyncSession::spawn(store.clone(), pipeline(&store));
    handle.set_identity(Some(user(1))).await.unwrap();

    handle
        .upload("Week 1: Intro\nWeek 2: Algebra".to_string())
        .await
        .unwrap();

    let (new_id, active) = generated_and_selected(&mut updates).await;
    assert_eq!(active.id, new_id);
    assert_eq!(active.title, "Week 1: Intro");
}

/// Waits until a generation has finished and the session selected its breakdown,
/// in whichever order the two updates arrive.
async fn generated_and_selected(
    updates: &mut tokio::sync::mpsc::UnboundedReceiver<SessionUpdate>,
) -> (Uuid, syllabus_core::Breakdown) {
    let mut generated = None;
    let mut selected: Vec<syllabus_core::Breakdown> = Vec::new();
    loop {
        match recv(updates).await {
            SessionUpdate::GenerationFinished(result) => generated = Some(result.unwrap()),
            SessionUpdate::Selection {
                active: Some(active),
                ..
            } => selected.push(active),
            _ => {}
        }
        if let Some(id) = generated {
            if let Some(active) = selected.iter().find(|b| b.id == id) {
                return (id, active.clone());
            }
        }
    }
}

#[tokio::test]
async fn blank_upload_reports_empty_input() {
    let store = MemoryStore::new();
    let (handle, mut updates) = SyncSession::spawn(store.clone(), pipeline(&store));
    handle.set_identity(Some(user(1))).await.unwrap();

    handle.upload("   ".to_string()).await.unwrap();

    loop {
        if let SessionUpdate::GenerationFinished(result) = recv(&mut updates).await {
            assert_eq!(result, Err(GenerationError::EmptyInput));
            break;
        }
    }
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn generated_breakdown_is_selected_exactly_once_despite_a_concurrent_reload() {
    let store = MemoryStore::new();
    let owner = user(1);
    let b1 = store.seed(owner.id, "B1");
    let pipeline = pipeline(&store);
    let (handle, mut updates) = SyncSession::spawn(store.clone(), pipeline.clone());
    handle.set_identity(Some(owner.clone())).await.unwrap();
    wait_selected(&mut updates, b1.id).await;

    // An unrelated refresh stays in flight while the upload completes.
    store.hold_breakdown_queries();
    handle.refresh().await.unwrap();
    handle.upload("Week 9: Review".to_string()).await.unwrap();

    let new_id = loop {
        if let SessionUpdate::GenerationFinished(result) = recv(&mut updates).await {
            break result.unwrap();
        }
    };
    store.release_breakdown_queries();

    let mut selected_new = 0;
    for update in drain(&mut updates).await {
        if let SessionUpdate::Selection {
            active: Some(active),
            ..
        } = update
        {
            assert_eq!(active.id, new_id);
            selected_new += 1;
        }
    }
    assert_eq!(selected_new, 1);

    handle.refresh().await.unwrap();
    assert!(drain(&mut updates)
        .await
        .iter()
        .all(|u| !matches!(u, SessionUpdate::Selection { .. })));
}

#[tokio::test]
async fn upload_from_another_surface_reloads_and_selects() {
    let store = MemoryStore::new();
    let owner = user(1);
    let b1 = store.seed(owner.id, "B1");
    let pipeline = pipeline(&store);
    let (handle, mut updates) = SyncSession::spawn(store.clone(), pipeline.clone());
    handle.set_identity(Some(owner.clone())).await.unwrap();
    wait_selected(&mut updates, b1.id).await;

    let created = pipeline.generate(owner.id, "Topology").await.unwrap();
    wait_selected(&mut updates, created.id).await;

    // Another user's upload does not disturb this session.
    pipeline.generate(user(2).id, "Elsewhere").await.unwrap();
    for update in drain(&mut updates).await {
        if let SessionUpdate::Selection { active, .. } = update {
            assert_eq!(active.map(|b| b.id), Some(created.id));
        }
    }
}

#[tokio::test]
async fn identity_change_never_shows_the_previous_owners_breakdowns() {
    let store = MemoryStore::new();
    let alice = user(1);
    let bob = user(2);
    let alice_b = store.seed(alice.id, "alice");
    let bob_b = store.seed(bob.id, "bob");
    let (handle, mut updates) = SyncSession::spawn(store.clone(), pipeline(&store));
    handle.set_identity(Some(alice)).await.unwrap();
    wait_selected(&mut updates, alice_b.id).await;

    handle.set_identity(Some(bob)).await.unwrap();
    loop {
        match recv(&mut updates).await {
            SessionUpdate::Breakdowns(items) => {
                assert!(items.iter().all(|b| b.id != alice_b.id));
            }
            SessionUpdate::Selection {
                active: Some(active),
                ..
            } => {
                assert_eq!(active.id, bob_b.id);
                break;
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn shutdown_closes_the_session() {
    let store = MemoryStore::new();
    let (handle, mut updates) = SyncSession::spawn(store.clone(), pipeline(&store));
    handle.shutdown();

    let closed = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while updates.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok());
    assert!(handle.refresh().await.is_err());
}
