use std::future::Future;

use super::{make_meta, seed_meta, TestResult};
use crate::{RegistryStorage, StorageError};

pub(super) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "init",
        "initialize_creates_meta",
        initialize_creates_meta(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "initialized_meta_readable_via_get_meta_for_update",
        initialized_meta_readable_via_get_meta_for_update(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "double_initialize_in_same_snapshot",
        double_initialize_in_same_snapshot(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "double_initialize_across_snapshots",
        double_initialize_across_snapshots(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "initialize_not_visible_before_commit",
        initialize_not_visible_before_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "initialize_not_visible_after_abort",
        initialize_not_visible_after_abort(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "put_meta_replaces_owner",
        put_meta_replaces_owner(factory).await,
    ));

    results
}

// ── 1. initialize then commit: get_meta returns the owner ────────────────────

async fn initialize_creates_meta<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_meta(&s).await?;
    let meta = s.get_meta().await.map_err(|e| format!("get_meta: {e}"))?;
    if meta.owner != "test-owner" {
        return Err(format!("expected owner \"test-owner\", got \"{}\"", meta.owner));
    }
    if meta.event_count != 0 || meta.last_timestamp != 0 {
        return Err(format!("expected zeroed counters, got {:?}", meta));
    }
    Ok(())
}

// ── 2. a snapshot sees its own initialize ────────────────────────────────────

async fn initialized_meta_readable_via_get_meta_for_update<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.initialize_registry(&mut snap, make_meta("owner-a"))
        .await
        .map_err(|e| format!("init: {e}"))?;
    let seen = s.get_meta_for_update(&mut snap).await;
    let _ = s.abort_snapshot(snap).await;
    match seen {
        Ok(meta) if meta.owner == "owner-a" => Ok(()),
        other => Err(format!("expected owner-a meta in snapshot, got {:?}", other)),
    }
}

// ── 3. second initialize in the same snapshot fails ──────────────────────────

async fn double_initialize_in_same_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.initialize_registry(&mut snap, make_meta("owner-a"))
        .await
        .map_err(|e| format!("first init: {e}"))?;
    let second = s
        .initialize_registry(&mut snap, make_meta("owner-b"))
        .await;
    let _ = s.abort_snapshot(snap).await;
    match second {
        Err(StorageError::AlreadyInitialized { owner }) if owner == "owner-a" => Ok(()),
        other => Err(format!(
            "expected AlreadyInitialized {{ owner: owner-a }}, got {:?}",
            other
        )),
    }
}

// ── 4. initialize after a committed initialize fails ─────────────────────────

async fn double_initialize_across_snapshots<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_meta(&s).await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .initialize_registry(&mut snap, make_meta("intruder"))
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::AlreadyInitialized { owner }) if owner == "test-owner" => Ok(()),
        other => Err(format!("expected AlreadyInitialized, got {:?}", other)),
    }
}

// ── 5. uncommitted initialize is invisible to get_meta ───────────────────────

async fn initialize_not_visible_before_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.initialize_registry(&mut snap, make_meta("owner-a"))
        .await
        .map_err(|e| format!("init: {e}"))?;
    let outside = s.get_meta().await;
    let _ = s.abort_snapshot(snap).await;
    match outside {
        Err(StorageError::NotInitialized) => Ok(()),
        other => Err(format!("expected NotInitialized before commit, got {:?}", other)),
    }
}

// ── 6. aborted initialize leaves nothing behind ──────────────────────────────

async fn initialize_not_visible_after_abort<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.initialize_registry(&mut snap, make_meta("owner-a"))
        .await
        .map_err(|e| format!("init: {e}"))?;
    s.abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))?;
    match s.get_meta().await {
        Err(StorageError::NotInitialized) => Ok(()),
        other => Err(format!("expected NotInitialized after abort, got {:?}", other)),
    }
}

// ── 7. put_meta on an initialized registry replaces the owner ────────────────

async fn put_meta_replaces_owner<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_meta(&s).await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut meta = s
        .get_meta_for_update(&mut snap)
        .await
        .map_err(|e| format!("get_meta_for_update: {e}"))?;
    meta.owner = "new-owner".to_string();
    meta.last_timestamp = 7;
    s.put_meta(&mut snap, meta)
        .await
        .map_err(|e| format!("put_meta: {e}"))?;
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let meta = s.get_meta().await.map_err(|e| format!("get_meta: {e}"))?;
    if meta.owner != "new-owner" || meta.last_timestamp != 7 {
        return Err(format!("expected new-owner at timestamp 7, got {:?}", meta));
    }
    Ok(())
}
