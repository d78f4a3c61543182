use std::future::Future;

use super::{make_event, make_meta, TestResult};
use crate::record::{AuditEventKind, RecordFilter};
use crate::{RegistryStorage, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "get_meta_uninitialized",
        get_meta_uninitialized(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "get_meta_for_update_uninitialized",
        get_meta_for_update_uninitialized(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "put_meta_uninitialized",
        put_meta_uninitialized(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "get_record_missing_is_none",
        get_record_missing_is_none(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "get_record_for_update_missing_is_none",
        get_record_for_update_missing_is_none(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "append_event_out_of_sequence",
        append_event_out_of_sequence(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "list_records_empty",
        list_records_empty(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "list_events_empty",
        list_events_empty(factory).await,
    ));

    results
}

// ── 1. get_meta on empty store returns NotInitialized ────────────────────────

async fn get_meta_uninitialized<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_meta().await {
        Err(StorageError::NotInitialized) => Ok(()),
        other => Err(format!("expected NotInitialized, got {:?}", other)),
    }
}

// ── 2. get_meta_for_update on empty store returns NotInitialized ─────────────

async fn get_meta_for_update_uninitialized<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s.get_meta_for_update(&mut snap).await;
    // Clean up the snapshot regardless of result.
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::NotInitialized) => Ok(()),
        other => Err(format!("expected NotInitialized, got {:?}", other)),
    }
}

// ── 3. put_meta without initialize returns NotInitialized ────────────────────

async fn put_meta_uninitialized<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s.put_meta(&mut snap, make_meta("owner")).await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::NotInitialized) => Ok(()),
        other => Err(format!("expected NotInitialized, got {:?}", other)),
    }
}

// ── 4. get_record for a never-verified manager is Ok(None) ───────────────────

async fn get_record_missing_is_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_record("ST-NOBODY").await {
        Ok(None) => Ok(()),
        other => Err(format!("expected Ok(None), got {:?}", other)),
    }
}

// ── 5. same, within a snapshot ───────────────────────────────────────────────

async fn get_record_for_update_missing_is_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s.get_record_for_update(&mut snap, "ST-NOBODY").await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Ok(None) => Ok(()),
        other => Err(format!("expected Ok(None), got {:?}", other)),
    }
}

// ── 6. appending sequence 3 to an empty log is a SequenceConflict ────────────

async fn append_event_out_of_sequence<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .append_event(&mut snap, make_event(3, AuditEventKind::Verified, Some("m")))
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::SequenceConflict {
            expected: 0,
            actual: 3,
        }) => Ok(()),
        other => Err(format!(
            "expected SequenceConflict {{ expected: 0, actual: 3 }}, got {:?}",
            other
        )),
    }
}

// ── 7. list_records on empty store ───────────────────────────────────────────

async fn list_records_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let records = s
        .list_records(RecordFilter::All, 0)
        .await
        .map_err(|e| format!("list_records: {e}"))?;
    if !records.is_empty() {
        return Err(format!("expected no records, got {}", records.len()));
    }
    Ok(())
}

// ── 8. list_events on empty store ────────────────────────────────────────────

async fn list_events_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let events = s
        .list_events(None, 0)
        .await
        .map_err(|e| format!("list_events: {e}"))?;
    if !events.is_empty() {
        return Err(format!("expected no events, got {}", events.len()));
    }
    Ok(())
}
