//! Snapshot isolation conformance tests.
//!
//! Verifies that uncommitted writes are invisible outside a snapshot,
//! committed writes are visible, and aborted or dropped writes are discarded.

use std::future::Future;

use super::{make_record, seed_record, TestResult};
use crate::record::RecordFilter;
use crate::RegistryStorage;

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "snapshot",
        "empty_snapshot_commits",
        empty_snapshot_commits(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "uncommitted_record_invisible_to_get",
        uncommitted_record_invisible_to_get(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "uncommitted_record_invisible_to_list",
        uncommitted_record_invisible_to_list(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "snapshot_reads_own_writes",
        snapshot_reads_own_writes(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "committed_record_visible",
        committed_record_visible(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "dropped_snapshot_discards_writes",
        dropped_snapshot_discards_writes(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "committed_state_readable_while_snapshot_open",
        committed_state_readable_while_snapshot_open(factory).await,
    ));

    results
}

async fn empty_snapshot_commits<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let snap = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;
    // The writer lock must be free again.
    let snap = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    s.abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))
}

async fn uncommitted_record_invisible_to_get<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.put_record(&mut snap, make_record("m-1", 3, 1))
        .await
        .map_err(|e| format!("put_record: {e}"))?;
    let outside = s.get_record("m-1").await;
    let _ = s.abort_snapshot(snap).await;
    match outside {
        Ok(None) => Ok(()),
        other => Err(format!("expected uncommitted record hidden, got {:?}", other)),
    }
}

async fn uncommitted_record_invisible_to_list<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.put_record(&mut snap, make_record("m-1", 3, 1))
        .await
        .map_err(|e| format!("put_record: {e}"))?;
    let listed = s.list_records(RecordFilter::All, 0).await;
    let _ = s.abort_snapshot(snap).await;
    match listed {
        Ok(records) if records.is_empty() => Ok(()),
        other => Err(format!("expected empty list before commit, got {:?}", other)),
    }
}

async fn snapshot_reads_own_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let record = make_record("m-1", 2, 5);
    s.put_record(&mut snap, record.clone())
        .await
        .map_err(|e| format!("put_record: {e}"))?;
    let inside = s.get_record_for_update(&mut snap, "m-1").await;
    let _ = s.abort_snapshot(snap).await;
    match inside {
        Ok(Some(r)) if r == record => Ok(()),
        other => Err(format!("expected own write visible, got {:?}", other)),
    }
}

async fn committed_record_visible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let record = make_record("m-1", 3, 1000);
    seed_record(&s, record.clone()).await?;
    match s.get_record("m-1").await {
        Ok(Some(r)) if r == record => Ok(()),
        other => Err(format!("expected committed record, got {:?}", other)),
    }
}

async fn dropped_snapshot_discards_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    {
        let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
        s.put_record(&mut snap, make_record("m-1", 3, 1))
            .await
            .map_err(|e| format!("put_record: {e}"))?;
        drop(snap);
    }
    if let Ok(Some(r)) = s.get_record("m-1").await {
        return Err(format!("dropped snapshot leaked a write: {:?}", r));
    }
    // Dropping must also release the writer.
    let snap = s
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin after drop: {e}"))?;
    s.abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))
}

async fn committed_state_readable_while_snapshot_open<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_record(&s, make_record("m-1", 1, 1)).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut updated = make_record("m-1", 1, 1);
    updated.revoked = true;
    s.put_record(&mut snap, updated)
        .await
        .map_err(|e| format!("put_record: {e}"))?;

    let outside = s.get_record("m-1").await;
    let _ = s.abort_snapshot(snap).await;
    match outside {
        Ok(Some(r)) if !r.revoked => Ok(()),
        other => Err(format!(
            "expected committed (active) record while snapshot open, got {:?}",
            other
        )),
    }
}
