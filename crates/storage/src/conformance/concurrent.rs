use std::future::Future;
use std::sync::Arc;

use super::{make_event, make_record, seed_meta, TestResult};
use crate::record::{AuditEventKind, RecordFilter};
use crate::{RegistryStorage, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_check_then_insert_exactly_one_wins",
        concurrent_check_then_insert_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_distinct_records_all_succeed",
        concurrent_distinct_records_all_succeed(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_event_appends_stay_dense",
        concurrent_event_appends_stay_dense(factory).await,
    ));

    results
}

// ── Check-then-insert: exactly one wins ─────────────────────────────────────

/// N tasks each open a snapshot, look up the same manager, and insert it only
/// if absent. Because writers are serialized, exactly one task sees the
/// record missing; the rest see the winner's committed record.
async fn concurrent_check_then_insert_exactly_one_wins<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            match s.get_record_for_update(&mut snap, "m-shared").await {
                Ok(None) => {
                    s.put_record(&mut snap, make_record("m-shared", 1, i as u64))
                        .await?;
                    s.commit_snapshot(snap).await?;
                    Ok(true) // won the race
                }
                Ok(Some(_)) => {
                    s.abort_snapshot(snap).await?;
                    Ok(false) // lost the race
                }
                Err(e) => {
                    let _ = s.abort_snapshot(snap).await;
                    Err(e)
                }
            }
        }));
    }

    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }
    Ok(())
}

// ── Distinct records never interfere ────────────────────────────────────────

async fn concurrent_distinct_records_all_succeed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            s.put_record(&mut snap, make_record(&format!("m-{i:02}"), 2, i as u64))
                .await?;
            s.commit_snapshot(snap).await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
    }

    let records = storage
        .list_records(RecordFilter::All, 0)
        .await
        .map_err(|e| format!("list_records: {e}"))?;
    if records.len() != N {
        return Err(format!("expected {N} records, got {}", records.len()));
    }
    Ok(())
}

// ── Read-modify-write on meta keeps the audit log dense ─────────────────────

/// Each task reads `event_count` from meta, appends an event with that
/// sequence, and bumps the count. Serialized writers mean no task ever
/// observes a stale count, so all N appends succeed.
async fn concurrent_event_appends_stay_dense<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed_meta(storage.as_ref()).await?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            let mut meta = s.get_meta_for_update(&mut snap).await?;
            let manager = format!("m-{i}");
            s.append_event(
                &mut snap,
                make_event(meta.event_count, AuditEventKind::Verified, Some(manager.as_str())),
            )
            .await?;
            meta.event_count += 1;
            s.put_meta(&mut snap, meta).await?;
            s.commit_snapshot(snap).await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
    }

    let events = storage
        .list_events(None, 0)
        .await
        .map_err(|e| format!("list_events: {e}"))?;
    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    let expected: Vec<u64> = (0..N as u64).collect();
    if sequences != expected {
        return Err(format!("expected dense sequences, got {:?}", sequences));
    }
    let meta = storage
        .get_meta()
        .await
        .map_err(|e| format!("get_meta: {e}"))?;
    if meta.event_count != N as u64 {
        return Err(format!("expected event_count {N}, got {}", meta.event_count));
    }
    Ok(())
}
