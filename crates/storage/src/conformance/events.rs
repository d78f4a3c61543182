//! Audit log conformance tests: dense sequencing, ordering, filtering.

use std::future::Future;

use super::{make_event, TestResult};
use crate::record::AuditEventKind;
use crate::{RegistryStorage, StorageError};

pub(super) async fn run_event_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "events",
        "sequence_counts_pending_events",
        sequence_counts_pending_events(factory).await,
    ));
    results.push(TestResult::from_result(
        "events",
        "sequence_continues_after_commit",
        sequence_continues_after_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "events",
        "aborted_events_do_not_consume_sequence",
        aborted_events_do_not_consume_sequence(factory).await,
    ));
    results.push(TestResult::from_result(
        "events",
        "events_filtered_by_manager",
        events_filtered_by_manager(factory).await,
    ));
    results.push(TestResult::from_result(
        "events",
        "events_respect_limit",
        events_respect_limit(factory).await,
    ));

    results
}

/// Append `kinds` as one committed snapshot, numbering from `start`.
async fn append_committed<S: RegistryStorage>(
    s: &S,
    start: u64,
    events: &[(AuditEventKind, Option<&str>)],
) -> Result<(), String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    for (i, (kind, manager)) in events.iter().enumerate() {
        s.append_event(&mut snap, make_event(start + i as u64, *kind, *manager))
            .await
            .map_err(|e| format!("append {}: {e}", start + i as u64))?;
    }
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))
}

async fn sequence_counts_pending_events<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.append_event(&mut snap, make_event(0, AuditEventKind::Initialized, None))
        .await
        .map_err(|e| format!("append 0: {e}"))?;
    let replay = s
        .append_event(&mut snap, make_event(0, AuditEventKind::Verified, Some("m")))
        .await;
    let _ = s.abort_snapshot(snap).await;
    match replay {
        Err(StorageError::SequenceConflict {
            expected: 1,
            actual: 0,
        }) => Ok(()),
        other => Err(format!(
            "expected SequenceConflict {{ expected: 1, actual: 0 }}, got {:?}",
            other
        )),
    }
}

async fn sequence_continues_after_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    append_committed(
        &s,
        0,
        &[
            (AuditEventKind::Initialized, None),
            (AuditEventKind::Verified, Some("m-1")),
        ],
    )
    .await?;
    append_committed(&s, 2, &[(AuditEventKind::Revoked, Some("m-1"))]).await?;

    let events = s
        .list_events(None, 0)
        .await
        .map_err(|e| format!("list_events: {e}"))?;
    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    if sequences != [0, 1, 2] {
        return Err(format!("expected sequences [0, 1, 2], got {:?}", sequences));
    }
    if events[2].kind != AuditEventKind::Revoked {
        return Err(format!("expected last event Revoked, got {:?}", events[2].kind));
    }
    Ok(())
}

async fn aborted_events_do_not_consume_sequence<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.append_event(&mut snap, make_event(0, AuditEventKind::Initialized, None))
        .await
        .map_err(|e| format!("append: {e}"))?;
    s.abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    // Sequence 0 must still be the next one.
    append_committed(&s, 0, &[(AuditEventKind::Initialized, None)]).await
}

async fn events_filtered_by_manager<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    append_committed(
        &s,
        0,
        &[
            (AuditEventKind::Initialized, None),
            (AuditEventKind::Verified, Some("m-1")),
            (AuditEventKind::Verified, Some("m-2")),
            (AuditEventKind::Revoked, Some("m-1")),
        ],
    )
    .await?;

    let events = s
        .list_events(Some("m-1"), 0)
        .await
        .map_err(|e| format!("list_events: {e}"))?;
    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    if sequences != [1, 3] {
        return Err(format!("expected m-1 events [1, 3], got {:?}", sequences));
    }
    Ok(())
}

async fn events_respect_limit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    append_committed(
        &s,
        0,
        &[
            (AuditEventKind::Initialized, None),
            (AuditEventKind::Verified, Some("m-1")),
            (AuditEventKind::Revoked, Some("m-1")),
        ],
    )
    .await?;
    let events = s
        .list_events(None, 2)
        .await
        .map_err(|e| format!("list_events: {e}"))?;
    if events.len() != 2 || events[0].sequence != 0 {
        return Err(format!("expected first 2 events, got {:?}", events));
    }
    Ok(())
}
