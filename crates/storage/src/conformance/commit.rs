use std::future::Future;

use super::{make_event, make_record, seed_meta, seed_record, TestResult};
use crate::record::{AuditEventKind, RecordFilter};
use crate::RegistryStorage;

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "commit",
        "meta_record_and_event_all_visible_after_commit",
        meta_record_and_event_all_visible_after_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "meta_record_and_event_none_visible_after_abort",
        meta_record_and_event_none_visible_after_abort(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "put_record_overwrites",
        put_record_overwrites(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "list_records_sorted_and_filtered",
        list_records_sorted_and_filtered(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "list_records_respects_limit",
        list_records_respects_limit(factory).await,
    ));

    results
}

// ── Full mutation atomicity: meta + record + event commit together ───────────

async fn meta_record_and_event_all_visible_after_commit<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
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
    meta.last_timestamp = 1;
    meta.event_count = 1;
    s.put_meta(&mut snap, meta)
        .await
        .map_err(|e| format!("put_meta: {e}"))?;
    s.put_record(&mut snap, make_record("m-1", 3, 1))
        .await
        .map_err(|e| format!("put_record: {e}"))?;
    s.append_event(&mut snap, make_event(0, AuditEventKind::Verified, Some("m-1")))
        .await
        .map_err(|e| format!("append_event: {e}"))?;
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let meta = s.get_meta().await.map_err(|e| format!("get_meta: {e}"))?;
    if meta.event_count != 1 || meta.last_timestamp != 1 {
        return Err(format!("meta not updated: {:?}", meta));
    }
    if s.get_record("m-1")
        .await
        .map_err(|e| format!("get_record: {e}"))?
        .is_none()
    {
        return Err("record missing after commit".to_string());
    }
    let events = s
        .list_events(None, 0)
        .await
        .map_err(|e| format!("list_events: {e}"))?;
    if events.len() != 1 {
        return Err(format!("expected 1 event, got {}", events.len()));
    }
    Ok(())
}

async fn meta_record_and_event_none_visible_after_abort<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
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
    meta.last_timestamp = 99;
    s.put_meta(&mut snap, meta)
        .await
        .map_err(|e| format!("put_meta: {e}"))?;
    s.put_record(&mut snap, make_record("m-1", 3, 99))
        .await
        .map_err(|e| format!("put_record: {e}"))?;
    s.append_event(&mut snap, make_event(0, AuditEventKind::Verified, Some("m-1")))
        .await
        .map_err(|e| format!("append_event: {e}"))?;
    s.abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    let meta = s.get_meta().await.map_err(|e| format!("get_meta: {e}"))?;
    if meta.last_timestamp != 0 {
        return Err(format!("aborted meta write leaked: {:?}", meta));
    }
    if let Some(r) = s
        .get_record("m-1")
        .await
        .map_err(|e| format!("get_record: {e}"))?
    {
        return Err(format!("aborted record leaked: {:?}", r));
    }
    let events = s
        .list_events(None, 0)
        .await
        .map_err(|e| format!("list_events: {e}"))?;
    if !events.is_empty() {
        return Err(format!("aborted events leaked: {}", events.len()));
    }
    Ok(())
}

async fn put_record_overwrites<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_record(&s, make_record("m-1", 1, 1)).await?;
    let mut revoked = make_record("m-1", 1, 1);
    revoked.revoked = true;
    revoked.revoked_at = Some(2);
    seed_record(&s, revoked.clone()).await?;

    match s.get_record("m-1").await {
        Ok(Some(r)) if r == revoked => Ok(()),
        other => Err(format!("expected overwritten record, got {:?}", other)),
    }
}

async fn list_records_sorted_and_filtered<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_record(&s, make_record("m-c", 1, 1)).await?;
    seed_record(&s, make_record("m-a", 2, 2)).await?;
    let mut revoked = make_record("m-b", 3, 3);
    revoked.revoked = true;
    seed_record(&s, revoked).await?;

    let ids = |records: Vec<crate::VerificationRecord>| -> Vec<String> {
        records.into_iter().map(|r| r.manager).collect()
    };

    let all = ids(s
        .list_records(RecordFilter::All, 0)
        .await
        .map_err(|e| format!("list all: {e}"))?);
    if all != ["m-a", "m-b", "m-c"] {
        return Err(format!("expected sorted [m-a, m-b, m-c], got {:?}", all));
    }
    let active = ids(s
        .list_records(RecordFilter::Active, 0)
        .await
        .map_err(|e| format!("list active: {e}"))?);
    if active != ["m-a", "m-c"] {
        return Err(format!("expected active [m-a, m-c], got {:?}", active));
    }
    let revoked = ids(s
        .list_records(RecordFilter::Revoked, 0)
        .await
        .map_err(|e| format!("list revoked: {e}"))?);
    if revoked != ["m-b"] {
        return Err(format!("expected revoked [m-b], got {:?}", revoked));
    }
    Ok(())
}

async fn list_records_respects_limit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for i in 0..5 {
        seed_record(&s, make_record(&format!("m-{i}"), 1, i)).await?;
    }
    let limited = s
        .list_records(RecordFilter::All, 2)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if limited.len() != 2 || limited[0].manager != "m-0" {
        return Err(format!("expected first 2 records, got {:?}", limited));
    }
    Ok(())
}
