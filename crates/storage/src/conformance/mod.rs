//! Conformance test suite for `RegistryStorage` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `RegistryStorage` implementation can run to verify correctness. The
//! suite covers:
//!
//! - **Initialization**: metadata creation, duplicate detection
//! - **Snapshot isolation**: uncommitted writes invisible, committed writes visible
//! - **Atomic commit**: all-or-nothing semantics for multi-record snapshots
//! - **Audit log**: dense sequence numbers, ordering, filtering
//! - **Serialized writers**: concurrent check-then-insert has exactly one winner
//! - **Error handling**: correct error variants for invalid operations
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use sustain_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod commit;
mod concurrent;
mod error;
mod events;
mod init;
mod snapshot;

use std::fmt;
use std::future::Future;

use crate::record::{AuditEventKind, AuditEventRecord, RegistryMeta, VerificationRecord};
use crate::RegistryStorage;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "init", "snapshot", "commit").
    pub category: String,
    /// Test name (e.g. "initialize_creates_meta").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: RegistryStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(init::run_init_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);
    results.extend(events::run_event_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn make_meta(owner: &str) -> RegistryMeta {
    RegistryMeta {
        owner: owner.to_string(),
        last_timestamp: 0,
        event_count: 0,
        last_event_hash: "genesis".to_string(),
    }
}

fn make_record(manager: &str, level: u32, verified_at: u64) -> VerificationRecord {
    VerificationRecord {
        manager: manager.to_string(),
        name: "John Doe".to_string(),
        organization: "Green Transport Co".to_string(),
        certification_level: level,
        verified_at,
        revoked: false,
        revoked_at: None,
    }
}

fn make_event(sequence: u64, kind: AuditEventKind, manager: Option<&str>) -> AuditEventRecord {
    AuditEventRecord {
        sequence,
        kind,
        manager: manager.map(|m| m.to_string()),
        caller: "test-owner".to_string(),
        at: sequence + 1,
        certification_level: None,
        owner: None,
        prev_hash: format!("hash-{}", sequence),
        hash: format!("hash-{}", sequence + 1),
    }
}

/// Initialize and commit metadata owned by `test-owner`.
async fn seed_meta<S: RegistryStorage>(s: &S) -> Result<(), String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    s.initialize_registry(&mut snap, make_meta("test-owner"))
        .await
        .map_err(|e| format!("init: {e}"))?;
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))
}

/// Write and commit a single record.
async fn seed_record<S: RegistryStorage>(s: &S, record: VerificationRecord) -> Result<(), String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    s.put_record(&mut snap, record)
        .await
        .map_err(|e| format!("put_record: {e}"))?;
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))
}
