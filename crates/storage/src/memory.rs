//! In-memory `RegistryStorage` backend.
//!
//! Committed state sits behind an `RwLock`; an open snapshot holds the
//! writer mutex plus a private write set that is merged on commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::error::StorageError;
use crate::record::{AuditEventRecord, RecordFilter, RegistryMeta, VerificationRecord};
use crate::traits::RegistryStorage;

/// The full committed contents of a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    #[serde(default)]
    pub meta: Option<RegistryMeta>,
    #[serde(default)]
    pub records: BTreeMap<String, VerificationRecord>,
    #[serde(default)]
    pub events: Vec<AuditEventRecord>,
}

impl LedgerState {
    fn apply(&mut self, writes: PendingWrites) {
        if let Some(meta) = writes.meta {
            self.meta = Some(meta);
        }
        self.records.extend(writes.records);
        self.events.extend(writes.events);
    }

    pub(crate) fn select_records(
        &self,
        filter: RecordFilter,
        limit: usize,
    ) -> Vec<VerificationRecord> {
        let matching = self.records.values().filter(|r| filter.matches(r)).cloned();
        if limit == 0 {
            matching.collect()
        } else {
            matching.take(limit).collect()
        }
    }

    pub(crate) fn select_events(
        &self,
        manager: Option<&str>,
        limit: usize,
    ) -> Vec<AuditEventRecord> {
        let matching = self
            .events
            .iter()
            .filter(|e| manager.is_none() || e.manager.as_deref() == manager)
            .cloned();
        if limit == 0 {
            matching.collect()
        } else {
            matching.take(limit).collect()
        }
    }
}

#[derive(Debug, Default)]
struct PendingWrites {
    meta: Option<RegistryMeta>,
    records: BTreeMap<String, VerificationRecord>,
    events: Vec<AuditEventRecord>,
}

/// An open transaction against a [`MemoryStorage`].
///
/// Holds the writer lock until consumed by commit/abort or dropped.
pub struct MemorySnapshot {
    _writer: OwnedMutexGuard<()>,
    pending: PendingWrites,
}

/// Volatile storage backend. Cloning shares the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    pub(crate) committed: Arc<RwLock<LedgerState>>,
    writer: Arc<Mutex<()>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing committed state.
    pub fn from_state(state: LedgerState) -> Self {
        Self {
            committed: Arc::new(RwLock::new(state)),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// A copy of the committed state.
    pub async fn export_state(&self) -> LedgerState {
        self.committed.read().await.clone()
    }

    /// Merge a snapshot's writes into a copy of the committed state without
    /// publishing it. The writer lock stays held by the returned guard.
    pub(crate) async fn stage(
        &self,
        snapshot: MemorySnapshot,
    ) -> (LedgerState, OwnedMutexGuard<()>) {
        let MemorySnapshot {
            _writer: writer,
            pending,
        } = snapshot;
        let mut next = self.committed.read().await.clone();
        next.apply(pending);
        (next, writer)
    }

    /// Publish a staged state. The caller still holds the writer guard.
    pub(crate) async fn publish(&self, state: LedgerState) {
        *self.committed.write().await = state;
    }
}

#[async_trait]
impl RegistryStorage for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError> {
        let guard = self.writer.clone().lock_owned().await;
        Ok(MemorySnapshot {
            _writer: guard,
            pending: PendingWrites::default(),
        })
    }

    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError> {
        let MemorySnapshot { _writer, pending } = snapshot;
        self.committed.write().await.apply(pending);
        Ok(())
    }

    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError> {
        drop(snapshot);
        Ok(())
    }

    async fn initialize_registry(
        &self,
        snapshot: &mut Self::Snapshot,
        meta: RegistryMeta,
    ) -> Result<(), StorageError> {
        let existing = match &snapshot.pending.meta {
            Some(m) => Some(m.clone()),
            None => self.committed.read().await.meta.clone(),
        };
        if let Some(existing) = existing {
            return Err(StorageError::AlreadyInitialized {
                owner: existing.owner,
            });
        }
        snapshot.pending.meta = Some(meta);
        Ok(())
    }

    async fn get_meta_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
    ) -> Result<RegistryMeta, StorageError> {
        if let Some(meta) = &snapshot.pending.meta {
            return Ok(meta.clone());
        }
        self.committed
            .read()
            .await
            .meta
            .clone()
            .ok_or(StorageError::NotInitialized)
    }

    async fn put_meta(
        &self,
        snapshot: &mut Self::Snapshot,
        meta: RegistryMeta,
    ) -> Result<(), StorageError> {
        if snapshot.pending.meta.is_none() && self.committed.read().await.meta.is_none() {
            return Err(StorageError::NotInitialized);
        }
        snapshot.pending.meta = Some(meta);
        Ok(())
    }

    async fn get_record_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        manager: &str,
    ) -> Result<Option<VerificationRecord>, StorageError> {
        if let Some(record) = snapshot.pending.records.get(manager) {
            return Ok(Some(record.clone()));
        }
        Ok(self.committed.read().await.records.get(manager).cloned())
    }

    async fn put_record(
        &self,
        snapshot: &mut Self::Snapshot,
        record: VerificationRecord,
    ) -> Result<(), StorageError> {
        snapshot
            .pending
            .records
            .insert(record.manager.clone(), record);
        Ok(())
    }

    async fn append_event(
        &self,
        snapshot: &mut Self::Snapshot,
        event: AuditEventRecord,
    ) -> Result<(), StorageError> {
        let expected =
            (self.committed.read().await.events.len() + snapshot.pending.events.len()) as u64;
        if event.sequence != expected {
            return Err(StorageError::SequenceConflict {
                expected,
                actual: event.sequence,
            });
        }
        snapshot.pending.events.push(event);
        Ok(())
    }

    async fn get_meta(&self) -> Result<RegistryMeta, StorageError> {
        self.committed
            .read()
            .await
            .meta
            .clone()
            .ok_or(StorageError::NotInitialized)
    }

    async fn get_record(&self, manager: &str) -> Result<Option<VerificationRecord>, StorageError> {
        Ok(self.committed.read().await.records.get(manager).cloned())
    }

    async fn list_records(
        &self,
        filter: RecordFilter,
        limit: usize,
    ) -> Result<Vec<VerificationRecord>, StorageError> {
        Ok(self.committed.read().await.select_records(filter, limit))
    }

    async fn list_events(
        &self,
        manager: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AuditEventRecord>, StorageError> {
        Ok(self.committed.read().await.select_events(manager, limit))
    }
}
