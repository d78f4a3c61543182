use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{AuditEventRecord, RecordFilter, RegistryMeta, VerificationRecord};

/// The storage trait for manager registry backends.
///
/// A `RegistryStorage` implementation provides transactional storage for the
/// registry metadata, verification records, and the append-only audit log.
///
/// ## Snapshot Semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing an
/// in-progress transaction. The lifecycle is:
///
/// 1. `begin_snapshot()` — start a transaction, returns a `Snapshot`
/// 2. Call mutating and `*_for_update` methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)` — commit and consume the transaction
///    OR `abort_snapshot(snapshot)` — roll back and consume the transaction
///
/// If a `Snapshot` is dropped without committing, its writes MUST be
/// discarded.
///
/// ## Serialized Writers
///
/// At most one snapshot is open at a time: `begin_snapshot` waits until the
/// previous snapshot is committed, aborted, or dropped. This gives every
/// mutation a total order. Query methods outside a snapshot observe the
/// latest committed state and never wait on an open snapshot.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait RegistryStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    /// Begin a new snapshot (transaction), waiting for any open one to finish.
    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all mutations durable.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all mutations.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Metadata (within snapshot) ───────────────────────────────────────────

    /// Create the registry metadata with the given owner.
    ///
    /// Returns `Err(StorageError::AlreadyInitialized)` if metadata exists,
    /// either committed or written earlier in the same snapshot.
    async fn initialize_registry(
        &self,
        snapshot: &mut Self::Snapshot,
        meta: RegistryMeta,
    ) -> Result<(), StorageError>;

    /// Read the metadata as seen by this snapshot.
    ///
    /// Returns `Err(StorageError::NotInitialized)` if there is none.
    async fn get_meta_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
    ) -> Result<RegistryMeta, StorageError>;

    /// Replace the metadata. Returns `Err(StorageError::NotInitialized)` if
    /// the registry was never initialized.
    async fn put_meta(
        &self,
        snapshot: &mut Self::Snapshot,
        meta: RegistryMeta,
    ) -> Result<(), StorageError>;

    // ── Records (within snapshot) ────────────────────────────────────────────

    /// Read a manager's record as seen by this snapshot (including its own
    /// uncommitted writes).
    async fn get_record_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        manager: &str,
    ) -> Result<Option<VerificationRecord>, StorageError>;

    /// Insert or overwrite the record keyed by `record.manager`.
    async fn put_record(
        &self,
        snapshot: &mut Self::Snapshot,
        record: VerificationRecord,
    ) -> Result<(), StorageError>;

    /// Append an audit event.
    ///
    /// `event.sequence` must equal the number of events already in the log
    /// (committed plus appended in this snapshot), otherwise
    /// `Err(StorageError::SequenceConflict)`.
    async fn append_event(
        &self,
        snapshot: &mut Self::Snapshot,
        event: AuditEventRecord,
    ) -> Result<(), StorageError>;

    // ── Query operations (committed state) ───────────────────────────────────

    /// Read the committed metadata.
    ///
    /// Returns `Err(StorageError::NotInitialized)` if there is none.
    async fn get_meta(&self) -> Result<RegistryMeta, StorageError>;

    /// Read a manager's committed record. `Ok(None)` if never verified.
    async fn get_record(&self, manager: &str) -> Result<Option<VerificationRecord>, StorageError>;

    /// List committed records ordered by manager identifier.
    ///
    /// - `filter`: all, active only, or revoked only
    /// - `limit`: maximum number of results (0 = no limit)
    async fn list_records(
        &self,
        filter: RecordFilter,
        limit: usize,
    ) -> Result<Vec<VerificationRecord>, StorageError>;

    /// List committed audit events in sequence order.
    ///
    /// - `manager`: only events concerning this manager
    /// - `limit`: maximum number of results (0 = no limit)
    async fn list_events(
        &self,
        manager: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AuditEventRecord>, StorageError>;
}
