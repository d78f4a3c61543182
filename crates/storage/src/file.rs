//! JSON-file `RegistryStorage` backend.
//!
//! The state file is the source of truth and may be shared by several
//! processes (a running `serve` plus one-shot CLI commands):
//!
//! - A snapshot holds an exclusive advisory lock on a sibling `<state>.lock`
//!   file from `begin_snapshot` until it is committed, aborted, or dropped,
//!   and reloads the state file under that lock before any snapshot read.
//! - Commit writes the whole state to a temp file in the same directory and
//!   renames it over the target, so readers never see a partial file. If
//!   the write fails, the snapshot is discarded and the file is unchanged.
//! - Committed-state queries read the file directly and never take the lock.
//!
//! Inside one process, writers additionally queue on the in-memory writer
//! mutex, so at most one task waits on the file lock at a time.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::memory::{LedgerState, MemorySnapshot, MemoryStorage};
use crate::record::{AuditEventRecord, RecordFilter, RegistryMeta, VerificationRecord};
use crate::traits::RegistryStorage;

/// On-disk format version written into every state file.
pub const STATE_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateFile {
    format_version: u32,
    #[serde(flatten)]
    state: LedgerState,
}

/// Durable storage backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    inner: MemoryStorage,
    path: PathBuf,
    lock_path: PathBuf,
}

/// An open transaction against a [`FileStorage`].
///
/// Holds the in-process writer lock and the cross-process file lock; both
/// are released when the snapshot is consumed or dropped.
pub struct FileSnapshot {
    inner: MemorySnapshot,
    _lock: File,
}

impl FileStorage {
    /// Open the state file at `path`, or start empty if it does not exist.
    /// The file is only created on the first commit.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let state = read_state_file(&path)?;
        let lock_path = lock_path_for(&path);
        Ok(Self {
            inner: MemoryStorage::from_state(state),
            path,
            lock_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Latest committed state on disk.
    async fn load(&self) -> Result<LedgerState, StorageError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_state_file(&path))
            .await
            .map_err(|e| StorageError::Backend(format!("state file reader failed: {}", e)))?
    }
}

/// `registry.json` -> `registry.json.lock`
fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

fn state_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Block until this process holds the exclusive lock on `lock_path`.
fn acquire_lock(lock_path: &Path) -> Result<File, StorageError> {
    if let Some(dir) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)
        .map_err(|e| {
            StorageError::Backend(format!(
                "failed to open lock file '{}': {}",
                lock_path.display(),
                e
            ))
        })?;
    FileExt::lock_exclusive(&file).map_err(|e| {
        StorageError::Backend(format!(
            "failed to lock '{}': {}",
            lock_path.display(),
            e
        ))
    })?;
    Ok(file)
}

/// Read the state file. A missing file is an empty registry.
fn read_state_file(path: &Path) -> Result<LedgerState, StorageError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LedgerState::default()),
        Err(e) => {
            return Err(StorageError::Backend(format!(
                "failed to read '{}': {}",
                path.display(),
                e
            )))
        }
    };
    let file: StateFile = serde_json::from_str(&contents).map_err(|e| {
        StorageError::Backend(format!("invalid state file '{}': {}", path.display(), e))
    })?;
    if file.format_version != STATE_FORMAT_VERSION {
        return Err(StorageError::Backend(format!(
            "unsupported state file format {} in '{}' (expected {})",
            file.format_version,
            path.display(),
            STATE_FORMAT_VERSION
        )));
    }
    Ok(file.state)
}

fn write_state_file(path: &Path, state: &LedgerState) -> Result<(), StorageError> {
    let dir = state_dir(path);
    std::fs::create_dir_all(&dir)?;

    let file = StateFile {
        format_version: STATE_FORMAT_VERSION,
        state: state.clone(),
    };
    let json = serde_json::to_vec_pretty(&file)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| StorageError::Backend(format!("failed to persist state file: {}", e)))?;
    Ok(())
}

#[async_trait]
impl RegistryStorage for FileStorage {
    type Snapshot = FileSnapshot;

    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError> {
        let inner = self.inner.begin_snapshot().await?;
        let lock_path = self.lock_path.clone();
        let path = self.path.clone();
        let (lock, state) = tokio::task::spawn_blocking(move || {
            let lock = acquire_lock(&lock_path)?;
            let state = read_state_file(&path)?;
            Ok::<_, StorageError>((lock, state))
        })
        .await
        .map_err(|e| StorageError::Backend(format!("state file locker failed: {}", e)))??;
        // Another process may have committed since this handle last looked.
        self.inner.publish(state).await;
        Ok(FileSnapshot { inner, _lock: lock })
    }

    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError> {
        let FileSnapshot { inner, _lock } = snapshot;
        let (next, _writer) = self.inner.stage(inner).await;
        write_state_file(&self.path, &next)?;
        self.inner.publish(next).await;
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
        self.inner.initialize_registry(&mut snapshot.inner, meta).await
    }

    async fn get_meta_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
    ) -> Result<RegistryMeta, StorageError> {
        self.inner.get_meta_for_update(&mut snapshot.inner).await
    }

    async fn put_meta(
        &self,
        snapshot: &mut Self::Snapshot,
        meta: RegistryMeta,
    ) -> Result<(), StorageError> {
        self.inner.put_meta(&mut snapshot.inner, meta).await
    }

    async fn get_record_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        manager: &str,
    ) -> Result<Option<VerificationRecord>, StorageError> {
        self.inner
            .get_record_for_update(&mut snapshot.inner, manager)
            .await
    }

    async fn put_record(
        &self,
        snapshot: &mut Self::Snapshot,
        record: VerificationRecord,
    ) -> Result<(), StorageError> {
        self.inner.put_record(&mut snapshot.inner, record).await
    }

    async fn append_event(
        &self,
        snapshot: &mut Self::Snapshot,
        event: AuditEventRecord,
    ) -> Result<(), StorageError> {
        self.inner.append_event(&mut snapshot.inner, event).await
    }

    async fn get_meta(&self) -> Result<RegistryMeta, StorageError> {
        self.load().await?.meta.ok_or(StorageError::NotInitialized)
    }

    async fn get_record(&self, manager: &str) -> Result<Option<VerificationRecord>, StorageError> {
        Ok(self.load().await?.records.remove(manager))
    }

    async fn list_records(
        &self,
        filter: RecordFilter,
        limit: usize,
    ) -> Result<Vec<VerificationRecord>, StorageError> {
        Ok(self.load().await?.select_records(filter, limit))
    }

    async fn list_events(
        &self,
        manager: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AuditEventRecord>, StorageError> {
        Ok(self.load().await?.select_events(manager, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(owner: &str) -> RegistryMeta {
        RegistryMeta {
            owner: owner.to_string(),
            last_timestamp: 0,
            event_count: 0,
            last_event_hash: String::new(),
        }
    }

    #[tokio::test]
    async fn open_missing_file_starts_empty_and_creates_on_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("registry.json");
        let storage = FileStorage::open(&path).unwrap();
        assert!(!path.exists());

        let mut snap = storage.begin_snapshot().await.unwrap();
        storage
            .initialize_registry(&mut snap, meta("owner-1"))
            .await
            .unwrap();
        storage.commit_snapshot(snap).await.unwrap();

        assert!(path.exists());
        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get_meta().await.unwrap().owner, "owner-1");
    }

    #[tokio::test]
    async fn abort_does_not_touch_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let storage = FileStorage::open(&path).unwrap();

        let mut snap = storage.begin_snapshot().await.unwrap();
        storage
            .initialize_registry(&mut snap, meta("owner-1"))
            .await
            .unwrap();
        storage.abort_snapshot(snap).await.unwrap();

        assert!(!path.exists());
    }

    fn record(manager: &str) -> VerificationRecord {
        VerificationRecord {
            manager: manager.to_string(),
            name: "Fund".to_string(),
            organization: "Org".to_string(),
            certification_level: 3,
            verified_at: 1,
            revoked: false,
            revoked_at: None,
        }
    }

    #[tokio::test]
    async fn second_handle_sees_commits_from_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let a = FileStorage::open(&path).unwrap();
        let b = FileStorage::open(&path).unwrap();

        let mut snap = a.begin_snapshot().await.unwrap();
        a.initialize_registry(&mut snap, meta("owner-1")).await.unwrap();
        a.put_record(&mut snap, record("mgr-a")).await.unwrap();
        a.commit_snapshot(snap).await.unwrap();

        // Committed reads go to disk.
        assert_eq!(b.get_meta().await.unwrap().owner, "owner-1");
        assert!(b.get_record("mgr-a").await.unwrap().is_some());

        // A snapshot on the stale handle builds on the latest file.
        let mut snap = b.begin_snapshot().await.unwrap();
        assert!(b
            .get_record_for_update(&mut snap, "mgr-a")
            .await
            .unwrap()
            .is_some());
        b.put_record(&mut snap, record("mgr-b")).await.unwrap();
        b.commit_snapshot(snap).await.unwrap();

        let managers: Vec<String> = a
            .list_records(RecordFilter::All, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.manager)
            .collect();
        assert_eq!(managers, vec!["mgr-a".to_string(), "mgr-b".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn snapshot_excludes_other_handles_until_committed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let a = FileStorage::open(&path).unwrap();
        let b = FileStorage::open(&path).unwrap();

        let mut snap = a.begin_snapshot().await.unwrap();
        a.initialize_registry(&mut snap, meta("owner-1")).await.unwrap();

        let waiter = tokio::spawn(async move {
            let mut snap = b.begin_snapshot().await.unwrap();
            let meta = b.get_meta_for_update(&mut snap).await;
            b.abort_snapshot(snap).await.unwrap();
            meta
        });

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert!(!waiter.is_finished());

        a.commit_snapshot(snap).await.unwrap();
        let seen = tokio::time::timeout(std::time::Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(seen.owner, "owner-1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropped_snapshot_releases_the_file_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let a = FileStorage::open(&path).unwrap();
        let b = FileStorage::open(&path).unwrap();

        let snap = a.begin_snapshot().await.unwrap();
        drop(snap);

        let snap = tokio::time::timeout(std::time::Duration::from_secs(5), b.begin_snapshot())
            .await
            .unwrap()
            .unwrap();
        b.abort_snapshot(snap).await.unwrap();
        assert!(path.with_file_name("registry.json.lock").exists());
    }

    #[test]
    fn rejects_unknown_format_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, r#"{"formatVersion": 99}"#).unwrap();
        match FileStorage::open(&path) {
            Err(StorageError::Backend(msg)) => assert!(msg.contains("unsupported")),
            other => panic!("expected Backend error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            FileStorage::open(&path),
            Err(StorageError::Backend(_))
        ));
    }
}
