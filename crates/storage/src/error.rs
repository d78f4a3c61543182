/// All errors that can be returned by a RegistryStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The registry metadata has not been created yet.
    #[error("registry not initialized")]
    NotInitialized,

    /// Registry metadata already exists; `initialize_registry` may only run once.
    #[error("registry already initialized with owner {owner}")]
    AlreadyInitialized { owner: String },

    /// An audit event was appended out of sequence. The backend expected
    /// `expected` as the next sequence number.
    #[error("audit sequence conflict: expected {expected}, got {actual}")]
    SequenceConflict { expected: u64, actual: u64 },

    /// A backend-specific storage error (I/O, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Backend(format!("serialization: {e}"))
    }
}
