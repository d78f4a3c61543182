pub mod conformance;
mod error;
mod file;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use file::{FileSnapshot, FileStorage, STATE_FORMAT_VERSION};
pub use memory::{LedgerState, MemorySnapshot, MemoryStorage};
pub use record::{
    AuditEventKind, AuditEventRecord, RecordFilter, RegistryMeta, VerificationRecord,
};
pub use traits::RegistryStorage;
