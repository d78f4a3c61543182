//! Sustainability manager verification registry.
//!
//! A privileged owner grants and revokes verification for manager account
//! identifiers; anyone can read verification status and details. State lives
//! behind a [`sustain_storage::RegistryStorage`] backend, and every mutation
//! is appended to a hash-chained audit log.

pub mod audit;
pub mod clock;
pub mod error;
pub mod policy;
mod registry;
pub mod types;

pub use clock::{BlockClock, Clock, ClockKind, EpochClock, FixedClock};
pub use error::RegistryError;
pub use policy::RegistryPolicy;
pub use registry::ManagerRegistry;
pub use types::{ManagerDetails, RevokeOutcome, TransferOutcome, VerifyOutcome};

pub use sustain_storage::{
    AuditEventKind, AuditEventRecord, FileStorage, MemoryStorage, RecordFilter, RegistryMeta,
    RegistryStorage, VerificationRecord,
};
