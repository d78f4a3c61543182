//! Registry error type with stable numeric codes.
//!
//! The codes are part of the external interface: the CLI prints them and
//! the HTTP API returns them in `{code, message}` bodies.

use sustain_storage::StorageError;

/// Errors returned by [`crate::ManagerRegistry`] operations.
///
/// Every failed operation leaves storage untouched.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The caller is not the registry owner.
    #[error("Not authorized: '{caller}' is not the registry owner")]
    NotAuthorized { caller: String },

    /// The manager already holds an active verification.
    #[error("Already verified: '{manager}' holds an active verification")]
    AlreadyVerified { manager: String },

    /// The manager has no active verification (never verified, or revoked).
    #[error("Not verified: '{manager}' has no active verification")]
    NotVerified { manager: String },

    /// Certification level outside the configured range.
    #[error("Invalid certification level {level}: expected {min}..={max}")]
    InvalidCertificationLevel { level: u32, min: u32, max: u32 },

    /// A text field or identifier failed validation.
    #[error("Invalid input: {field} {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Registry not initialized")]
    NotInitialized,

    #[error("Registry already initialized (owner '{owner}')")]
    AlreadyInitialized { owner: String },

    /// The audit log failed hash-chain verification at `sequence`.
    #[error("Audit chain broken at event {sequence}: {reason}")]
    AuditChainBroken { sequence: u64, reason: String },

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl RegistryError {
    /// Stable numeric error code.
    pub fn code(&self) -> u32 {
        match self {
            RegistryError::NotAuthorized { .. } => 100,
            RegistryError::AlreadyVerified { .. } => 101,
            RegistryError::NotVerified { .. } => 102,
            RegistryError::InvalidCertificationLevel { .. } => 103,
            RegistryError::InvalidInput { .. } => 104,
            RegistryError::NotInitialized => 105,
            RegistryError::AlreadyInitialized { .. } => 106,
            RegistryError::AuditChainBroken { .. } => 107,
            RegistryError::Storage(_) => 500,
        }
    }

    /// Short, fixed message for the error kind (e.g. "Already verified").
    pub fn message(&self) -> &'static str {
        match self {
            RegistryError::NotAuthorized { .. } => "Not authorized",
            RegistryError::AlreadyVerified { .. } => "Already verified",
            RegistryError::NotVerified { .. } => "Not verified",
            RegistryError::InvalidCertificationLevel { .. } => "Invalid certification level",
            RegistryError::InvalidInput { .. } => "Invalid input",
            RegistryError::NotInitialized => "Registry not initialized",
            RegistryError::AlreadyInitialized { .. } => "Registry already initialized",
            RegistryError::AuditChainBroken { .. } => "Audit chain broken",
            RegistryError::Storage(_) => "Storage error",
        }
    }

    /// Structured form used by JSON output: `{code, message, detail}`.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code(),
            "message": self.message(),
            "detail": self.to_string(),
        })
    }
}

impl From<StorageError> for RegistryError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotInitialized => RegistryError::NotInitialized,
            StorageError::AlreadyInitialized { owner } => {
                RegistryError::AlreadyInitialized { owner }
            }
            other => RegistryError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_verified_matches_wire_fixture() {
        let err = RegistryError::AlreadyVerified {
            manager: "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG".to_string(),
        };
        assert_eq!(err.code(), 101);
        assert_eq!(err.message(), "Already verified");
        let json = err.to_json_value();
        assert_eq!(json["code"], 101);
        assert_eq!(json["message"], "Already verified");
    }

    #[test]
    fn storage_errors_map_to_registry_kinds() {
        assert!(matches!(
            RegistryError::from(StorageError::NotInitialized),
            RegistryError::NotInitialized
        ));
        assert!(matches!(
            RegistryError::from(StorageError::AlreadyInitialized {
                owner: "o".to_string()
            }),
            RegistryError::AlreadyInitialized { .. }
        ));
        let backend = RegistryError::from(StorageError::Backend("disk full".to_string()));
        assert_eq!(backend.code(), 500);
        assert!(backend.to_string().contains("disk full"));
    }

    #[test]
    fn codes_are_distinct() {
        let errors = [
            RegistryError::NotAuthorized {
                caller: String::new(),
            },
            RegistryError::AlreadyVerified {
                manager: String::new(),
            },
            RegistryError::NotVerified {
                manager: String::new(),
            },
            RegistryError::InvalidCertificationLevel {
                level: 0,
                min: 1,
                max: 5,
            },
            RegistryError::InvalidInput {
                field: "name",
                reason: String::new(),
            },
            RegistryError::NotInitialized,
            RegistryError::AlreadyInitialized {
                owner: String::new(),
            },
            RegistryError::AuditChainBroken {
                sequence: 0,
                reason: String::new(),
            },
        ];
        let mut codes: Vec<u32> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
