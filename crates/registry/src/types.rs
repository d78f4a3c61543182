//! Result shapes returned by registry operations.
//!
//! Field names serialize in camelCase to match the registry's external
//! JSON interface (`certificationLevel`, `verifiedAt`).

use serde::{Deserialize, Serialize};
use sustain_storage::VerificationRecord;

/// The public details of a verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerDetails {
    pub name: String,
    pub organization: String,
    pub certification_level: u32,
    pub verified_at: u64,
}

impl From<&VerificationRecord> for ManagerDetails {
    fn from(record: &VerificationRecord) -> Self {
        Self {
            name: record.name.clone(),
            organization: record.organization.clone(),
            certification_level: record.certification_level,
            verified_at: record.verified_at,
        }
    }
}

/// Result of a successful `verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub success: bool,
    pub verified: bool,
    pub manager: String,
    pub details: ManagerDetails,
}

/// Result of a successful `revoke`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeOutcome {
    pub success: bool,
    pub revoked: bool,
}

/// Result of a successful `transfer_ownership`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub success: bool,
    pub previous_owner: String,
    pub owner: String,
}
