use serde::{Deserialize, Serialize};

/// A manager's verification record as stored in the backend.
///
/// Records are never deleted. Revocation flips `revoked` and stamps
/// `revoked_at`; `verified_at` keeps the time of the last successful verify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    pub manager: String,
    pub name: String,
    pub organization: String,
    pub certification_level: u32,
    pub verified_at: u64,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<u64>,
}

impl VerificationRecord {
    /// True when the record grants verification (not revoked).
    pub fn is_active(&self) -> bool {
        !self.revoked
    }
}

/// Registry-wide metadata: the privileged owner plus the heads of the
/// timestamp sequence and the audit chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryMeta {
    pub owner: String,
    /// Last timestamp issued by any committed mutation.
    pub last_timestamp: u64,
    /// Number of audit events appended so far (next sequence number).
    pub event_count: u64,
    /// Hash of the most recent audit event, or the genesis hash.
    pub last_event_hash: String,
}

/// What an audit event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    Initialized,
    Verified,
    Revoked,
    OwnershipTransferred,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::Initialized => "initialized",
            AuditEventKind::Verified => "verified",
            AuditEventKind::Revoked => "revoked",
            AuditEventKind::OwnershipTransferred => "ownership_transferred",
        }
    }
}

/// One entry of the append-only audit log.
///
/// `hash` chains to `prev_hash`; the registry computes both, the backend
/// only enforces dense sequence numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEventRecord {
    pub sequence: u64,
    pub kind: AuditEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    pub caller: String,
    pub at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certification_level: Option<u32>,
    /// Owner after the event; set for `Initialized` and `OwnershipTransferred`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub prev_hash: String,
    pub hash: String,
}

/// Which records `list_records` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFilter {
    #[default]
    All,
    Active,
    Revoked,
}

impl RecordFilter {
    pub fn matches(&self, record: &VerificationRecord) -> bool {
        match self {
            RecordFilter::All => true,
            RecordFilter::Active => !record.revoked,
            RecordFilter::Revoked => record.revoked,
        }
    }
}
