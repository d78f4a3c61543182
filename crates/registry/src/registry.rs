//! The manager registry.
//!
//! Every mutating call runs in one storage snapshot and follows the same
//! order:
//! 1. Load metadata (fails with `NotInitialized` before `initialize`)
//! 2. Caller check against the stored owner
//! 3. Input policy
//! 4. State preconditions on the manager's record
//! 5. Write record, append audit event, advance metadata head
//!
//! Any error aborts the snapshot, so failed calls leave no trace.

use sustain_storage::{
    AuditEventKind, AuditEventRecord, RecordFilter, RegistryMeta, RegistryStorage,
    VerificationRecord,
};
use tracing::{debug, info, warn};

use crate::audit::{self, GENESIS_HASH};
use crate::clock::{next_timestamp, BlockClock, Clock};
use crate::error::RegistryError;
use crate::policy::RegistryPolicy;
use crate::types::{ManagerDetails, RevokeOutcome, TransferOutcome, VerifyOutcome};

/// Audit event fields chosen by an operation; sequence and hashes are filled
/// in by `append_audit`.
struct EventDraft<'a> {
    kind: AuditEventKind,
    manager: Option<&'a str>,
    caller: &'a str,
    at: u64,
    certification_level: Option<u32>,
    owner: Option<&'a str>,
}

pub struct ManagerRegistry<S: RegistryStorage> {
    storage: S,
    clock: Box<dyn Clock>,
    policy: RegistryPolicy,
}

impl<S: RegistryStorage> ManagerRegistry<S> {
    /// A registry over `storage` using block-height timestamps and the
    /// default policy.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            clock: Box::new(BlockClock),
            policy: RegistryPolicy::default(),
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: RegistryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn policy(&self) -> &RegistryPolicy {
        &self.policy
    }

    // ── Mutations ────────────────────────────────────────────────────────────

    /// Create the registry with `owner` as its privileged identity.
    pub async fn initialize(&self, owner: &str) -> Result<RegistryMeta, RegistryError> {
        let mut snap = self.storage.begin_snapshot().await?;
        let result = self.initialize_in(&mut snap, owner).await;
        let meta = self.finish(snap, result).await?;
        info!(owner, "registry initialized");
        Ok(meta)
    }

    async fn initialize_in(
        &self,
        snap: &mut S::Snapshot,
        owner: &str,
    ) -> Result<RegistryMeta, RegistryError> {
        self.policy.check_identifier("owner", owner)?;
        let at = next_timestamp(self.clock.as_ref(), 0);
        let meta = RegistryMeta {
            owner: owner.to_string(),
            last_timestamp: 0,
            event_count: 0,
            last_event_hash: GENESIS_HASH.to_string(),
        };
        self.storage.initialize_registry(snap, meta.clone()).await?;
        self.append_audit(
            snap,
            meta,
            EventDraft {
                kind: AuditEventKind::Initialized,
                manager: None,
                caller: owner,
                at,
                certification_level: None,
                owner: Some(owner),
            },
        )
        .await
    }

    /// Grant verification to `manager`. Owner only.
    ///
    /// Fails with `AlreadyVerified` (101) while the manager holds an active
    /// record. A revoked record is overwritten with a fresh verification.
    pub async fn verify(
        &self,
        caller: &str,
        manager: &str,
        name: &str,
        organization: &str,
        certification_level: u32,
    ) -> Result<VerifyOutcome, RegistryError> {
        let mut snap = self.storage.begin_snapshot().await?;
        let result = self
            .verify_in(
                &mut snap,
                caller,
                manager,
                name,
                organization,
                certification_level,
            )
            .await;
        let record = self.finish(snap, result).await.inspect_err(|e| {
            warn!(caller, manager, code = e.code(), "verify rejected: {}", e);
        })?;
        info!(
            manager,
            level = record.certification_level,
            verified_at = record.verified_at,
            "manager verified"
        );
        Ok(VerifyOutcome {
            success: true,
            verified: true,
            manager: record.manager.clone(),
            details: ManagerDetails::from(&record),
        })
    }

    async fn verify_in(
        &self,
        snap: &mut S::Snapshot,
        caller: &str,
        manager: &str,
        name: &str,
        organization: &str,
        certification_level: u32,
    ) -> Result<VerificationRecord, RegistryError> {
        let meta = self.authorize(snap, caller).await?;
        self.policy.check_identifier("manager", manager)?;
        self.policy.check_text("name", name)?;
        self.policy.check_text("organization", organization)?;
        self.policy.check_level(certification_level)?;

        if let Some(existing) = self.storage.get_record_for_update(snap, manager).await? {
            if existing.is_active() {
                return Err(RegistryError::AlreadyVerified {
                    manager: manager.to_string(),
                });
            }
        }

        let at = next_timestamp(self.clock.as_ref(), meta.last_timestamp);
        let record = VerificationRecord {
            manager: manager.to_string(),
            name: name.to_string(),
            organization: organization.to_string(),
            certification_level,
            verified_at: at,
            revoked: false,
            revoked_at: None,
        };
        self.storage.put_record(snap, record.clone()).await?;
        self.append_audit(
            snap,
            meta,
            EventDraft {
                kind: AuditEventKind::Verified,
                manager: Some(manager),
                caller,
                at,
                certification_level: Some(certification_level),
                owner: None,
            },
        )
        .await?;
        Ok(record)
    }

    /// Revoke `manager`'s active verification. Owner only.
    ///
    /// The record is kept with `revoked = true`; `verified_at` is unchanged.
    pub async fn revoke(&self, caller: &str, manager: &str) -> Result<RevokeOutcome, RegistryError> {
        let mut snap = self.storage.begin_snapshot().await?;
        let result = self.revoke_in(&mut snap, caller, manager).await;
        self.finish(snap, result).await.inspect_err(|e| {
            warn!(caller, manager, code = e.code(), "revoke rejected: {}", e);
        })?;
        info!(manager, "verification revoked");
        Ok(RevokeOutcome {
            success: true,
            revoked: true,
        })
    }

    async fn revoke_in(
        &self,
        snap: &mut S::Snapshot,
        caller: &str,
        manager: &str,
    ) -> Result<(), RegistryError> {
        let meta = self.authorize(snap, caller).await?;
        let mut record = match self.storage.get_record_for_update(snap, manager).await? {
            Some(r) if r.is_active() => r,
            _ => {
                return Err(RegistryError::NotVerified {
                    manager: manager.to_string(),
                })
            }
        };

        let at = next_timestamp(self.clock.as_ref(), meta.last_timestamp);
        record.revoked = true;
        record.revoked_at = Some(at);
        let level = record.certification_level;
        self.storage.put_record(snap, record).await?;
        self.append_audit(
            snap,
            meta,
            EventDraft {
                kind: AuditEventKind::Revoked,
                manager: Some(manager),
                caller,
                at,
                certification_level: Some(level),
                owner: None,
            },
        )
        .await?;
        Ok(())
    }

    /// Hand the owner role to `new_owner`. Owner only.
    pub async fn transfer_ownership(
        &self,
        caller: &str,
        new_owner: &str,
    ) -> Result<TransferOutcome, RegistryError> {
        let mut snap = self.storage.begin_snapshot().await?;
        let result = self.transfer_in(&mut snap, caller, new_owner).await;
        let meta = self.finish(snap, result).await.inspect_err(|e| {
            warn!(caller, new_owner, code = e.code(), "ownership transfer rejected: {}", e);
        })?;
        info!(previous = caller, owner = %meta.owner, "ownership transferred");
        Ok(TransferOutcome {
            success: true,
            previous_owner: caller.to_string(),
            owner: meta.owner,
        })
    }

    async fn transfer_in(
        &self,
        snap: &mut S::Snapshot,
        caller: &str,
        new_owner: &str,
    ) -> Result<RegistryMeta, RegistryError> {
        let mut meta = self.authorize(snap, caller).await?;
        self.policy.check_identifier("new_owner", new_owner)?;
        let at = next_timestamp(self.clock.as_ref(), meta.last_timestamp);
        meta.owner = new_owner.to_string();
        self.append_audit(
            snap,
            meta,
            EventDraft {
                kind: AuditEventKind::OwnershipTransferred,
                manager: None,
                caller,
                at,
                certification_level: None,
                owner: Some(new_owner),
            },
        )
        .await
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    /// True iff `manager` has a record that is not revoked.
    pub async fn is_verified(&self, manager: &str) -> Result<bool, RegistryError> {
        let verified = self
            .storage
            .get_record(manager)
            .await?
            .is_some_and(|r| r.is_active());
        debug!(manager, verified, "is_verified");
        Ok(verified)
    }

    /// The stored record, including revoked ones. `None` if never verified.
    pub async fn get_details(
        &self,
        manager: &str,
    ) -> Result<Option<VerificationRecord>, RegistryError> {
        Ok(self.storage.get_record(manager).await?)
    }

    pub async fn owner(&self) -> Result<String, RegistryError> {
        Ok(self.storage.get_meta().await?.owner)
    }

    pub async fn list_managers(
        &self,
        filter: RecordFilter,
        limit: usize,
    ) -> Result<Vec<VerificationRecord>, RegistryError> {
        Ok(self.storage.list_records(filter, limit).await?)
    }

    /// Audit events in sequence order, optionally for one manager.
    pub async fn history(
        &self,
        manager: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AuditEventRecord>, RegistryError> {
        Ok(self.storage.list_events(manager, limit).await?)
    }

    /// Recompute the audit hash chain. Returns the number of events checked.
    pub async fn verify_audit_chain(&self) -> Result<usize, RegistryError> {
        let meta = self.storage.get_meta().await?;
        let events = self.storage.list_events(None, 0).await?;
        let checked = audit::verify_chain(&events, &meta)?;
        debug!(checked, "audit chain verified");
        Ok(checked)
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    async fn authorize(
        &self,
        snap: &mut S::Snapshot,
        caller: &str,
    ) -> Result<RegistryMeta, RegistryError> {
        let meta = self.storage.get_meta_for_update(snap).await?;
        if caller != meta.owner {
            return Err(RegistryError::NotAuthorized {
                caller: caller.to_string(),
            });
        }
        Ok(meta)
    }

    /// Append the audit event and advance the metadata head in the same
    /// snapshot. Returns the updated metadata.
    async fn append_audit(
        &self,
        snap: &mut S::Snapshot,
        mut meta: RegistryMeta,
        draft: EventDraft<'_>,
    ) -> Result<RegistryMeta, RegistryError> {
        let mut event = AuditEventRecord {
            sequence: meta.event_count,
            kind: draft.kind,
            manager: draft.manager.map(str::to_string),
            caller: draft.caller.to_string(),
            at: draft.at,
            certification_level: draft.certification_level,
            owner: draft.owner.map(str::to_string),
            prev_hash: meta.last_event_hash.clone(),
            hash: String::new(),
        };
        event.hash = audit::event_hash(&event);

        meta.event_count += 1;
        meta.last_event_hash = event.hash.clone();
        meta.last_timestamp = draft.at;

        self.storage.append_event(snap, event).await?;
        self.storage.put_meta(snap, meta.clone()).await?;
        Ok(meta)
    }

    /// Commit on success, abort on failure.
    async fn finish<T>(
        &self,
        snap: S::Snapshot,
        result: Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        match result {
            Ok(value) => {
                self.storage.commit_snapshot(snap).await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = self.storage.abort_snapshot(snap).await {
                    warn!("failed to abort snapshot: {}", abort_err);
                }
                Err(e)
            }
        }
    }
}
