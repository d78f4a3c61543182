//! Hash-chained audit log.
//!
//! Each event's `hash` is SHA-256 over its canonical fields plus the previous
//! event's hash, so rewriting or dropping any committed event breaks every
//! later link.

use sha2::{Digest, Sha256};
use sustain_storage::{AuditEventRecord, RegistryMeta};

use crate::error::RegistryError;

/// `prev_hash` of the first event.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Compute the chained hash of `event`. The `hash` field itself is ignored.
pub fn event_hash(event: &AuditEventRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event.sequence.to_be_bytes());
    hasher.update(event.kind.as_str().as_bytes());
    for field in [
        event.manager.as_deref(),
        Some(event.caller.as_str()),
        event.owner.as_deref(),
    ] {
        // Length-prefix each optional field so adjacent fields cannot blur.
        match field {
            Some(s) => {
                hasher.update([1u8]);
                hasher.update((s.len() as u64).to_be_bytes());
                hasher.update(s.as_bytes());
            }
            None => hasher.update([0u8]),
        }
    }
    hasher.update(event.at.to_be_bytes());
    match event.certification_level {
        Some(level) => {
            hasher.update([1u8]);
            hasher.update(level.to_be_bytes());
        }
        None => hasher.update([0u8]),
    }
    hasher.update(event.prev_hash.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Walk the full event log and check sequence numbers, links, hashes, and
/// that the metadata head points at the last event.
///
/// Returns the number of events checked.
pub fn verify_chain(events: &[AuditEventRecord], meta: &RegistryMeta) -> Result<usize, RegistryError> {
    let mut prev = GENESIS_HASH.to_string();
    let mut last_at = 0u64;
    for (i, event) in events.iter().enumerate() {
        let expected_seq = i as u64;
        let broken = |reason: String| RegistryError::AuditChainBroken {
            sequence: event.sequence,
            reason,
        };
        if event.sequence != expected_seq {
            return Err(broken(format!("expected sequence {}", expected_seq)));
        }
        if event.prev_hash != prev {
            return Err(broken("prev_hash does not match previous event".to_string()));
        }
        if event_hash(event) != event.hash {
            return Err(broken("hash does not match event contents".to_string()));
        }
        if i > 0 && event.at <= last_at {
            return Err(broken(format!(
                "timestamp {} not after previous {}",
                event.at, last_at
            )));
        }
        last_at = event.at;
        prev = event.hash.clone();
    }

    let head = events.len() as u64;
    if meta.event_count != head || meta.last_event_hash != prev {
        return Err(RegistryError::AuditChainBroken {
            sequence: head,
            reason: format!(
                "registry head (count {}, hash {}) does not match log end",
                meta.event_count, meta.last_event_hash
            ),
        });
    }
    Ok(events.len())
}
