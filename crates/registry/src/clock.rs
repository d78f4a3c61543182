//! Timestamp sources for registry mutations.
//!
//! A [`Clock`] only supplies a raw reading. [`next_timestamp`] combines it
//! with the last issued timestamp so that every committed mutation gets a
//! strictly larger value, whatever the clock does.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

pub trait Clock: Send + Sync + 'static {
    /// Current raw reading.
    fn now(&self) -> u64;
}

/// Block-height semantics: reads 0, so each mutation lands on `last + 1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockClock;

impl Clock for BlockClock {
    fn now(&self) -> u64 {
        0
    }
}

/// Unix epoch seconds (UTC).
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochClock;

impl Clock for EpochClock {
    fn now(&self) -> u64 {
        let secs = time::OffsetDateTime::now_utc().unix_timestamp();
        u64::try_from(secs).unwrap_or(0)
    }
}

/// A settable clock for tests and replays.
#[derive(Debug, Default)]
pub struct FixedClock {
    value: AtomicU64,
}

impl FixedClock {
    pub fn new(value: u64) -> Self {
        Self {
            value: AtomicU64::new(value),
        }
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}

impl<C: Clock> Clock for std::sync::Arc<C> {
    fn now(&self) -> u64 {
        self.as_ref().now()
    }
}

/// The timestamp for the next mutation: the clock reading, but never less
/// than `last + 1`.
pub fn next_timestamp(clock: &dyn Clock, last: u64) -> u64 {
    clock.now().max(last.saturating_add(1))
}

/// Clock selection as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockKind {
    #[default]
    Block,
    Epoch,
}

impl ClockKind {
    pub fn build(self) -> Box<dyn Clock> {
        match self {
            ClockKind::Block => Box::new(BlockClock),
            ClockKind::Epoch => Box::new(EpochClock),
        }
    }
}

impl std::str::FromStr for ClockKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block" => Ok(ClockKind::Block),
            "epoch" => Ok(ClockKind::Epoch),
            other => Err(format!("unknown clock '{}': expected block or epoch", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_clock_counts_heights() {
        let clock = BlockClock;
        assert_eq!(next_timestamp(&clock, 0), 1);
        assert_eq!(next_timestamp(&clock, 41), 42);
    }

    #[test]
    fn epoch_clock_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(EpochClock.now() > 1_577_836_800);
    }

    #[test]
    fn fixed_clock_never_goes_backwards() {
        let clock = FixedClock::new(1000);
        assert_eq!(next_timestamp(&clock, 0), 1000);
        assert_eq!(next_timestamp(&clock, 1000), 1001);
        clock.set(5);
        assert_eq!(next_timestamp(&clock, 1001), 1002);
    }

    #[test]
    fn saturates_at_max() {
        assert_eq!(next_timestamp(&BlockClock, u64::MAX), u64::MAX);
    }

    #[test]
    fn clock_kind_parses_config_values() {
        assert_eq!("block".parse::<ClockKind>().unwrap(), ClockKind::Block);
        assert_eq!("epoch".parse::<ClockKind>().unwrap(), ClockKind::Epoch);
        assert!("wall".parse::<ClockKind>().is_err());
        let kind: ClockKind = serde_json::from_str("\"epoch\"").unwrap();
        assert_eq!(kind, ClockKind::Epoch);
    }
}
