//! Application state and rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use sustain_registry::{FileStorage, ManagerRegistry};
use tokio::sync::Mutex;

use super::RATE_LIMIT_WINDOW_SECS;

/// Per-IP request tracker: (request count, window start time).
type IpTracker = HashMap<IpAddr, (u64, Instant)>;

struct Tracker {
    ips: IpTracker,
    /// When expired windows were last swept out of `ips`.
    last_prune: Instant,
}

/// In-memory per-IP rate limiter.
pub(crate) struct RateLimiter {
    tracker: Mutex<Tracker>,
    /// Maximum requests per window.
    pub(crate) max_requests: u64,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u64) -> Self {
        Self {
            tracker: Mutex::new(Tracker {
                ips: HashMap::new(),
                last_prune: Instant::now(),
            }),
            max_requests,
        }
    }

    /// Check if a request from the given IP is allowed.
    /// Returns Ok(()) if allowed, Err(retry_after_secs) if rate limited.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        self.check_at(ip, Instant::now()).await
    }

    async fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), u64> {
        let mut tracker = self.tracker.lock().await;

        // Sweep expired windows at most once per window.
        if now.duration_since(tracker.last_prune).as_secs() >= RATE_LIMIT_WINDOW_SECS {
            tracker.ips.retain(|_, (_, start)| {
                now.duration_since(*start).as_secs() < RATE_LIMIT_WINDOW_SECS
            });
            tracker.last_prune = now;
        }

        let entry = tracker.ips.entry(ip).or_insert((0, now));

        let mut elapsed = now.duration_since(entry.1).as_secs();
        if elapsed >= RATE_LIMIT_WINDOW_SECS {
            entry.0 = 0;
            entry.1 = now;
            elapsed = 0;
        }

        entry.0 += 1;
        if entry.0 > self.max_requests {
            Err(RATE_LIMIT_WINDOW_SECS.saturating_sub(elapsed))
        } else {
            Ok(())
        }
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.tracker.lock().await.ips.len()
    }
}

/// Application state shared across request handlers.
pub(crate) struct AppState {
    pub(crate) registry: ManagerRegistry<FileStorage>,
    pub(crate) rate_limiter: RateLimiter,
    /// Optional API key for authentication. None = no auth required.
    pub(crate) api_key: Option<String>,
}
