//! Sliding-window rate limiting keyed by client identifier.
//!
//! Each client owns an ordered list of request timestamps. On every check the
//! list is pruned to the trailing window and its length compared against the
//! limit before the new timestamp is recorded, so the request that would be
//! number `max_requests + 1` inside the window is the first one rejected.
//!
//! The ledger is bounded: idle clients are removed by [`SlidingWindowLimiter::sweep`]
//! (run periodically by [`spawn_sweeper`]) and a new client arriving at the
//! `max_tracked_clients` cap evicts a batch of the clients whose latest
//! requests are oldest.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// A full ledger evicts `max_tracked_clients / EVICTION_DIVISOR` clients at once.
const EVICTION_DIVISOR: usize = 10;

/// Source of "now" for the limiter.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.offset_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

/// Live limits. Swapped atomically on config reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: usize,
    pub window: Duration,
    pub max_tracked_clients: usize,
}

impl From<&RateLimitConfig> for RateLimitPolicy {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: config.window(),
            max_tracked_clients: config.max_tracked_clients,
        }
    }
}

/// Outcome of a single rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request recorded; `remaining` more fit in the current window.
    Allowed { remaining: usize },
    /// Limit reached; nothing was recorded.
    Limited,
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Per-client sliding-window counter.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    ledger: DashMap<String, VecDeque<Instant>>,
    policy: ArcSwap<RateLimitPolicy>,
    clock: Arc<dyn Clock>,
}

/// Drop timestamps that are no longer strictly inside the window.
fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = timestamps.front() {
        if now.duration_since(oldest) >= window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}

impl SlidingWindowLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: RateLimitPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger: DashMap::new(),
            policy: ArcSwap::from_pointee(policy),
            clock,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(RateLimitPolicy::from(config))
    }

    pub fn policy(&self) -> RateLimitPolicy {
        **self.policy.load()
    }

    /// Replace the live limits. Existing timestamps are kept.
    pub fn set_policy(&self, policy: RateLimitPolicy) {
        self.policy.store(Arc::new(policy));
    }

    /// Record a request for `key` if it fits in the window.
    ///
    /// Prune, count and append happen under the key's shard lock, so
    /// concurrent requests from one client cannot both see a stale count.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let policy = self.policy();

        if !self.ledger.contains_key(key) {
            self.make_room(&policy);
        }

        let mut entry = self.ledger.entry(key.to_string()).or_default();
        let timestamps = entry.value_mut();
        let now = self.clock.now();
        prune(timestamps, now, policy.window);

        if timestamps.len() >= policy.max_requests {
            return RateLimitDecision::Limited;
        }

        timestamps.push_back(now);
        RateLimitDecision::Allowed {
            remaining: policy.max_requests - timestamps.len(),
        }
    }

    /// Forget everything recorded for `key`.
    pub fn reset(&self, key: &str) {
        self.ledger.remove(key);
    }

    /// Requests from `key` still inside the window. Does not record anything.
    pub fn recent_requests(&self, key: &str) -> usize {
        let policy = self.policy();
        let now = self.clock.now();
        self.ledger
            .get(key)
            .map(|ts| ts.iter().filter(|&&t| now.duration_since(t) < policy.window).count())
            .unwrap_or(0)
    }

    /// Number of clients currently held in the ledger.
    pub fn tracked_clients(&self) -> usize {
        self.ledger.len()
    }

    /// Prune every client and drop those left with no recent requests.
    /// Returns how many clients were removed.
    pub fn sweep(&self) -> usize {
        let window = self.policy().window;
        let now = self.clock.now();
        let before = self.ledger.len();
        self.ledger.retain(|_, timestamps| {
            prune(timestamps, now, window);
            !timestamps.is_empty()
        });
        before.saturating_sub(self.ledger.len())
    }

    /// Keep the ledger under `max_tracked_clients` before a new key is added.
    ///
    /// A full ledger is swept first. If that frees nothing, the stalest tenth
    /// of the clients is evicted in one pass, so the next batch of new keys
    /// inserts without scanning. The cap is soft under concurrent inserts of
    /// distinct new keys.
    fn make_room(&self, policy: &RateLimitPolicy) {
        let cap = policy.max_tracked_clients;
        if self.ledger.len() < cap {
            return;
        }

        self.sweep();
        let len = self.ledger.len();
        if len < cap || len == 0 {
            return;
        }

        let batch = (cap / EVICTION_DIVISOR).max(1).min(len);
        let mut candidates: Vec<(Option<Instant>, String)> = self
            .ledger
            .iter()
            .map(|entry| (entry.value().back().copied(), entry.key().clone()))
            .collect();
        candidates.select_nth_unstable_by_key(batch - 1, |(latest, _)| *latest);

        let mut evicted = 0;
        for (latest, key) in candidates.into_iter().take(batch) {
            // Skip clients that made a request since the scan.
            if self
                .ledger
                .remove_if(&key, |_, ts| ts.back().copied() == latest)
                .is_some()
            {
                evicted += 1;
            }
        }
        tracing::debug!(evicted, cap, "Rate limit ledger full, evicted stalest clients");
    }
}

/// Periodically sweep idle clients until shutdown is signalled.
pub fn spawn_sweeper(
    limiter: Arc<SlidingWindowLimiter>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = limiter.sweep();
                    let tracked = limiter.tracked_clients();
                    metrics::record_tracked_clients(tracked);
                    if removed > 0 {
                        tracing::debug!(removed, tracked, "Swept idle rate limit clients");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate limit sweeper stopping");
                    break;
                }
            }
        }
    })
}
