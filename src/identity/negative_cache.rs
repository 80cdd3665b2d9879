/// Negative cache - remembers client ids that recently failed to resolve
///
/// Unenrolled clients keep retrying until they enroll; without this cache
/// every one of those attempts would reach the key store. Each entry gets a
/// fixed deadline when it is inserted and lookups never extend it, so the
/// worst-case staleness for an id is exactly the configured TTL.
///
/// Storage is a bounded `moka` cache. Its own `time_to_live` evicts entries
/// in the background; the deadline stored as the value is what lookups
/// check, so expiry follows the runtime clock.
use crate::metrics;
use moka::{notification::RemovalCause, sync::Cache};
use prometheus::IntGauge;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::debug;

/// Default negative cache lifetime
pub const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(10);

/// Longest lifetime a negative entry may have
pub const MAX_NEGATIVE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default bound on the number of remembered ids
pub const DEFAULT_NEGATIVE_CAPACITY: u64 = 100_000;

/// Longest pause between two expiry sweeps
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Shortest pause between two expiry sweeps
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Lifetime policy for negative entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegativeCacheTtl {
    /// Nothing is ever cached; every lookup reaches the store
    Disabled,
    Enabled(Duration),
}

impl NegativeCacheTtl {
    /// Interpret a configured timeout in seconds: 0 selects the default,
    /// negative disables the cache. Lifetimes are capped at
    /// [`MAX_NEGATIVE_TTL`].
    pub fn from_seconds(seconds: i64) -> Self {
        match seconds {
            s if s < 0 => NegativeCacheTtl::Disabled,
            0 => NegativeCacheTtl::Enabled(DEFAULT_NEGATIVE_TTL),
            s => NegativeCacheTtl::Enabled(Duration::from_secs(s as u64)).capped(),
        }
    }

    fn capped(self) -> Self {
        match self {
            NegativeCacheTtl::Enabled(ttl) => NegativeCacheTtl::Enabled(ttl.min(MAX_NEGATIVE_TTL)),
            disabled => disabled,
        }
    }

    fn sweep_interval(&self) -> Option<Duration> {
        match self {
            NegativeCacheTtl::Disabled => None,
            NegativeCacheTtl::Enabled(ttl) => {
                Some((*ttl).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL))
            }
        }
    }
}

impl Default for NegativeCacheTtl {
    fn default() -> Self {
        NegativeCacheTtl::Enabled(DEFAULT_NEGATIVE_TTL)
    }
}

/// Time-bounded, size-bounded set of client ids with no resolvable key
pub struct NegativeCache {
    entries: Cache<String, Instant>,
    ttl: NegativeCacheTtl,
    size_gauge: IntGauge,
}

impl NegativeCache {
    /// Create a cache with passive expiry only
    pub fn new(ttl: NegativeCacheTtl) -> Self {
        Self::with_capacity(ttl, DEFAULT_NEGATIVE_CAPACITY)
    }

    /// Create a cache holding at most `max_capacity` ids
    pub fn with_capacity(ttl: NegativeCacheTtl, max_capacity: u64) -> Self {
        Self::build(ttl, max_capacity, metrics::NEGATIVE_CACHE_SIZE.clone())
    }

    /// `size_gauge` follows the number of stored entries
    pub(crate) fn build(ttl: NegativeCacheTtl, max_capacity: u64, size_gauge: IntGauge) -> Self {
        let ttl = ttl.capped();

        let evicted = size_gauge.clone();
        let mut builder = Cache::builder()
            .max_capacity(max_capacity)
            .eviction_listener(move |_id: Arc<String>, _deadline: Instant, cause| {
                if !matches!(cause, RemovalCause::Replaced) {
                    evicted.dec();
                }
            });
        if let NegativeCacheTtl::Enabled(lifetime) = ttl {
            builder = builder.time_to_live(lifetime);
        }

        Self {
            entries: builder.build(),
            ttl,
            size_gauge,
        }
    }

    /// Start the background sweep that drops expired entries.
    ///
    /// The sweep runs on `tracker` until `cancel` fires; on exit it clears
    /// the cache so nothing outlives the owning service.
    pub fn with_sweeper(self, tracker: &TaskTracker, cancel: CancellationToken) -> Self {
        let Some(period) = self.ttl.sweep_interval() else {
            return self;
        };

        let entries = self.entries.clone();
        tracker.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = purge_expired(&entries, Instant::now());
                        if removed > 0 {
                            debug!("Negative cache sweep removed {} entries", removed);
                        }
                    }
                }
            }

            entries.invalidate_all();
            entries.run_pending_tasks();
            debug!("Negative cache sweeper stopped");
        });

        self
    }

    pub fn is_enabled(&self) -> bool {
        self.ttl != NegativeCacheTtl::Disabled
    }

    /// True if `client_id` failed to resolve within the last TTL
    pub fn contains(&self, client_id: &str) -> bool {
        matches!(self.entries.get(client_id), Some(deadline) if deadline > Instant::now())
    }

    /// Record a failed lookup. A live entry keeps the deadline it already has.
    pub fn insert(&self, client_id: &str) {
        let NegativeCacheTtl::Enabled(ttl) = self.ttl else {
            return;
        };

        let now = Instant::now();
        let entry = self
            .entries
            .entry(client_id.to_string())
            .or_insert_with(|| now + ttl);

        if entry.is_fresh() {
            self.size_gauge.inc();
        } else if *entry.value() <= now {
            self.entries.insert(client_id.to_string(), now + ttl);
        }
    }

    /// Forget `client_id`. Returns whether an entry was present.
    pub fn remove(&self, client_id: &str) -> bool {
        self.entries.remove(client_id).is_some()
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.entries.run_pending_tasks();
        self.entries.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn purge_expired(entries: &Cache<String, Instant>, now: Instant) -> usize {
    let expired: Vec<Arc<String>> = entries
        .iter()
        .filter(|(_, deadline)| *deadline <= now)
        .map(|(id, _)| id)
        .collect();

    for id in &expired {
        entries.invalidate(id.as_str());
    }
    entries.run_pending_tasks();
    expired.len()
}
