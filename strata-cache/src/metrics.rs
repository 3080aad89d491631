//! Lock-free counters for cache activity.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one orchestrator. Shared across concurrent calls.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Hits, indexed by tier position.
    tier_hits: Vec<AtomicU64>,
    /// Calls that fell through every tier (or had no tiers).
    misses: AtomicU64,
    /// Source queries that failed.
    source_errors: AtomicU64,
    /// Tier reads that failed or returned an undecodable payload.
    read_failures: AtomicU64,
    /// Tier writes that failed.
    write_failures: AtomicU64,
}

impl CacheMetrics {
    pub fn new(tiers: usize) -> Self {
        Self {
            tier_hits: (0..tiers).map(|_| AtomicU64::new(0)).collect(),
            ..Default::default()
        }
    }

    pub fn record_hit(&self, tier: usize) {
        if let Some(counter) = self.tier_hits.get(tier) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_source_error(&self) {
        self.source_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_failure(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of all counters.
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            tier_hits: self
                .tier_hits
                .iter()
                .map(|c| c.load(Ordering::Relaxed))
                .collect(),
            misses: self.misses.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of cache metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub tier_hits: Vec<u64>,
    pub misses: u64,
    pub source_errors: u64,
    pub read_failures: u64,
    pub write_failures: u64,
}

impl CacheStats {
    /// Total hits across all tiers.
    pub fn hits(&self) -> u64 {
        self.tier_hits.iter().sum()
    }

    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
