//! Strata Cache - Tiered Read-Through Query Cache
//!
//! Sits in front of one authoritative [`DataSource`] and an ordered list of
//! [`CacheStore`] tiers. A query probes the tiers in order and returns the
//! first hit; a full miss queries the source, strips uncacheable fields from
//! a copy of the result, and writes that copy to every tier with a per-tier
//! TTL.
//!
//! Tiers are an optimization, never a correctness dependency: a failing or
//! unreachable tier is skipped on read and ignored on write, and only source
//! failures reach the caller.

pub mod metrics;
pub mod outcome;
pub mod tiered;
pub mod traits;

pub use metrics::{CacheMetrics, CacheStats};
pub use outcome::{QueryOutcome, ServedBy, SOURCE_LABEL};
pub use tiered::{QueryBuilder, TieredCache, TieredCacheBuilder};
pub use traits::{CacheStore, DataSource};

// Re-export core types for convenience
pub use strata_core::{
    derive_key, CacheConfig, CacheKey, ConfigError, PopulateMode, Query, QueryResult,
    Sanitizer, SourceError, StoreError, StrataError, StrataResult, TtlOverride, DEFAULT_TIER_TTL,
};
