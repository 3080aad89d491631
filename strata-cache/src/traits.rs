//! Collaborator contracts: the authoritative data source and the cache tiers.
//!
//! Neither is implemented here. Applications supply their own source (a
//! database client, an HTTP API) and their own stores (in-process memory,
//! disk, a remote key-value service) and hand them to the orchestrator.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use strata_core::{CacheKey, QueryResult, SourceError, StoreError};

/// The authoritative data source behind the cache.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Run a statement with its bound parameters.
    ///
    /// Any failure is propagated verbatim to the caller of `execute`.
    async fn query(
        &self,
        statement: &str,
        parameters: &[Value],
    ) -> Result<QueryResult, SourceError>;

    /// Field names that must never be persisted to any tier.
    fn uncacheable_properties(&self) -> Vec<String> {
        Vec::new()
    }
}

/// One cache tier.
///
/// Values cross this boundary as JSON text. Implementations own expiry:
/// the orchestrator only passes the lifetime on `set`.
///
/// # Failure semantics
///
/// Errors from `get` are treated as a miss on this tier and errors from `set`
/// are logged and dropped. Neither reaches the caller.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Stable label reported as `servedBy` on a hit.
    fn name(&self) -> &str;

    /// Fetch a cached payload. `Ok(None)` is a miss.
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, StoreError>;

    /// Store a payload for `ttl`.
    async fn set(&self, key: &CacheKey, ttl: Duration, value: &str) -> Result<(), StoreError>;

    /// This tier's default lifetime. `None` (or zero) falls back to the
    /// orchestrator's default.
    fn ttl(&self) -> Option<Duration> {
        None
    }

    /// Extra field names excluded from payloads written to this tier only.
    fn uncacheable_properties(&self) -> Vec<String> {
        Vec::new()
    }
}
