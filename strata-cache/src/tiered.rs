//! Tiered read-through cache.
//!
//! This module implements the lookup-and-populate protocol: derive the key,
//! probe the tiers in order, fall back to the source on a full miss, then
//! write the sanitized result to every tier with its resolved TTL.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::Value;
use strata_core::{
    tier_default, CacheConfig, CacheKey, ConfigError, PopulateMode, Query, QueryResult,
    Sanitizer, StoreError, StrataError, StrataResult, TtlOverride,
};

use crate::metrics::{CacheMetrics, CacheStats};
use crate::outcome::QueryOutcome;
use crate::traits::{CacheStore, DataSource};

/// One configured tier with its resolved defaults.
struct Tier {
    store: Arc<dyn CacheStore>,
    /// Set only when the store declares extra uncacheable fields.
    sanitizer: Option<Sanitizer>,
}

struct Inner {
    source: Arc<dyn DataSource>,
    tiers: Vec<Tier>,
    /// Configured default TTL per tier. Read-only after construction.
    default_ttls: Vec<Duration>,
    sanitizer: Sanitizer,
    config: CacheConfig,
    metrics: CacheMetrics,
}

/// A pending write of one payload to one tier.
struct TierWrite {
    index: usize,
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    payload: Arc<str>,
}

/// Tiered read-through cache in front of a single data source.
///
/// Cloning is cheap and clones share tiers, configuration and metrics.
///
/// # Example
///
/// ```ignore
/// let cache = TieredCache::builder()
///     .source(db)
///     .store(memory)
///     .store(redis)
///     .build()?;
///
/// let outcome = cache
///     .query("SELECT * FROM users WHERE id = ?")
///     .bind(42)
///     .ttls([Duration::from_secs(10)])
///     .execute()
///     .await?;
///
/// tracing::info!(served_by = %outcome.served_by(), "user loaded");
/// ```
#[derive(Clone)]
pub struct TieredCache {
    inner: Arc<Inner>,
}

impl TieredCache {
    /// Create a cache with default configuration.
    pub fn new(source: Arc<dyn DataSource>, stores: Vec<Arc<dyn CacheStore>>) -> Self {
        Self::from_parts(source, stores, CacheConfig::default())
    }

    /// Create a cache with an explicit configuration.
    pub fn with_config(
        source: Arc<dyn DataSource>,
        stores: Vec<Arc<dyn CacheStore>>,
        config: CacheConfig,
    ) -> StrataResult<Self> {
        config.validate()?;
        Ok(Self::from_parts(source, stores, config))
    }

    pub fn builder() -> TieredCacheBuilder {
        TieredCacheBuilder::default()
    }

    fn from_parts(
        source: Arc<dyn DataSource>,
        stores: Vec<Arc<dyn CacheStore>>,
        config: CacheConfig,
    ) -> Self {
        let sanitizer = config.sanitizer(source.uncacheable_properties());

        let default_ttls: Vec<Duration> = stores
            .iter()
            .map(|store| tier_default(store.ttl(), config.default_ttl))
            .collect();

        let tiers: Vec<Tier> = stores
            .into_iter()
            .map(|store| {
                let extra = store.uncacheable_properties();
                let sanitizer = (!extra.is_empty()).then(|| sanitizer.extended(extra));
                Tier { store, sanitizer }
            })
            .collect();

        let metrics = CacheMetrics::new(tiers.len());

        Self {
            inner: Arc::new(Inner {
                source,
                tiers,
                default_ttls,
                sanitizer,
                config,
                metrics,
            }),
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Tier names in probe order.
    pub fn tier_names(&self) -> Vec<&str> {
        self.inner.tiers.iter().map(|t| t.store.name()).collect()
    }

    /// Configured default TTL per tier, in probe order.
    pub fn default_ttls(&self) -> &[Duration] {
        &self.inner.default_ttls
    }

    /// Resolve the TTL table a call with `ttl_override` would use.
    pub fn effective_ttls(&self, ttl_override: &TtlOverride) -> Vec<Duration> {
        ttl_override.resolve(&self.inner.default_ttls)
    }

    /// The cache key a query is stored under.
    pub fn key_for(&self, query: &Query) -> CacheKey {
        query.cache_key()
    }

    /// Snapshot of hit/miss/failure counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.metrics.snapshot()
    }

    /// Start building a query against this cache.
    pub fn query(&self, statement: impl Into<String>) -> QueryBuilder<'_> {
        QueryBuilder {
            cache: self,
            query: Query::new(statement),
            ttl: TtlOverride::Default,
        }
    }

    /// Execute a query through the tiers.
    ///
    /// Returns the first tier hit, or the source's result once population of
    /// every tier has been started. Only a source failure is returned as an
    /// error; tier failures are logged and treated as misses.
    pub async fn execute(
        &self,
        query: &Query,
        ttl_override: &TtlOverride,
    ) -> StrataResult<QueryOutcome> {
        if self.inner.tiers.is_empty() {
            self.inner.metrics.record_miss();
            let value = self.query_source(query).await?;
            return Ok(QueryOutcome::from_source(value));
        }

        let key = query.cache_key();
        let ttls = self.effective_ttls(ttl_override);

        if let Some(hit) = self.probe(&key).await {
            return Ok(hit);
        }

        self.inner.metrics.record_miss();
        tracing::debug!(key = %key, "All cache tiers missed, querying source");

        let value = self.query_source(query).await?;
        self.populate(&key, &ttls, &value).await;

        Ok(QueryOutcome::from_source(value))
    }

    /// Probe tiers in order and return the first decodable hit.
    async fn probe(&self, key: &CacheKey) -> Option<QueryOutcome> {
        for (index, tier) in self.inner.tiers.iter().enumerate() {
            let name = tier.store.name();

            match tier.store.get(key).await {
                Ok(Some(raw)) if !raw.is_empty() => match serde_json::from_str::<Value>(&raw) {
                    Ok(value) => {
                        self.inner.metrics.record_hit(index);
                        tracing::debug!(tier = name, index, key = %key, "Cache hit");
                        return Some(QueryOutcome::from_tier(value, index, name));
                    }
                    Err(e) => {
                        self.inner.metrics.record_read_failure();
                        let err = StoreError::Decode {
                            tier: name.to_string(),
                            reason: e.to_string(),
                        };
                        tracing::warn!(
                            tier = name,
                            key = %key,
                            error = %err,
                            "Discarding cached payload"
                        );
                    }
                },
                Ok(_) => {
                    tracing::debug!(tier = name, key = %key, "Cache tier miss");
                }
                Err(e) => {
                    self.inner.metrics.record_read_failure();
                    tracing::warn!(
                        tier = name,
                        key = %key,
                        error = %e,
                        "Cache tier read failed, treating as miss"
                    );
                }
            }
        }

        None
    }

    async fn query_source(&self, query: &Query) -> StrataResult<QueryResult> {
        match self
            .inner
            .source
            .query(query.statement(), query.parameters())
            .await
        {
            Ok(value) => Ok(value),
            Err(e) => {
                self.inner.metrics.record_source_error();
                tracing::warn!(error = %e, "Source query failed");
                Err(StrataError::Source(e))
            }
        }
    }

    /// Build one write per tier. Tiers without their own exclusions share
    /// the base payload.
    fn plan_writes(&self, ttls: &[Duration], value: &QueryResult) -> Vec<TierWrite> {
        let base = match self.inner.sanitizer.to_payload(value) {
            Ok(payload) => Arc::<str>::from(payload),
            Err(e) => {
                let err = StoreError::Encode {
                    reason: e.to_string(),
                };
                tracing::warn!(error = %err, "Skipping cache population");
                return Vec::new();
            }
        };

        let mut writes = Vec::with_capacity(self.inner.tiers.len());
        for (index, (tier, ttl)) in self.inner.tiers.iter().zip(ttls).enumerate() {
            let payload = match &tier.sanitizer {
                None => Arc::clone(&base),
                Some(sanitizer) => match sanitizer.to_payload(value) {
                    Ok(payload) => Arc::from(payload),
                    Err(e) => {
                        self.inner.metrics.record_write_failure();
                        tracing::warn!(
                            tier = tier.store.name(),
                            error = %e,
                            "Skipping tier population"
                        );
                        continue;
                    }
                },
            };

            writes.push(TierWrite {
                index,
                store: Arc::clone(&tier.store),
                ttl: *ttl,
                payload,
            });
        }
        writes
    }

    /// Write the result to every tier. Failures are isolated per tier.
    ///
    /// In the default background mode the writes are detached and this
    /// returns without waiting on any tier.
    async fn populate(&self, key: &CacheKey, ttls: &[Duration], value: &QueryResult) {
        let writes: Vec<_> = self
            .plan_writes(ttls, value)
            .into_iter()
            .map(|write| {
                let inner = Arc::clone(&self.inner);
                let key = key.clone();
                async move {
                    let name = write.store.name();
                    match write.store.set(&key, write.ttl, &write.payload).await {
                        Ok(()) => {
                            tracing::debug!(
                                tier = name,
                                index = write.index,
                                key = %key,
                                ttl_ms = write.ttl.as_millis() as u64,
                                "Cache tier populated"
                            );
                        }
                        Err(e) => {
                            inner.metrics.record_write_failure();
                            tracing::warn!(
                                tier = name,
                                index = write.index,
                                key = %key,
                                error = %e,
                                "Cache tier write failed"
                            );
                        }
                    }
                }
            })
            .collect();

        match self.inner.config.populate {
            PopulateMode::Background => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        join_all(writes).await;
                    });
                }
                Err(_) => {
                    tracing::debug!("No Tokio runtime for background populate, writing inline");
                    join_all(writes).await;
                }
            },
            PopulateMode::Awaited => {
                join_all(writes).await;
            }
        }
    }
}

impl fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredCache")
            .field("tiers", &self.tier_names())
            .field("default_ttls", &self.inner.default_ttls)
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Builder for [`TieredCache`].
#[derive(Default)]
pub struct TieredCacheBuilder {
    source: Option<Arc<dyn DataSource>>,
    stores: Vec<Arc<dyn CacheStore>>,
    config: CacheConfig,
}

impl TieredCacheBuilder {
    /// Set the authoritative data source.
    pub fn source<S: DataSource + 'static>(mut self, source: S) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Set a shared data source.
    pub fn shared_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Append a tier. Tiers are probed in the order they are added.
    pub fn store<T: CacheStore + 'static>(mut self, store: T) -> Self {
        self.stores.push(Arc::new(store));
        self
    }

    /// Append a shared tier.
    pub fn shared_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.stores.push(store);
        self
    }

    /// Append several shared tiers.
    pub fn stores<I>(mut self, stores: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn CacheStore>>,
    {
        self.stores.extend(stores);
        self
    }

    /// Set the configuration.
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the cache. Fails if no source was set or the config is invalid.
    pub fn build(self) -> StrataResult<TieredCache> {
        let source = self.source.ok_or(ConfigError::MissingSource)?;
        TieredCache::with_config(source, self.stores, self.config)
    }
}

/// Fluent per-call surface: `cache.query(stmt).bind(..).ttl(..).execute()`.
pub struct QueryBuilder<'a> {
    cache: &'a TieredCache,
    query: Query,
    ttl: TtlOverride,
}

impl QueryBuilder<'_> {
    /// Bind one more positional parameter.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.query = self.query.bind(value);
        self
    }

    /// Bind several positional parameters.
    pub fn params<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        for value in values {
            self.query = self.query.bind(value);
        }
        self
    }

    /// Use one TTL for every tier.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = TtlOverride::All(ttl);
        self
    }

    /// Use positional TTLs, one per tier.
    pub fn ttls(mut self, ttls: impl IntoIterator<Item = Duration>) -> Self {
        self.ttl = TtlOverride::per_tier(ttls);
        self
    }

    pub fn ttl_override(mut self, ttl: TtlOverride) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn as_query(&self) -> &Query {
        &self.query
    }

    pub async fn execute(self) -> StrataResult<QueryOutcome> {
        self.cache.execute(&self.query, &self.ttl).await
    }
}
