//! Strata Test Utilities
//!
//! Shared test infrastructure for the Strata workspace:
//! - Recording mock data source
//! - Recording mock cache tier with injectable failures
//! - Proptest generators for query parameters and results

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

// Re-export core types for convenience
pub use strata_cache::{CacheStore, DataSource, QueryOutcome, ServedBy, TieredCache};
pub use strata_core::{
    CacheConfig, CacheKey, PopulateMode, Query, SourceError, StoreError, StrataError,
    TtlOverride,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// MOCK DATA SOURCE
// ============================================================================

/// A recorded source call.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceCall {
    pub statement: String,
    pub parameters: Vec<Value>,
}

/// Mock data source returning a fixed result (or a fixed failure).
#[derive(Debug, Default)]
pub struct MockSource {
    result: Mutex<Value>,
    failure: Mutex<Option<String>>,
    uncacheable: Vec<String>,
    calls: Mutex<Vec<SourceCall>>,
}

impl MockSource {
    pub fn returning(result: Value) -> Self {
        Self {
            result: Mutex::new(result),
            ..Default::default()
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Mutex::new(Some(message.into())),
            ..Default::default()
        }
    }

    pub fn with_uncacheable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uncacheable = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn set_result(&self, result: Value) {
        *lock(&self.result) = result;
    }

    pub fn set_failure(&self, message: Option<String>) {
        *lock(&self.failure) = message;
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl DataSource for MockSource {
    async fn query(&self, statement: &str, parameters: &[Value]) -> Result<Value, SourceError> {
        lock(&self.calls).push(SourceCall {
            statement: statement.to_string(),
            parameters: parameters.to_vec(),
        });

        if let Some(message) = lock(&self.failure).clone() {
            return Err(SourceError::new(message));
        }
        Ok(lock(&self.result).clone())
    }

    fn uncacheable_properties(&self) -> Vec<String> {
        self.uncacheable.clone()
    }
}

// ============================================================================
// MOCK CACHE TIER
// ============================================================================

/// A recorded tier write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCall {
    pub key: CacheKey,
    pub ttl: Duration,
    pub value: String,
}

/// In-memory cache tier that records every call.
///
/// Reads and writes can be made to fail, and writes can be delayed, to
/// exercise the fail-open paths.
#[derive(Debug, Default)]
pub struct MockStore {
    name: String,
    ttl: Option<Duration>,
    uncacheable: Vec<String>,
    entries: Mutex<HashMap<CacheKey, String>>,
    get_calls: Mutex<Vec<CacheKey>>,
    set_calls: Mutex<Vec<SetCall>>,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
    hang_set: AtomicBool,
    set_delay_ms: AtomicU64,
    writes: Notify,
}

impl MockStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_uncacheable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uncacheable = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn failing_reads(self) -> Self {
        self.fail_get.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_writes(self) -> Self {
        self.fail_set.store(true, Ordering::SeqCst);
        self
    }

    /// Make every `set` pend forever, like a store behind a dead connection.
    pub fn hanging_writes(self) -> Self {
        self.hang_set.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_write_delay(self, delay: Duration) -> Self {
        self.set_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
        self
    }

    /// Seed an entry directly, bypassing call recording.
    pub fn seed(&self, key: &CacheKey, value: impl Into<String>) {
        lock(&self.entries).insert(key.clone(), value.into());
    }

    pub fn entry(&self, key: &CacheKey) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    /// Decoded entry for `key`.
    pub fn entry_json(&self, key: &CacheKey) -> Option<Value> {
        self.entry(key)
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    pub fn get_calls(&self) -> Vec<CacheKey> {
        lock(&self.get_calls).clone()
    }

    pub fn set_calls(&self) -> Vec<SetCall> {
        lock(&self.set_calls).clone()
    }

    /// Wait until at least `count` writes were attempted, or `timeout` elapses.
    /// Returns whether the count was reached.
    pub async fn wait_for_writes(&self, count: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.writes.notified();
                if lock(&self.set_calls).len() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }
}

#[async_trait]
impl CacheStore for MockStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<String>, StoreError> {
        lock(&self.get_calls).push(key.clone());
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(StoreError::read_failed(&self.name, "injected read failure"));
        }
        Ok(self.entry(key))
    }

    async fn set(&self, key: &CacheKey, ttl: Duration, value: &str) -> Result<(), StoreError> {
        if self.hang_set.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let delay = self.set_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        lock(&self.set_calls).push(SetCall {
            key: key.clone(),
            ttl,
            value: value.to_string(),
        });

        let result = if self.fail_set.load(Ordering::SeqCst) {
            Err(StoreError::write_failed(&self.name, "injected write failure"))
        } else {
            lock(&self.entries).insert(key.clone(), value.to_string());
            Ok(())
        };

        self.writes.notify_waiters();
        result
    }

    fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn uncacheable_properties(&self) -> Vec<String> {
        self.uncacheable.clone()
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Build a cache over shared mocks with the given config.
pub fn cache_with(
    source: &Arc<MockSource>,
    stores: &[Arc<MockStore>],
    config: CacheConfig,
) -> TieredCache {
    TieredCache::builder()
        .shared_source(Arc::clone(source) as Arc<dyn DataSource>)
        .stores(stores.iter().map(|s| Arc::clone(s) as Arc<dyn CacheStore>))
        .config(config)
        .build()
        .expect("mock cache config is valid")
}

/// Build a cache over shared mocks with default config.
///
/// Population runs in the background, so tests asserting on writes should
/// `wait_for_writes` or use [`cache_awaited`].
pub fn cache_over(source: &Arc<MockSource>, stores: &[Arc<MockStore>]) -> TieredCache {
    cache_with(source, stores, CacheConfig::default())
}

/// Build a cache whose writes have settled by the time `execute` returns.
pub fn cache_awaited(source: &Arc<MockSource>, stores: &[Arc<MockStore>]) -> TieredCache {
    cache_with(
        source,
        stores,
        CacheConfig::new().with_populate(PopulateMode::Awaited),
    )
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    use proptest::prelude::*;
    use serde_json::Value;

    /// Scalar JSON values.
    pub fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[a-zA-Z0-9 _]{0,12}".prop_map(Value::String),
        ]
    }

    /// Nested JSON values with field names that sometimes carry the reserved prefix.
    pub fn arb_json() -> impl Strategy<Value = Value> {
        arb_scalar().prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("_?[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    /// Bound parameter lists.
    pub fn arb_params() -> impl Strategy<Value = Vec<Value>> {
        prop::collection::vec(arb_json(), 0..5)
    }

    /// Statement text.
    pub fn arb_statement() -> impl Strategy<Value = String> {
        "SELECT [a-z_, *]{1,20} FROM [a-z_]{1,10}( WHERE [a-z]{1,5} = \\?)?"
    }
}
