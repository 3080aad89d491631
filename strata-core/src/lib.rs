//! Strata Core - Query Cache Primitives
//!
//! Pure building blocks shared by the orchestrator and its collaborators:
//! cache key derivation, TTL resolution, payload sanitization, configuration,
//! and the error taxonomy. Nothing in this crate performs I/O except config
//! file loading.

pub mod config;
pub mod error;
pub mod key;
pub mod query;
pub mod sanitize;
pub mod ttl;

pub use config::{CacheConfig, PopulateMode};
pub use error::{ConfigError, SourceError, StoreError, StrataError, StrataResult};
pub use key::{derive_key, CacheKey};
pub use query::Query;
pub use sanitize::{Sanitizer, RESERVED_PREFIX};
pub use ttl::{tier_default, TtlOverride, DEFAULT_TIER_TTL};

/// Structured query result as returned by a data source.
pub type QueryResult = serde_json::Value;
