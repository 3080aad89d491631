//! Configuration types
//!
//! [`CacheConfig`] holds the orchestrator-wide settings. Tiers and the data
//! source are supplied by the application; only policy lives here.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::sanitize::{Sanitizer, RESERVED_PREFIX};
use crate::ttl::DEFAULT_TIER_TTL;

/// How freshly computed results are written to the tiers after a full miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulateMode {
    /// Spawn the writes onto the current Tokio runtime and return at once.
    /// A hung tier never delays the caller.
    #[default]
    Background,
    /// Issue all writes concurrently and wait for them to settle before
    /// returning. Write outcomes never affect the result, but a tier whose
    /// `set` never completes holds the call open.
    Awaited,
}

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CacheConfig {
    /// TTL for tiers that declare none.
    #[serde(rename = "default_ttl_ms", with = "duration_millis")]
    pub default_ttl: Duration,
    /// Field-name prefix that is never cached. Empty disables the filter.
    pub reserved_prefix: String,
    /// Extra field names excluded from every cached payload.
    pub uncacheable_properties: Vec<String>,
    pub populate: PopulateMode,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TIER_TTL,
            reserved_prefix: RESERVED_PREFIX.to_string(),
            uncacheable_properties: Vec::new(),
            populate: PopulateMode::default(),
        }
    }
}

impl CacheConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback TTL for tiers without one.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the reserved field prefix.
    pub fn with_reserved_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.reserved_prefix = prefix.into();
        self
    }

    /// Add field names excluded from every cached payload.
    pub fn with_uncacheable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uncacheable_properties
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Set the populate mode.
    pub fn with_populate(mut self, mode: PopulateMode) -> Self {
        self.populate = mode;
        self
    }

    /// Parse a config from TOML text and validate it.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: CacheConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file and validate it.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - default_ttl > 0
    /// - reserved_prefix contains no whitespace
    /// - uncacheable_properties entries are non-empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "default_ttl_ms".to_string(),
                value: format!("{:?}", self.default_ttl),
                reason: "default_ttl must be positive".to_string(),
            });
        }

        if self.reserved_prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue {
                field: "reserved_prefix".to_string(),
                value: self.reserved_prefix.clone(),
                reason: "reserved_prefix must not contain whitespace".to_string(),
            });
        }

        if let Some(pos) = self.uncacheable_properties.iter().position(|f| f.is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: format!("uncacheable_properties[{}]", pos),
                value: String::new(),
                reason: "field names must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Build the base sanitizer for this config plus the source's declared
    /// uncacheable fields.
    pub fn sanitizer<I, S>(&self, source_uncacheable: I) -> Sanitizer
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Sanitizer::new(self.reserved_prefix.clone())
            .with_excluded(self.uncacheable_properties.iter().cloned())
            .with_excluded(source_uncacheable)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
