//! Time-to-live overrides and per-call TTL resolution.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifetime used for a tier that declares no TTL of its own.
pub const DEFAULT_TIER_TTL: Duration = Duration::from_secs(30);

/// Per-call TTL override.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlOverride {
    /// Every tier keeps its configured default.
    #[default]
    Default,
    /// One lifetime for every tier.
    All(Duration),
    /// Positional lifetimes. Tiers past the end keep their defaults; extra
    /// entries are ignored.
    PerTier(Vec<Duration>),
}

impl TtlOverride {
    pub fn all(ttl: Duration) -> Self {
        Self::All(ttl)
    }

    pub fn per_tier(ttls: impl IntoIterator<Item = Duration>) -> Self {
        Self::PerTier(ttls.into_iter().collect())
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }

    /// Resolve the effective TTL table for one call.
    ///
    /// Always returns a new table with one entry per configured default; the
    /// defaults themselves are never touched. A zero scalar override counts
    /// as no override.
    pub fn resolve(&self, defaults: &[Duration]) -> Vec<Duration> {
        match self {
            Self::Default => defaults.to_vec(),
            Self::All(ttl) if ttl.is_zero() => defaults.to_vec(),
            Self::All(ttl) => vec![*ttl; defaults.len()],
            Self::PerTier(ttls) => defaults
                .iter()
                .enumerate()
                .map(|(i, default)| ttls.get(i).copied().unwrap_or(*default))
                .collect(),
        }
    }
}

impl From<Duration> for TtlOverride {
    fn from(ttl: Duration) -> Self {
        Self::All(ttl)
    }
}

impl From<Vec<Duration>> for TtlOverride {
    fn from(ttls: Vec<Duration>) -> Self {
        Self::PerTier(ttls)
    }
}

impl From<Option<Duration>> for TtlOverride {
    fn from(ttl: Option<Duration>) -> Self {
        ttl.map(Self::All).unwrap_or_default()
    }
}

/// Resolve a tier's configured default: its declared TTL, or `fallback` when
/// it declares none (or declares zero).
pub fn tier_default(declared: Option<Duration>, fallback: Duration) -> Duration {
    declared.filter(|ttl| !ttl.is_zero()).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_default_keeps_tier_defaults() {
        let defaults = [secs(30), secs(60)];
        assert_eq!(TtlOverride::Default.resolve(&defaults), vec![secs(30), secs(60)]);
    }

    #[test]
    fn test_scalar_applies_to_every_tier() {
        let defaults = [secs(30), secs(60), secs(90)];
        assert_eq!(
            TtlOverride::all(secs(5)).resolve(&defaults),
            vec![secs(5), secs(5), secs(5)]
        );
    }

    #[test]
    fn test_zero_scalar_is_ignored() {
        let defaults = [secs(30), secs(60)];
        assert_eq!(
            TtlOverride::all(Duration::ZERO).resolve(&defaults),
            defaults.to_vec()
        );
    }

    #[test]
    fn test_short_sequence_leaves_trailing_defaults() {
        let defaults = [secs(30), secs(60)];
        assert_eq!(
            TtlOverride::per_tier([secs(10)]).resolve(&defaults),
            vec![secs(10), secs(60)]
        );
    }

    #[test]
    fn test_long_sequence_is_truncated() {
        let defaults = [secs(30)];
        assert_eq!(
            TtlOverride::per_tier([secs(1), secs(2), secs(3)]).resolve(&defaults),
            vec![secs(1)]
        );
    }

    #[test]
    fn test_resolve_with_no_tiers_is_empty() {
        assert!(TtlOverride::all(secs(1)).resolve(&[]).is_empty());
        assert!(TtlOverride::per_tier([secs(1)]).resolve(&[]).is_empty());
    }

    #[test]
    fn test_resolve_does_not_mutate_defaults() {
        let defaults = vec![secs(30), secs(60)];
        let _ = TtlOverride::per_tier([secs(1), secs(2)]).resolve(&defaults);
        let _ = TtlOverride::all(secs(7)).resolve(&defaults);
        assert_eq!(defaults, vec![secs(30), secs(60)]);
    }

    #[test]
    fn test_tier_default_fallback() {
        assert_eq!(tier_default(None, DEFAULT_TIER_TTL), secs(30));
        assert_eq!(tier_default(Some(Duration::ZERO), DEFAULT_TIER_TTL), secs(30));
        assert_eq!(tier_default(Some(secs(120)), DEFAULT_TIER_TTL), secs(120));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(TtlOverride::from(secs(3)), TtlOverride::All(secs(3)));
        assert_eq!(
            TtlOverride::from(vec![secs(3)]),
            TtlOverride::PerTier(vec![secs(3)])
        );
        assert!(TtlOverride::from(None::<Duration>).is_default());
    }
}
