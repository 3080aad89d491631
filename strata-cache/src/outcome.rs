//! Query outcomes annotated with the tier that served them.

use serde::de::DeserializeOwned;
use std::fmt;
use strata_core::QueryResult;

/// Label reported when the authoritative source served a query.
pub const SOURCE_LABEL: &str = "source";

/// Where a query's result came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServedBy {
    /// A cache tier hit, by configured position and name.
    Tier { index: usize, name: String },
    /// Full miss (or no tiers): the data source answered.
    Source,
}

impl ServedBy {
    /// The tier name, or `"source"`.
    pub fn label(&self) -> &str {
        match self {
            Self::Tier { name, .. } => name,
            Self::Source => SOURCE_LABEL,
        }
    }

    pub fn is_cache_hit(&self) -> bool {
        matches!(self, Self::Tier { .. })
    }

    pub fn tier_index(&self) -> Option<usize> {
        match self {
            Self::Tier { index, .. } => Some(*index),
            Self::Source => None,
        }
    }
}

impl fmt::Display for ServedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of `execute`: the value plus its provenance.
///
/// On a cache hit the value is the sanitized copy that was stored; on a
/// source answer it is the original, unsanitized result.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    value: QueryResult,
    served_by: ServedBy,
}

impl QueryOutcome {
    pub fn from_tier(value: QueryResult, index: usize, name: impl Into<String>) -> Self {
        Self {
            value,
            served_by: ServedBy::Tier {
                index,
                name: name.into(),
            },
        }
    }

    pub fn from_source(value: QueryResult) -> Self {
        Self {
            value,
            served_by: ServedBy::Source,
        }
    }

    pub fn value(&self) -> &QueryResult {
        &self.value
    }

    pub fn served_by(&self) -> &ServedBy {
        &self.served_by
    }

    pub fn was_cache_hit(&self) -> bool {
        self.served_by.is_cache_hit()
    }

    pub fn into_value(self) -> QueryResult {
        self.value
    }

    pub fn into_parts(self) -> (QueryResult, ServedBy) {
        (self.value, self.served_by)
    }

    /// Deserialize the value into a concrete type.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_labels() {
        let tier = ServedBy::Tier {
            index: 1,
            name: "redis".to_string(),
        };
        assert_eq!(tier.label(), "redis");
        assert_eq!(tier.to_string(), "redis");
        assert_eq!(tier.tier_index(), Some(1));
        assert_eq!(ServedBy::Source.label(), "source");
        assert_eq!(ServedBy::Source.tier_index(), None);
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = QueryOutcome::from_tier(json!({"id": 1}), 0, "memory");
        assert!(outcome.was_cache_hit());
        assert_eq!(outcome.served_by().label(), "memory");

        let (value, served_by) = QueryOutcome::from_source(json!([1, 2])).into_parts();
        assert_eq!(value, json!([1, 2]));
        assert_eq!(served_by, ServedBy::Source);
    }

    #[test]
    fn test_deserialize_into_type() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct User {
            id: u32,
            name: String,
        }

        let outcome = QueryOutcome::from_source(json!({"id": 7, "name": "ada"}));
        let user: User = outcome.deserialize().unwrap();
        assert_eq!(
            user,
            User {
                id: 7,
                name: "ada".to_string()
            }
        );
    }
}
