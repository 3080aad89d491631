//! Query type: a statement plus its ordered, typed parameters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::key::{derive_key, CacheKey};

/// A query issued against the data source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Query {
    statement: String,
    #[serde(default)]
    parameters: Vec<Value>,
}

impl Query {
    /// Create a query with no bound parameters.
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            parameters: Vec::new(),
        }
    }

    /// Create a query with bound parameters.
    pub fn with_params<I, V>(statement: impl Into<String>, parameters: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            statement: statement.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
        }
    }

    /// Bind one more positional parameter.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.parameters.push(value.into());
        self
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    /// Derive this query's cache key.
    pub fn cache_key(&self) -> CacheKey {
        derive_key(&self.statement, &self.parameters)
    }
}
