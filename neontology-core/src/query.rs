//! Engine-neutral parameterized Cypher.

use serde::Serialize;
use serde_json::Value;

use crate::error::{NeontologyError, Result};
use crate::value::{json_to_bolt, json_type_name, Properties};

/// Cypher text plus named parameters.
///
/// Parameters are held as JSON values so the same query can be sent to any
/// engine; [`Query::to_bolt`] converts it for `neo4rs`.
///
/// ```rust
/// # use neontology_core::query::Query;
/// let query = Query::new("MATCH (n:Person) WHERE n.age > $age RETURN n")
///     .param("age", 30);
/// assert_eq!(query.params["age"], 30);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Query {
    pub cypher: String,
    pub params: Properties,
}

impl Query {
    /// Create a new query from a Cypher string.
    pub fn new(cypher: impl Into<String>) -> Self {
        Query {
            cypher: cypher.into(),
            params: Properties::new(),
        }
    }

    /// Bind a named parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Bind every entry of a parameter map, replacing existing keys.
    pub fn params(mut self, params: Properties) -> Self {
        self.params.extend(params);
        self
    }

    /// Bind all fields of a serializable struct as named parameters.
    ///
    /// Fails when `source` does not serialize to a map.
    pub fn params_from(self, source: &impl Serialize) -> Result<Self> {
        match serde_json::to_value(source)? {
            Value::Object(map) => Ok(self.params(map)),
            other => Err(NeontologyError::type_mismatch("map", json_type_name(&other), "query parameters")),
        }
    }

    /// Build the `neo4rs` query.
    pub fn to_bolt(&self) -> neo4rs::Query {
        self.params
            .iter()
            .fold(neo4rs::query(&self.cypher), |q, (k, v)| q.param(k, json_to_bolt(v)))
    }

    /// Parameter names, for logging.
    pub fn param_keys(&self) -> Vec<&str> {
        self.params.keys().map(String::as_str).collect()
    }
}

impl From<&str> for Query {
    fn from(cypher: &str) -> Self {
        Query::new(cypher)
    }
}

impl From<String> for Query {
    fn from(cypher: String) -> Self {
        Query::new(cypher)
    }
}
