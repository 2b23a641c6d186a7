//! Queries anchored on one node.
//!
//! A [`RelatedQuery`] is Cypher containing the `#ThisNode` placeholder, which
//! is replaced by a pattern binding `ThisNode` to the node the query is run
//! for. The `#[related_nodes]` and `#[related_property]` attributes turn a
//! method returning a `RelatedQuery` into an async method that runs it
//! through these helpers:
//!
//! ```rust,ignore
//! impl Person {
//!     #[related_nodes(Person)]
//!     fn followers(&self) -> RelatedQuery {
//!         RelatedQuery::new("MATCH #ThisNode<-[:FOLLOWS]-(o) RETURN o")
//!     }
//!
//!     #[related_property(i64)]
//!     fn follower_count(&self, min_age: i64) -> RelatedQuery {
//!         RelatedQuery::new("MATCH #ThisNode<-[:FOLLOWS]-(o) WHERE o.age >= $min_age RETURN count(o)")
//!             .param("min_age", min_age)
//!     }
//! }
//!
//! let followers: Vec<Person> = alice.followers(&graph).await?;
//! ```

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use neontology_core::cypher::{substitute_this_node, THIS_NODE_PARAM};
use neontology_core::{GraphNode, NodeType, Properties, Query, Result};

use crate::connection::GraphConnection;

/// Cypher with a `#ThisNode` placeholder and optional extra parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelatedQuery {
    pub cypher: String,
    pub params: Option<Properties>,
}

impl RelatedQuery {
    pub fn new(cypher: impl Into<String>) -> Self {
        RelatedQuery {
            cypher: cypher.into(),
            params: None,
        }
    }

    pub fn with_params(cypher: impl Into<String>, params: Properties) -> Self {
        RelatedQuery {
            cypher: cypher.into(),
            params: Some(params),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.get_or_insert_with(Properties::new).insert(key.into(), value.into());
        self
    }

    /// The executable query for `node`. The placeholder's parameter is
    /// bound last and wins over a caller parameter of the same name.
    pub fn to_query<N: NodeType>(&self, node: &N) -> Result<Query> {
        let cypher = substitute_this_node(&self.cypher, N::PRIMARY_LABEL, N::PRIMARY_PROPERTY);
        Ok(Query::new(cypher)
            .params(self.params.clone().unwrap_or_default())
            .param(THIS_NODE_PARAM, node.primary_value()?))
    }
}

impl From<&str> for RelatedQuery {
    fn from(cypher: &str) -> Self {
        RelatedQuery::new(cypher)
    }
}

impl From<String> for RelatedQuery {
    fn from(cypher: String) -> Self {
        RelatedQuery::new(cypher)
    }
}

/// Every node the query returns, deduplicated.
pub async fn related_nodes<N: NodeType>(
    node: &N,
    graph: &GraphConnection,
    query: RelatedQuery,
) -> Result<Vec<Arc<dyn GraphNode>>> {
    graph.register_node::<N>();
    let result = graph.evaluate_query(query.to_query(node)?).await?;
    Ok(result.nodes)
}

/// The returned nodes of type `T`.
pub async fn related_nodes_as<N: NodeType, T: NodeType>(
    node: &N,
    graph: &GraphConnection,
    query: RelatedQuery,
) -> Result<Vec<T>> {
    graph.register_node::<N>().register_node::<T>();
    let result = graph.evaluate_query(query.to_query(node)?).await?;
    Ok(result.nodes_of::<T>())
}

/// The single value the query returns, if any.
pub async fn related_property<N: NodeType>(
    node: &N,
    graph: &GraphConnection,
    query: RelatedQuery,
) -> Result<Option<Value>> {
    graph.evaluate_query_single(query.to_query(node)?).await
}

/// The single value the query returns, deserialized. `null` is `None`.
pub async fn related_property_as<N: NodeType, V: DeserializeOwned>(
    node: &N,
    graph: &GraphConnection,
    query: RelatedQuery,
) -> Result<Option<V>> {
    match related_property(node, graph, query).await? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_collects_into_map() {
        let query = RelatedQuery::new("RETURN $a, $b").param("a", 1).param("b", "two");
        let params = query.params.unwrap();
        assert_eq!(params["a"], json!(1));
        assert_eq!(params["b"], json!("two"));
    }

    #[test]
    fn test_from_str_has_no_params() {
        let query = RelatedQuery::from("MATCH #ThisNode RETURN ThisNode");
        assert_eq!(query.params, None);
    }
}
