//! Backend engines.
//!
//! An engine executes the structural operations the model layer needs. The
//! Cypher-speaking engines only implement [`GraphEngine::execute`] and
//! inherit every other operation from the statement builders in
//! [`neontology_core::cypher`]; engines with dialect differences override the
//! affected methods.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use neontology_core::cypher::{self, CreateRow, MergeRelationshipSpec, MergeRow, RelationshipRow};
use neontology_core::{Filters, Lookup, Query, RawRecord, RelatedOptions, Result};

use crate::config::EngineConfig;

pub mod bolt;
pub mod memgraph;
pub mod memory;
pub mod neo4j;

pub use memgraph::MemgraphEngine;
pub use memory::MemoryEngine;
pub use neo4j::Neo4jEngine;

/// A graph database backend.
#[async_trait]
pub trait GraphEngine: Debug + Send + Sync {
    /// Short engine name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Filter lookups [`match_nodes`](Self::match_nodes) and
    /// [`count_nodes`](Self::count_nodes) accept.
    fn supported_lookups(&self) -> &'static [Lookup] {
        &Lookup::ALL
    }

    /// Round-trip a trivial statement.
    async fn verify_connection(&self) -> Result<()> {
        self.execute(Query::new("RETURN 1")).await.map(|_| ())
    }

    /// Release the connection. Closing twice is not an error.
    async fn close(&self) -> Result<()>;

    /// Run a Cypher statement and return its raw rows.
    async fn execute(&self, query: Query) -> Result<Vec<RawRecord>>;

    /// Insert one node per row. Returns one row per created node, column `n`.
    async fn create_nodes(&self, labels: &[&str], pp_key: &str, rows: Vec<CreateRow>) -> Result<Vec<RawRecord>> {
        self.execute(cypher::create_nodes(labels, pp_key, &rows)?).await
    }

    /// Merge one node per row. Returns one row per input row, column `n`.
    async fn merge_nodes(&self, labels: &[&str], pp_key: &str, rows: Vec<MergeRow>) -> Result<Vec<RawRecord>> {
        self.execute(cypher::merge_nodes(labels, pp_key, &rows)?).await
    }

    /// Detach-delete nodes by primary value. Missing nodes are ignored.
    async fn delete_nodes(&self, label: &str, pp_key: &str, pp_values: Vec<Value>) -> Result<()> {
        self.execute(cypher::delete_nodes(label, pp_key, pp_values)).await.map(|_| ())
    }

    /// Nodes with primary label `label`, newest first, column `n`.
    async fn match_nodes(
        &self,
        label: &str,
        limit: Option<u64>,
        skip: Option<u64>,
        filters: &Filters,
    ) -> Result<Vec<RawRecord>> {
        filters.check_supported(self.supported_lookups(), self.name())?;
        self.execute(cypher::match_nodes(label, limit, skip, filters)).await
    }

    /// At most one node by primary value, column `n`.
    async fn match_node(&self, label: &str, pp_key: &str, pp_value: Value) -> Result<Vec<RawRecord>> {
        self.execute(cypher::match_node(label, pp_key, pp_value)).await
    }

    async fn count_nodes(&self, label: &str, filters: &Filters) -> Result<u64> {
        filters.check_supported(self.supported_lookups(), self.name())?;
        let rows = self.execute(cypher::count_nodes(label, filters)).await?;
        Ok(as_count(single_value(rows)))
    }

    /// Merge edges between existing nodes, one per row.
    async fn merge_relationships(&self, spec: &MergeRelationshipSpec, rows: Vec<RelationshipRow>) -> Result<()> {
        self.execute(cypher::merge_relationships(spec, &rows)?).await.map(|_| ())
    }

    /// Edges of `rel_type` with their endpoints, columns `n`, `r`, `o`.
    async fn match_relationships(&self, rel_type: &str, limit: Option<u64>, skip: Option<u64>) -> Result<Vec<RawRecord>> {
        self.execute(cypher::match_relationships(rel_type, limit, skip)).await
    }

    async fn count_relationships(&self, rel_type: &str) -> Result<u64> {
        let rows = self.execute(cypher::count_relationships(rel_type)).await?;
        Ok(as_count(single_value(rows)))
    }

    /// Traverse from one node. See [`cypher::get_related`] for the columns.
    async fn get_related(
        &self,
        label: &str,
        pp_key: &str,
        pp_value: Value,
        options: &RelatedOptions,
    ) -> Result<Vec<RawRecord>> {
        self.execute(cypher::get_related(label, pp_key, pp_value, options)?).await
    }

    /// Create a uniqueness constraint on `label`.`property`.
    async fn apply_constraint(&self, label: &str, property: &str) -> Result<()> {
        self.execute(cypher::apply_constraint(label, property)).await.map(|_| ())
    }

    async fn drop_constraint(&self, name: &str) -> Result<()> {
        self.execute(cypher::drop_constraint(name)).await.map(|_| ())
    }

    /// Names of the existing constraints.
    async fn get_constraints(&self) -> Result<Vec<String>> {
        let rows = self.execute(cypher::get_constraints()).await?;
        Ok(match single_value(rows) {
            Some(Value::Array(names)) => names
                .into_iter()
                .filter_map(|n| n.as_str().map(str::to_owned))
                .collect(),
            _ => Vec::new(),
        })
    }
}

/// Build and connect the engine described by `config`.
pub async fn connect(config: &EngineConfig) -> Result<Arc<dyn GraphEngine>> {
    config.validate()?;
    let engine: Arc<dyn GraphEngine> = match config {
        EngineConfig::Neo4j(c) => Arc::new(Neo4jEngine::connect(&c.resolve()?).await?),
        EngineConfig::Memgraph(c) => Arc::new(MemgraphEngine::connect(&c.resolve()?).await?),
        EngineConfig::Memory => Arc::new(MemoryEngine::new()),
    };
    tracing::info!(engine = engine.name(), "graph engine connected");
    Ok(engine)
}

/// The first column of the first row.
///
/// More than one row or column is the caller's mistake; it is logged and
/// the first value is still returned.
pub fn single_value(rows: Vec<RawRecord>) -> Option<Value> {
    if rows.len() > 1 {
        tracing::warn!(rows = rows.len(), "expected a single row, using the first");
    }
    let first = rows.into_iter().next()?;
    if first.len() > 1 {
        tracing::warn!(columns = first.len(), "expected a single column, using the first");
    }
    first.first_value()
}

fn as_count(value: Option<Value>) -> u64 {
    value.and_then(|v| v.as_u64()).unwrap_or(0)
}
