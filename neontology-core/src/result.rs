//! The query result envelope.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::{NeontologyError, Result};
use crate::node::{GraphNode, NodeType};
use crate::record::RawRecord;
use crate::relationship::{GraphRelationship, RelationshipType};
use crate::value::identity_key;

/// The typed entities found in one row, by column name.
#[derive(Debug, Clone, Default)]
pub struct ResultRecord {
    pub nodes: BTreeMap<String, Arc<dyn GraphNode>>,
    pub relationships: BTreeMap<String, Arc<dyn GraphRelationship>>,
    pub paths: BTreeMap<String, Vec<Arc<dyn GraphRelationship>>>,
}

/// The outcome of evaluating a query.
///
/// `nodes`, `relationships` and `paths` are deduplicated across every row:
/// nodes by `(primary label, primary value)`, relationships by a hash of
/// their exported form. Rows that could not be fully interpreted still count
/// in `records_raw`; the problems are listed in `warnings`.
#[derive(Debug, Clone, Default)]
pub struct NeontologyResult {
    pub records_raw: Vec<RawRecord>,
    pub records: Vec<ResultRecord>,
    pub nodes: Vec<Arc<dyn GraphNode>>,
    pub relationships: Vec<Arc<dyn GraphRelationship>>,
    pub paths: Vec<Vec<Arc<dyn GraphRelationship>>>,
    pub warnings: Vec<String>,
}

impl NeontologyResult {
    /// Nodes of type `T`, cloned out of the envelope.
    pub fn nodes_of<T: NodeType>(&self) -> Vec<T> {
        self.nodes.iter().filter_map(|n| n.downcast_ref::<T>()).cloned().collect()
    }

    /// Relationships of type `R`, cloned out of the envelope.
    pub fn relationships_of<R: RelationshipType>(&self) -> Vec<R> {
        self.relationships
            .iter()
            .filter_map(|r| r.downcast_ref::<R>())
            .cloned()
            .collect()
    }

    /// Fail with [`NeontologyError::Warnings`] if any row was dropped or
    /// only partially understood.
    pub fn into_strict(self) -> Result<Self> {
        if self.warnings.is_empty() {
            Ok(self)
        } else {
            Err(NeontologyError::Warnings(self.warnings))
        }
    }

    /// A node-link graph for visualization tools:
    /// `{"nodes": [{id, label, name}], "links": [{source, target}]}`.
    pub fn node_link_data(&self) -> Result<Value> {
        let mut seen = BTreeSet::new();
        let mut nodes = Vec::new();
        for node in &self.nodes {
            let entry = json!({
                "id": node.identity_value()?,
                "label": node.primary_label(),
                "name": node.name(),
            });
            if seen.insert(entry.to_string()) {
                nodes.push(entry);
            }
        }

        let mut seen = BTreeSet::new();
        let mut links = Vec::new();
        for rel in &self.relationships {
            let entry = json!({
                "source": rel.source_ref()?.value,
                "target": rel.target_ref()?.value,
            });
            if seen.insert(entry.to_string()) {
                links.push(entry);
            }
        }

        Ok(json!({ "nodes": nodes, "links": links }))
    }

    /// The envelope in bulk-record form, `{"nodes": [..], "edges": [..]}`,
    /// ready to feed back into an import.
    pub fn neontology_dump(&self) -> Result<Value> {
        let nodes = self
            .nodes
            .iter()
            .map(|node| {
                let mut record = node.properties()?;
                record.insert("LABEL".into(), Value::from(node.primary_label()));
                Ok(Value::Object(record))
            })
            .collect::<Result<Vec<_>>>()?;

        let edges = self
            .relationships
            .iter()
            .map(|rel| Ok(Value::Object(rel.export_record()?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(json!({ "nodes": nodes, "edges": edges }))
    }

    /// Identity keys of the envelope's nodes, grouped by primary label.
    pub fn node_keys(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut out: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for node in &self.nodes {
            if let Ok(value) = node.identity_value() {
                out.entry(node.primary_label()).or_default().push(identity_key(&value));
            }
        }
        out
    }
}
