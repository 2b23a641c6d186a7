//! Turning raw rows into typed models.
//!
//! Nothing in here fails a query because of one bad row. Nodes whose labels
//! do not resolve to exactly one registered primary label, relationships of
//! unregistered types or without both endpoints in the row, and values that
//! fail model validation are dropped with a warning.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::node::{GraphNode, NodeDescriptor};
use crate::record::{RawNode, RawRecord, RawRelationship, RawValue};
use crate::registry::TypeRegistry;
use crate::relationship::GraphRelationship;
use crate::result::{NeontologyResult, ResultRecord};

/// Wire name of the surrogate key filled from the backend's node id.
pub const ELEMENT_ID: &str = "element_id";

/// Materialize `records` against the registered types.
pub fn materialize(records: Vec<RawRecord>, registry: &TypeRegistry) -> NeontologyResult {
    let mut m = Materializer::new(registry);
    let rows = records.iter().map(|r| m.record(r)).collect();

    NeontologyResult {
        records_raw: records,
        records: rows,
        nodes: m.nodes,
        relationships: m.relationships,
        paths: m.paths,
        warnings: m.warnings,
    }
}

struct Materializer<'a> {
    registry: &'a TypeRegistry,
    node_index: HashMap<(&'static str, String), Arc<dyn GraphNode>>,
    nodes: Vec<Arc<dyn GraphNode>>,
    rel_index: HashMap<String, Arc<dyn GraphRelationship>>,
    relationships: Vec<Arc<dyn GraphRelationship>>,
    path_index: HashSet<String>,
    paths: Vec<Vec<Arc<dyn GraphRelationship>>>,
    warnings: Vec<String>,
}

impl<'a> Materializer<'a> {
    fn new(registry: &'a TypeRegistry) -> Self {
        Materializer {
            registry,
            node_index: HashMap::new(),
            nodes: Vec::new(),
            rel_index: HashMap::new(),
            relationships: Vec::new(),
            path_index: HashSet::new(),
            paths: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    fn record(&mut self, record: &RawRecord) -> ResultRecord {
        let mut row = ResultRecord::default();

        // Every node in the row, by backend id, for endpoint resolution.
        let mut by_id: BTreeMap<i64, Option<Arc<dyn GraphNode>>> = BTreeMap::new();
        let mut resolve = |m: &mut Self, raw: &RawNode| -> Option<Arc<dyn GraphNode>> {
            by_id.entry(raw.id).or_insert_with(|| m.node(raw)).clone()
        };

        for (key, value) in &record.columns {
            match value {
                RawValue::Node(raw) => {
                    if let Some(node) = resolve(self, raw) {
                        row.nodes.insert(key.clone(), node);
                    }
                }
                RawValue::Path(path) => {
                    for raw in &path.nodes {
                        resolve(self, raw);
                    }
                }
                RawValue::Relationship(_) | RawValue::Value(_) => {}
            }
        }

        for (key, value) in &record.columns {
            match value {
                RawValue::Relationship(raw) => {
                    if let Some(rel) = self.relationship(raw, &by_id) {
                        row.relationships.insert(key.clone(), rel);
                    }
                }
                RawValue::Path(path) => {
                    let steps: Vec<_> = path
                        .relationships
                        .iter()
                        .filter_map(|raw| self.relationship(raw, &by_id))
                        .collect();
                    if !steps.is_empty() {
                        self.add_path(&steps);
                        row.paths.insert(key.clone(), steps);
                    }
                }
                RawValue::Node(_) | RawValue::Value(_) => {}
            }
        }

        row
    }

    /// Hydrate a node, returning the canonical instance for its identity.
    fn node(&mut self, raw: &RawNode) -> Option<Arc<dyn GraphNode>> {
        let primary: Vec<_> = raw
            .labels
            .iter()
            .filter_map(|l| self.registry.node_by_label(l))
            .collect();

        let descriptor = match primary.as_slice() {
            [only] => *only,
            _ => {
                let found: Vec<_> = primary.iter().filter_map(|d| d.primary_label).collect();
                self.warn(format!(
                    "unexpected primary labels {found:?} on node with labels {:?}",
                    raw.labels
                ));
                return None;
            }
        };

        let mut actual: Vec<&str> = raw
            .labels
            .iter()
            .map(String::as_str)
            .filter(|l| Some(*l) != descriptor.primary_label)
            .collect();
        let mut expected = descriptor.secondary_labels.clone();
        actual.sort_unstable();
        expected.sort_unstable();
        if actual != expected {
            self.warn(format!(
                "unexpected secondary labels {actual:?} for {}, expected {expected:?}",
                descriptor.type_name
            ));
        }

        let node = match hydrate_raw_node(raw, descriptor) {
            Ok(node) => node,
            Err(e) => {
                self.warn(format!("could not build {} from node {}: {e}", descriptor.type_name, raw.id));
                return None;
            }
        };

        let key = match node.dedup_key() {
            Ok(key) => key,
            Err(e) => {
                self.warn(format!("{} node {} has no identity: {e}", descriptor.type_name, raw.id));
                return None;
            }
        };

        if let Some(existing) = self.node_index.get(&key) {
            return Some(existing.clone());
        }
        self.node_index.insert(key, node.clone());
        self.nodes.push(node.clone());
        Some(node)
    }

    fn relationship(
        &mut self,
        raw: &RawRelationship,
        by_id: &BTreeMap<i64, Option<Arc<dyn GraphNode>>>,
    ) -> Option<Arc<dyn GraphRelationship>> {
        let registry = self.registry;
        let Some(data) = registry.relationship(&raw.rel_type) else {
            self.warn(format!(
                "no registered relationship type for '{}'; register it before querying",
                raw.rel_type
            ));
            return None;
        };
        let descriptor = data.relationship;

        let (Some(Some(source)), Some(Some(target))) = (by_id.get(&raw.start), by_id.get(&raw.end)) else {
            self.warn(format!(
                "{} relationship {} returned without both endpoint nodes; return source and target nodes in the same row",
                raw.rel_type, raw.id
            ));
            return None;
        };

        let rel = match (descriptor.hydrate)(raw.properties.clone(), source, target) {
            Ok(rel) => rel,
            Err(e) => {
                self.warn(format!("could not build {} from relationship {}: {e}", descriptor.type_name, raw.id));
                return None;
            }
        };

        let hash = match content_hash(rel.as_ref()) {
            Ok(hash) => hash,
            Err(e) => {
                self.warn(format!("could not export {} relationship {}: {e}", raw.rel_type, raw.id));
                return None;
            }
        };

        if let Some(existing) = self.rel_index.get(&hash) {
            return Some(existing.clone());
        }
        self.rel_index.insert(hash, rel.clone());
        self.relationships.push(rel.clone());
        Some(rel)
    }

    fn add_path(&mut self, steps: &[Arc<dyn GraphRelationship>]) {
        let key = steps
            .iter()
            .filter_map(|r| content_hash(r.as_ref()).ok())
            .collect::<Vec<_>>()
            .join(":");
        if self.path_index.insert(key) {
            self.paths.push(steps.to_vec());
        }
    }
}

/// Hydrate one backend node as `descriptor`, filling the element-id field
/// from the backend id when the type declares one. No label checks.
pub fn hydrate_raw_node(raw: &RawNode, descriptor: &NodeDescriptor) -> Result<Arc<dyn GraphNode>> {
    let mut props = raw.properties.clone();
    if descriptor.has_field(ELEMENT_ID) {
        props.insert(ELEMENT_ID.into(), Value::String(raw.id.to_string()));
    }
    descriptor.hydrate(props)
}

/// SHA-256 of a relationship's exported record, in hex.
pub fn content_hash(rel: &dyn GraphRelationship) -> Result<String> {
    let record = rel.export_record()?;
    let digest = Sha256::digest(serde_json::to_vec(&record)?);
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}
