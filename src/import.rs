//! Bulk import of node and relationship records.
//!
//! A node record is a flat property map with a `LABEL` key naming a
//! registered primary label. A relationship record carries
//! `RELATIONSHIP_TYPE`, `SOURCE_LABEL`, `TARGET_LABEL`, optionally
//! `TARGET_PROPERTY`, and the endpoint identity values under `source` and
//! `target`. A link-data document `{"nodes": [..], "edges": [..]}` holds
//! both kinds, which is the shape [`NeontologyResult::neontology_dump`]
//! produces.
//!
//! A node record may also nest relationships under `RELATIONSHIPS_OUT`.
//! Each sub-record names its targets either as identity values in
//! `TARGETS` or as node records in `TARGET_NODES`, which are imported too.
//!
//! [`NeontologyResult::neontology_dump`]: neontology_core::NeontologyResult::neontology_dump

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use neontology_core::value::identity_key;
use neontology_core::{Filters, GraphNode, NeontologyError, Properties, Result, TypeRegistry};

use crate::connection::GraphConnection;
use crate::ops::node::merge_mixed_nodes;
use crate::ops::relationship::{merge_edges, relationship_edges, EdgeParts, RecordOptions};

const LABEL: &str = "LABEL";
const RELATIONSHIP_TYPE: &str = "RELATIONSHIP_TYPE";
const SOURCE_LABEL: &str = "SOURCE_LABEL";
const TARGET_LABEL: &str = "TARGET_LABEL";
const TARGET_PROPERTY: &str = "TARGET_PROPERTY";
const RELATIONSHIPS_OUT: &str = "RELATIONSHIPS_OUT";
const TARGET_NODES: &str = "TARGET_NODES";
const TARGETS: &str = "TARGETS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Validate every record but write nothing.
    pub validate_only: bool,
    /// Look up each relationship target before merging.
    pub check_unmatched: bool,
    /// Fail instead of warning when a target is missing or ambiguous.
    pub error_on_unmatched: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            validate_only: false,
            check_unmatched: true,
            error_on_unmatched: false,
        }
    }
}

/// What an import wrote, or would have written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub nodes: usize,
    pub relationships: usize,
    pub warnings: Vec<String>,
}

/// Relationship records sharing a type, endpoint labels and target property.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    rel_type: String,
    target_prop: Option<String>,
    source_label: String,
    target_label: String,
}

#[derive(Default)]
struct Prepared {
    nodes: Vec<Arc<dyn GraphNode>>,
    relationships: BTreeMap<GroupKey, Vec<Properties>>,
}

fn string_key(record: &mut Properties, key: &str) -> Result<Option<String>> {
    match record.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(NeontologyError::InvalidRecord(format!("{key} must be a string, got {other}"))),
    }
}

fn required_key(record: &mut Properties, key: &str, kind: &str) -> Result<String> {
    string_key(record, key)?
        .ok_or_else(|| NeontologyError::InvalidRecord(format!("{kind} record without {key}")))
}

/// Flatten arrays and link-data documents into single records.
fn flatten(value: Value, out: &mut Vec<Properties>) -> Result<()> {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten(item, out)?;
            }
            Ok(())
        }
        Value::Object(mut map) if !map.contains_key(LABEL) && !map.contains_key(RELATIONSHIP_TYPE) => {
            let nodes = map.remove("nodes");
            let edges = map.remove("edges");
            if nodes.is_none() && edges.is_none() {
                return Err(NeontologyError::InvalidRecord(
                    "record has neither LABEL (node) nor RELATIONSHIP_TYPE (relationship)".into(),
                ));
            }
            for part in nodes.into_iter().chain(edges) {
                flatten(part, out)?;
            }
            Ok(())
        }
        Value::Object(map) => {
            out.push(map);
            Ok(())
        }
        other => Err(NeontologyError::InvalidRecord(format!("expected an object, got {other}"))),
    }
}

impl Prepared {
    fn add(&mut self, registry: &TypeRegistry, mut record: Properties) -> Result<()> {
        if record.contains_key(LABEL) {
            let sub_records = record.remove(RELATIONSHIPS_OUT);
            let (label, node) = self.add_node(registry, record)?;
            if let Some(sub_records) = sub_records {
                self.add_sub_records(registry, label, &node, sub_records)?;
            }
            Ok(())
        } else if record.contains_key(RELATIONSHIP_TYPE) {
            self.add_relationship(registry, record)
        } else {
            Err(NeontologyError::InvalidRecord(
                "record has neither LABEL (node) nor RELATIONSHIP_TYPE (relationship)".into(),
            ))
        }
    }

    fn add_node(&mut self, registry: &TypeRegistry, mut record: Properties) -> Result<(String, Arc<dyn GraphNode>)> {
        let label = required_key(&mut record, LABEL, "node")?;
        let descriptor = registry
            .node_by_label(&label)
            .ok_or_else(|| NeontologyError::UnknownLabel(label.clone()))?;
        let node = descriptor
            .hydrate(record)
            .map_err(|e| e.with_context(format!("importing {label} node")))?;
        self.nodes.push(Arc::clone(&node));
        Ok((label, node))
    }

    fn add_relationship(&mut self, registry: &TypeRegistry, mut record: Properties) -> Result<()> {
        let rel_type = required_key(&mut record, RELATIONSHIP_TYPE, "relationship")?;
        if registry.relationship(&rel_type).is_none() {
            return Err(NeontologyError::UnknownRelationshipType(rel_type));
        }
        let key = GroupKey {
            source_label: required_key(&mut record, SOURCE_LABEL, "relationship")?,
            target_label: required_key(&mut record, TARGET_LABEL, "relationship")?,
            target_prop: string_key(&mut record, TARGET_PROPERTY)?,
            rel_type,
        };
        record.remove(TARGET_NODES);
        record.remove(TARGETS);
        self.relationships.entry(key).or_default().push(record);
        Ok(())
    }

    fn add_sub_records(
        &mut self,
        registry: &TypeRegistry,
        source_label: String,
        source: &Arc<dyn GraphNode>,
        sub_records: Value,
    ) -> Result<()> {
        tracing::warn!(
            label = %source_label,
            "importing relationships nested in a node record; related nodes need explicit or deterministic primary keys"
        );
        let Value::Array(sub_records) = sub_records else {
            return Err(NeontologyError::InvalidRecord(format!("{RELATIONSHIPS_OUT} must be a list")));
        };
        let source_value = source.identity_value()?;

        for sub in sub_records {
            let Value::Object(mut sub) = sub else {
                return Err(NeontologyError::InvalidRecord(format!("{RELATIONSHIPS_OUT} entries must be objects")));
            };

            let mut targets = Vec::new();
            if let Some(nodes) = sub.remove(TARGET_NODES) {
                let Value::Array(nodes) = nodes else {
                    return Err(NeontologyError::InvalidRecord(format!("{TARGET_NODES} must be a list")));
                };
                for node in nodes {
                    let Value::Object(node) = node else {
                        return Err(NeontologyError::InvalidRecord(format!("{TARGET_NODES} entries must be objects")));
                    };
                    let (_, target) = self.add_node(registry, node)?;
                    targets.push(target.identity_value()?);
                }
            }
            match sub.remove(TARGETS) {
                Some(Value::Array(values)) => targets.extend(values),
                Some(_) => return Err(NeontologyError::InvalidRecord(format!("{TARGETS} must be a list"))),
                None => {}
            }

            sub.insert(SOURCE_LABEL.into(), Value::from(source_label.as_str()));
            sub.insert("source".into(), source_value.clone());
            for target in targets {
                let mut record = sub.clone();
                record.insert("target".into(), target);
                self.add_relationship(registry, record)?;
            }
        }
        Ok(())
    }
}

/// Import node and relationship records. Nodes are merged first, then
/// relationships between existing nodes.
pub async fn import_records(
    graph: &GraphConnection,
    records: Vec<Value>,
    options: &ImportOptions,
) -> Result<ImportSummary> {
    let registry = graph.registry().snapshot();

    let mut flat = Vec::new();
    for value in records {
        flatten(value, &mut flat)?;
    }
    let mut prepared = Prepared::default();
    for record in flat {
        prepared.add(&registry, record)?;
    }

    let mut groups = Vec::with_capacity(prepared.relationships.len());
    for (key, records) in prepared.relationships {
        let edges = group_edges(&registry, &key, records)?;
        groups.push((key, edges));
    }

    let mut summary = ImportSummary {
        nodes: prepared.nodes.len(),
        relationships: groups.iter().map(|(_, e)| e.len()).sum(),
        warnings: Vec::new(),
    };
    if options.validate_only {
        tracing::info!(nodes = summary.nodes, relationships = summary.relationships, "import records validated");
        return Ok(summary);
    }

    merge_mixed_nodes(graph, prepared.nodes).await?;

    for (key, edges) in groups {
        if options.check_unmatched {
            if let Some(problem) = check_targets(graph, &key, &edges).await? {
                if options.error_on_unmatched {
                    return Err(problem);
                }
                let message = problem.to_string();
                tracing::warn!("{message}");
                summary.warnings.push(message);
            }
        }
        let Some(data) = registry.relationship(&key.rel_type) else {
            return Err(NeontologyError::UnknownRelationshipType(key.rel_type));
        };
        merge_edges(graph, &key.rel_type, &data.relationship.usage, edges).await?;
    }

    tracing::info!(nodes = summary.nodes, relationships = summary.relationships, "import records merged");
    Ok(summary)
}

fn group_edges(registry: &TypeRegistry, key: &GroupKey, records: Vec<Properties>) -> Result<Vec<EdgeParts>> {
    let data = registry
        .relationship(&key.rel_type)
        .ok_or_else(|| NeontologyError::UnknownRelationshipType(key.rel_type.clone()))?;
    let lookup = |label: &str| {
        registry
            .node_by_label(label)
            .ok_or_else(|| NeontologyError::UnknownLabel(label.to_owned()))
    };
    let options = RecordOptions {
        source_type: Some(lookup(&key.source_label)?),
        target_type: Some(lookup(&key.target_label)?),
        source_prop: None,
        target_prop: key.target_prop.clone(),
    };
    relationship_edges(data.relationship, records, &options)
        .map_err(|e| e.with_context(format!("importing {} relationships", key.rel_type)))
}

/// Describe the targets that do not resolve to exactly one node.
async fn check_targets(graph: &GraphConnection, key: &GroupKey, edges: &[EdgeParts]) -> Result<Option<NeontologyError>> {
    let Some(first) = edges.first() else {
        return Ok(None);
    };
    let label = first.target.label()?;
    let property = first.target.property.clone();

    let mut unmatched = Vec::new();
    for edge in edges {
        let filters = Filters::new().and(&format!("{property}__exact"), edge.target.value.clone())?;
        let count = graph.count_nodes(label, &filters).await?;
        if count != 1 {
            unmatched.push(format!("{} ({count} found)", identity_key(&edge.target.value)));
        }
    }

    if unmatched.is_empty() {
        return Ok(None);
    }
    Ok(Some(NeontologyError::UnmatchedTargets {
        rel_type: key.rel_type.clone(),
        target_label: label.to_owned(),
        target_property: property,
        count: unmatched.len(),
        values: unmatched.join(", "),
    }))
}
