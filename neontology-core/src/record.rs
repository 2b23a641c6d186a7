//! Engine-neutral raw result rows.
//!
//! Engines translate their native rows into [`RawRecord`]s, which keep
//! graph structures (nodes, relationships, paths) apart from plain values so
//! that [`crate::materialize`] can rebuild typed models from them. The
//! `neo4rs::Row` API is isolated to [`record_from_row`].

use neo4rs::{BoltType, Row};
use serde_json::Value;

use crate::error::{NeontologyError, Result};
use crate::value::{bolt_map_to_properties, bolt_to_json, type_name, Properties};

/// A node as returned by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNode {
    pub id: i64,
    pub labels: Vec<String>,
    pub properties: Properties,
}

/// A relationship as returned by the backend, with its endpoint ids.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRelationship {
    pub id: i64,
    pub rel_type: String,
    pub start: i64,
    pub end: i64,
    pub properties: Properties,
}

/// A path: its nodes in traversal order and the edges between them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPath {
    pub nodes: Vec<RawNode>,
    pub relationships: Vec<RawRelationship>,
}

/// One column of a raw row.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Node(RawNode),
    Relationship(RawRelationship),
    Path(RawPath),
    Value(Value),
}

impl RawValue {
    /// The plain JSON form: scalars as-is, graph structures as maps.
    pub fn to_json(&self) -> Value {
        match self {
            RawValue::Value(v) => v.clone(),
            RawValue::Node(n) => node_json(n),
            RawValue::Relationship(r) => relationship_json(r),
            RawValue::Path(p) => serde_json::json!({
                "nodes": p.nodes.iter().map(node_json).collect::<Vec<_>>(),
                "relationships": p.relationships.iter().map(relationship_json).collect::<Vec<_>>(),
            }),
        }
    }
}

fn node_json(n: &RawNode) -> Value {
    serde_json::json!({ "id": n.id, "labels": n.labels, "properties": n.properties })
}

fn relationship_json(r: &RawRelationship) -> Value {
    serde_json::json!({
        "id": r.id,
        "type": r.rel_type,
        "start": r.start,
        "end": r.end,
        "properties": r.properties,
    })
}

/// One result row: named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub columns: Vec<(String, RawValue)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: RawValue) -> Self {
        self.columns.push((key.into(), value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.columns.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The first column's value, if any.
    pub fn first_value(&self) -> Option<Value> {
        self.columns.first().map(|(_, v)| v.to_json())
    }
}

// ---------------------------------------------------------------------------
// Bolt
// ---------------------------------------------------------------------------

/// Translate a `neo4rs` row, column by column.
pub fn record_from_row(row: &Row) -> Result<RawRecord> {
    // neo4rs 0.8 has no `Row::keys`; read the column names from the row's map.
    let columns: neo4rs::BoltMap = row
        .to_strict()
        .map_err(|e| NeontologyError::Mapping(format!("row columns: {e}")))?;
    let mut keys: Vec<String> = columns.value.keys().map(|k| k.value.clone()).collect();
    keys.sort();

    let mut record = RawRecord::new();
    for key in keys {
        let value: BoltType = row
            .get(&key)
            .map_err(|e| NeontologyError::Mapping(format!("column '{key}': {e}")))?;
        let value = raw_value_from_bolt(value).map_err(|e| e.with_context(format!("column '{key}'")))?;
        record.columns.push((key, value));
    }
    Ok(record)
}

fn raw_node(node: neo4rs::BoltNode) -> Result<RawNode> {
    Ok(RawNode {
        id: node.id.value,
        labels: node.labels.value.iter().map(|l| l.to_string()).collect(),
        properties: bolt_map_to_properties(node.properties)?,
    })
}

/// Translate one Bolt value.
///
/// Paths arrive as a node list, an edge list without endpoints and an index
/// sequence of `(edge, node)` pairs: edge indices are 1-based and negative
/// when the edge points against the traversal direction.
pub fn raw_value_from_bolt(value: BoltType) -> Result<RawValue> {
    Ok(match value {
        BoltType::Node(n) => RawValue::Node(raw_node(n)?),
        BoltType::Relation(r) => RawValue::Relationship(RawRelationship {
            id: r.id.value,
            rel_type: r.typ.value,
            start: r.start_node_id.value,
            end: r.end_node_id.value,
            properties: bolt_map_to_properties(r.properties)?,
        }),
        BoltType::Path(p) => {
            let nodes = p.nodes().into_iter().map(raw_node).collect::<Result<Vec<_>>>()?;
            let rels = p.rels();
            let indices = p
                .indices
                .value
                .iter()
                .map(|i| match i {
                    BoltType::Integer(i) => Ok(i.value),
                    other => Err(NeontologyError::type_mismatch("Integer", type_name(other), "path index")),
                })
                .collect::<Result<Vec<_>>>()?;

            let node_id = |idx: i64| -> Result<i64> {
                usize::try_from(idx)
                    .ok()
                    .and_then(|i| nodes.get(i))
                    .map(|n| n.id)
                    .ok_or_else(|| NeontologyError::Mapping(format!("path node index {idx} out of range")))
            };

            let mut relationships = Vec::with_capacity(indices.len() / 2);
            let mut previous = node_id(0)?;
            for pair in indices.chunks(2) {
                let [rel_index, node_index] = pair else {
                    return Err(NeontologyError::Mapping("odd-length path index sequence".into()));
                };
                let next = node_id(*node_index)?;
                let rel = rel_index
                    .unsigned_abs()
                    .checked_sub(1)
                    .and_then(|i| usize::try_from(i).ok())
                    .and_then(|i| rels.get(i))
                    .ok_or_else(|| NeontologyError::Mapping(format!("path edge index {rel_index} out of range")))?;
                let (start, end) = if *rel_index > 0 { (previous, next) } else { (next, previous) };
                relationships.push(RawRelationship {
                    id: rel.id.value,
                    rel_type: rel.typ.value.clone(),
                    start,
                    end,
                    properties: bolt_map_to_properties(rel.properties.clone())?,
                });
                previous = next;
            }

            let ordered = std::iter::once(0)
                .chain(indices.chunks(2).filter_map(|pair| pair.get(1).copied()))
                .filter_map(|i| usize::try_from(i).ok().and_then(|i| nodes.get(i).cloned()))
                .collect();

            RawValue::Path(RawPath {
                nodes: ordered,
                relationships,
            })
        }
        other => RawValue::Value(bolt_to_json(other)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo4rs::{BoltInteger, BoltList, BoltMap, BoltNode, BoltPath, BoltString, BoltUnboundedRelation};

    fn node(id: i64, name: &str) -> BoltNode {
        let mut props = BoltMap::new();
        props.put(BoltString::from("name"), BoltType::from(name));
        BoltNode::new(BoltInteger::new(id), vec![BoltType::from("Person")].into(), props)
    }

    #[test]
    fn test_path_reverse_edge() {
        // (1)-[10]->(2)<-[11]-(3)
        let path = BoltPath {
            nodes: vec![BoltType::Node(node(1, "A")), BoltType::Node(node(2, "B")), BoltType::Node(node(3, "C"))]
                .into(),
            rels: vec![
                BoltType::UnboundedRelation(BoltUnboundedRelation::new(
                    BoltInteger::new(10),
                    BoltString::from("FOLLOWS"),
                    BoltMap::new(),
                )),
                BoltType::UnboundedRelation(BoltUnboundedRelation::new(
                    BoltInteger::new(11),
                    BoltString::from("FOLLOWS"),
                    BoltMap::new(),
                )),
            ]
            .into(),
            indices: BoltList::from(vec![
                BoltType::from(1_i64),
                BoltType::from(1_i64),
                BoltType::from(-2_i64),
                BoltType::from(2_i64),
            ]),
        };

        let RawValue::Path(p) = raw_value_from_bolt(BoltType::Path(path)).unwrap() else {
            panic!("expected a path");
        };
        assert_eq!(p.nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!((p.relationships[0].start, p.relationships[0].end), (1, 2));
        assert_eq!((p.relationships[1].start, p.relationships[1].end), (3, 2));
    }
}
