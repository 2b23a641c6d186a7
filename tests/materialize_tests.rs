use std::sync::Arc;

use neontology::prelude::*;
use neontology_core::materialize::materialize;
use neontology_core::{RawNode, RawRecord, RawRelationship, RawValue, TypeRegistry};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, Node)]
#[neontology(label = "Person", primary_property = "name", secondary_labels(Human))]
struct Person {
    name: String,
    age: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Node)]
#[neontology(label = "Robot", primary_property = "serial")]
struct Robot {
    serial: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Relationship)]
#[neontology(type = "OWNS")]
struct Owns {
    source: Person,
    target: Robot,
    since: Option<i64>,
}

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.add_relationship(Owns::relationship_descriptor());
    registry
}

fn props(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn node(id: i64, labels: &[&str], properties: Value) -> RawValue {
    RawValue::Node(RawNode {
        id,
        labels: labels.iter().map(|l| l.to_string()).collect(),
        properties: props(properties),
    })
}

fn owns(id: i64, since: i64) -> RawValue {
    RawValue::Relationship(RawRelationship {
        id,
        rel_type: "OWNS".into(),
        start: 1,
        end: 2,
        properties: props(json!({"since": since})),
    })
}

fn alice() -> RawValue {
    node(1, &["Person", "Human"], json!({"name": "Alice", "age": 30}))
}

fn r2() -> RawValue {
    node(2, &["Robot"], json!({"serial": "R2"}))
}

#[test]
fn test_two_primary_labels_skip_the_node() {
    let records = vec![
        RawRecord::new().with("n", alice()),
        RawRecord::new().with("n", node(3, &["Person", "Human", "Robot"], json!({"name": "Cy", "serial": "C3"}))),
    ];
    let result = materialize(records, &registry());

    assert_eq!(result.records_raw.len(), 2);
    assert_eq!(result.nodes.len(), 1);
    assert!(result.records[1].nodes.is_empty());
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("unexpected primary labels"), "{}", result.warnings[0]);
}

#[test]
fn test_secondary_label_mismatch_warns_but_keeps_node() {
    let records = vec![RawRecord::new().with("n", node(1, &["Person", "Android"], json!({"name": "Alice"})))];
    let result = materialize(records, &registry());

    assert_eq!(result.nodes_of::<Person>().len(), 1);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("unexpected secondary labels"), "{}", result.warnings[0]);
}

#[test]
fn test_same_relationship_is_shared_across_rows() {
    let records = vec![
        RawRecord::new().with("n", alice()).with("o", r2()).with("r", owns(10, 2020)),
        RawRecord::new().with("n", alice()).with("o", r2()).with("r", owns(11, 2020)),
        RawRecord::new().with("n", alice()).with("o", r2()).with("r", owns(12, 2021)),
    ];
    let result = materialize(records, &registry());

    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    assert_eq!(result.nodes.len(), 2);
    assert_eq!(result.relationships.len(), 2);

    let first = result.records[0].relationships.get("r").unwrap();
    let second = result.records[1].relationships.get("r").unwrap();
    let third = result.records[2].relationships.get("r").unwrap();
    assert!(Arc::ptr_eq(first, second));
    assert!(!Arc::ptr_eq(first, third));

    let edges = result.relationships_of::<Owns>();
    assert_eq!(edges[0].source.name, "Alice");
    assert_eq!(edges[0].target.serial, "R2");
    assert_eq!(edges.iter().map(|e| e.since).collect::<Vec<_>>(), vec![Some(2020), Some(2021)]);
}

#[test]
fn test_unregistered_relationship_type_is_dropped() {
    let unknown = RawValue::Relationship(RawRelationship {
        id: 20,
        rel_type: "REPAIRS".into(),
        start: 1,
        end: 2,
        properties: Map::new(),
    });
    let records = vec![RawRecord::new().with("n", alice()).with("o", r2()).with("r", unknown)];
    let result = materialize(records, &registry());

    assert_eq!(result.nodes.len(), 2);
    assert!(result.relationships.is_empty());
    assert!(result.warnings[0].contains("REPAIRS"));
}

#[test]
fn test_into_strict() {
    let clean = materialize(vec![RawRecord::new().with("n", alice())], &registry());
    assert_eq!(clean.into_strict().unwrap().nodes.len(), 1);

    let records = vec![
        RawRecord::new().with("n", node(1, &["Person"], json!({"name": "Alice"}))),
        RawRecord::new().with("r", owns(10, 2020)),
    ];
    match materialize(records, &registry()).into_strict() {
        Err(NeontologyError::Warnings(warnings)) => {
            assert_eq!(warnings.len(), 2);
            assert!(warnings[0].contains("unexpected secondary labels"));
            assert!(warnings[1].contains("without both endpoint nodes"));
        }
        other => panic!("expected Warnings, got {other:?}"),
    }
}
