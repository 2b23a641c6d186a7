use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use neontology::prelude::*;
use neontology::GraphEngine;
use neontology_core::{RawNode, RawRecord, RawRelationship, RawValue};
use serde_json::{json, Map, Value};

/// Answers every statement with canned rows and remembers what it was sent.
#[derive(Debug, Default)]
struct RecordingEngine {
    rows: Mutex<Vec<RawRecord>>,
    sent: Mutex<Vec<Query>>,
}

impl RecordingEngine {
    fn answering(rows: Vec<RawRecord>) -> Arc<Self> {
        Arc::new(RecordingEngine {
            rows: Mutex::new(rows),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn last_query(&self) -> Query {
        self.sent.lock().unwrap().last().cloned().expect("no query sent")
    }
}

#[async_trait]
impl GraphEngine for RecordingEngine {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn close(&self) -> neontology::Result<()> {
        Ok(())
    }

    async fn execute(&self, query: Query) -> neontology::Result<Vec<RawRecord>> {
        self.sent.lock().unwrap().push(query);
        Ok(self.rows.lock().unwrap().clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Node)]
#[neontology(label = "Person", primary_property = "name")]
struct Person {
    name: String,
    age: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Relationship)]
#[neontology(type = "FOLLOWS")]
struct Follows {
    source: Person,
    target: Person,
}

impl Person {
    #[related_nodes(Person)]
    fn followers(&self) -> RelatedQuery {
        RelatedQuery::new("MATCH #ThisNode<-[:FOLLOWS]-(o) RETURN o")
    }

    #[related_nodes]
    fn neighbourhood(&self) -> RelatedQuery {
        RelatedQuery::new("MATCH #ThisNode-[]-(o) RETURN o")
    }

    #[related_property(i64)]
    fn follower_count(&self, min_age: i64) -> RelatedQuery {
        RelatedQuery::new("MATCH #ThisNode<-[:FOLLOWS]-(o) WHERE o.age >= $min_age RETURN count(o)")
            .param("min_age", min_age)
    }

    #[related_property]
    fn oldest_follower(&self) -> RelatedQuery {
        RelatedQuery::new("MATCH #ThisNode<-[:FOLLOWS]-(o) RETURN max(o.age)")
    }
}

fn props(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn person_node(id: i64, name: &str) -> RawNode {
    RawNode {
        id,
        labels: vec!["Person".into()],
        properties: props(json!({"name": name, "age": 30})),
    }
}

fn alice() -> Person {
    Person {
        name: "Alice".into(),
        age: Some(30),
    }
}

#[tokio::test]
async fn test_related_nodes_substitutes_this_node() {
    let engine = RecordingEngine::answering(vec![
        RawRecord::new().with("o", RawValue::Node(person_node(2, "Bob"))),
        RawRecord::new().with("o", RawValue::Node(person_node(3, "Carol"))),
    ]);
    let graph = GraphConnection::with_engine(engine.clone());

    let followers: Vec<Person> = alice().followers(&graph).await.unwrap();
    assert_eq!(followers.len(), 2);
    assert_eq!(followers[0].name, "Bob");

    let sent = engine.last_query();
    assert_eq!(sent.cypher, "MATCH (ThisNode:Person {name: $pp})<-[:FOLLOWS]-(o) RETURN o");
    assert_eq!(sent.params["pp"], json!("Alice"));
}

#[tokio::test]
async fn test_related_nodes_untyped() {
    let engine = RecordingEngine::answering(vec![
        RawRecord::new().with("o", RawValue::Node(person_node(2, "Bob"))),
        RawRecord::new().with("o", RawValue::Node(person_node(2, "Bob"))),
    ]);
    let graph = GraphConnection::with_engine(engine);

    let nodes = alice().neighbourhood(&graph).await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name(), "Bob");
}

#[tokio::test]
async fn test_related_property_binds_arguments() {
    let engine = RecordingEngine::answering(vec![RawRecord::new().with("count(o)", RawValue::Value(json!(2)))]);
    let graph = GraphConnection::with_engine(engine.clone());

    let count = alice().follower_count(&graph, 18).await.unwrap();
    assert_eq!(count, Some(2));
    assert_eq!(engine.last_query().params["min_age"], json!(18));
}

#[tokio::test]
async fn test_related_property_null_and_empty() {
    let graph = GraphConnection::with_engine(RecordingEngine::answering(vec![
        RawRecord::new().with("max(o.age)", RawValue::Value(Value::Null)),
    ]));
    assert_eq!(alice().oldest_follower(&graph).await.unwrap(), Some(Value::Null));

    let graph = GraphConnection::with_engine(RecordingEngine::answering(vec![]));
    assert_eq!(alice().follower_count(&graph, 0).await.unwrap(), None);
}

#[tokio::test]
async fn test_single_value_uses_first_of_many() {
    let graph = GraphConnection::with_engine(RecordingEngine::answering(vec![
        RawRecord::new().with("a", RawValue::Value(json!(1))).with("b", RawValue::Value(json!(9))),
        RawRecord::new().with("a", RawValue::Value(json!(2))),
    ]));
    let value = graph.evaluate_query_single("RETURN 1 AS a, 9 AS b").await.unwrap();
    assert_eq!(value, Some(json!(1)));
}

#[tokio::test]
async fn test_unknown_label_is_a_warning() {
    let stranger = RawNode {
        id: 7,
        labels: vec!["Alien".into()],
        properties: props(json!({"name": "Zork"})),
    };
    let graph = GraphConnection::with_engine(RecordingEngine::answering(vec![
        RawRecord::new().with("n", RawValue::Node(person_node(1, "Alice"))),
        RawRecord::new().with("n", RawValue::Node(stranger)),
    ]));
    graph.register_node::<Person>();

    let result = graph.evaluate_query("MATCH (n) RETURN n").await.unwrap();
    assert_eq!(result.records_raw.len(), 2);
    assert_eq!(result.nodes.len(), 1);
    assert_eq!(result.warnings.len(), 1);

    match result.into_strict() {
        Err(NeontologyError::Warnings(warnings)) => assert_eq!(warnings.len(), 1),
        other => panic!("expected Warnings, got {other:?}"),
    }
}

#[tokio::test]
async fn test_relationship_without_endpoints_is_dropped() {
    let edge = RawRelationship {
        id: 10,
        rel_type: "FOLLOWS".into(),
        start: 1,
        end: 2,
        properties: Map::new(),
    };
    let graph = GraphConnection::with_engine(RecordingEngine::answering(vec![
        RawRecord::new()
            .with("n", RawValue::Node(person_node(1, "Alice")))
            .with("o", RawValue::Node(person_node(2, "Bob")))
            .with("r", RawValue::Relationship(edge.clone())),
        RawRecord::new().with("r", RawValue::Relationship(edge)),
    ]));
    graph.register_relationship::<Follows>();

    let result = graph.evaluate_query("MATCH (n)-[r]->(o) RETURN n, r, o").await.unwrap();
    assert_eq!(result.relationships.len(), 1);
    assert_eq!(result.records[0].relationships.len(), 1);
    assert!(result.records[1].relationships.is_empty());
    assert_eq!(result.warnings.len(), 1);

    let links = result.node_link_data().unwrap();
    assert_eq!(links["links"], json!([{"source": "Alice", "target": "Bob"}]));
}

#[tokio::test]
async fn test_default_operations_build_cypher() {
    let engine = RecordingEngine::answering(vec![]);
    let graph = GraphConnection::with_engine(engine.clone());

    Person::delete(&graph, "Alice").await.unwrap();
    let sent = engine.last_query();
    assert!(sent.cypher.contains("DETACH DELETE"), "{}", sent.cypher);

    assert_eq!(Person::get_count(&graph, &Filters::new()).await.unwrap(), 0);
    assert!(engine.last_query().cypher.contains("COUNT(DISTINCT n)"));
}
