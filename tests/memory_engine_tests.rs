use std::sync::Arc;

use neontology::prelude::*;
use neontology::{EngineConfig, MemoryEngine};
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize, Deserialize, Node)]
#[neontology(label = "Person", primary_property = "name")]
struct Person {
    name: String,
    age: Option<i64>,
    #[neontology(set_on_create)]
    first_seen: Option<String>,
    #[neontology(set_on_match)]
    last_seen: Option<String>,
    #[neontology(never_set)]
    #[serde(default)]
    element_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Relationship)]
#[neontology(type = "FOLLOWS")]
struct Follows {
    source: Person,
    target: Person,
    #[neontology(merge_on)]
    platform: String,
    #[neontology(set_on_create)]
    since: Option<String>,
}

fn graph() -> GraphConnection {
    GraphConnection::with_engine(Arc::new(MemoryEngine::new()))
}

fn person(name: &str, age: i64) -> Person {
    Person {
        name: name.into(),
        age: Some(age),
        first_seen: None,
        last_seen: None,
        element_id: None,
    }
}

fn follows(source: &Person, target: &Person, platform: &str) -> Follows {
    Follows {
        source: source.clone(),
        target: target.clone(),
        platform: platform.into(),
        since: None,
    }
}

fn names(people: &[Person]) -> Vec<&str> {
    people.iter().map(|p| p.name.as_str()).collect()
}

fn by_name(name: &str) -> Filters {
    Filters::new().and("name", name).unwrap()
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_merge_is_idempotent() {
    let graph = graph();
    person("Alice", 30).merge(&graph).await.unwrap();
    person("Alice", 31).merge(&graph).await.unwrap();

    assert_eq!(Person::get_count(&graph, &Filters::new()).await.unwrap(), 1);
    let alice = Person::match_node(&graph, "Alice").await.unwrap().unwrap();
    assert_eq!(alice.age, Some(31));
}

#[tokio::test]
async fn test_create_does_not_check_existence() {
    let graph = graph();
    person("Bob", 40).create(&graph).await.unwrap();
    person("Bob", 40).create(&graph).await.unwrap();

    assert_eq!(Person::get_count(&graph, &by_name("Bob")).await.unwrap(), 2);
}

#[tokio::test]
async fn test_merge_lifecycle_fields() {
    let graph = graph();
    let mut alice = person("Alice", 30);
    alice.first_seen = Some("t1".into());
    alice.last_seen = Some("t1".into());

    let created = alice.merge(&graph).await.unwrap();
    assert_eq!(created.first_seen.as_deref(), Some("t1"));
    assert_eq!(created.last_seen, None);

    alice.first_seen = Some("t2".into());
    alice.last_seen = Some("t2".into());
    let matched = alice.merge(&graph).await.unwrap();
    assert_eq!(matched.first_seen.as_deref(), Some("t1"));
    assert_eq!(matched.last_seen.as_deref(), Some("t2"));
}

#[tokio::test]
async fn test_partial_update_keeps_stored_values() {
    let graph = graph();
    person("Alice", 30).merge(&graph).await.unwrap();

    let mut partial = person("Alice", 0);
    partial.age = None;
    let merged = partial.merge(&graph).await.unwrap();
    assert_eq!(merged.age, Some(30));
}

#[tokio::test]
async fn test_element_id_is_filled_from_backend() {
    let graph = graph();
    let stored = person("Alice", 30).merge(&graph).await.unwrap();
    assert!(stored.element_id.is_some());
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Node)]
#[neontology(label = "Meeting", primary_property = "topic")]
struct Meeting {
    topic: String,
    day: chrono::NaiveDate,
    starts: chrono::DateTime<chrono::Utc>,
}

#[tokio::test]
async fn test_temporal_fields_round_trip() {
    let graph = graph();
    let meeting = Meeting {
        topic: "planning".into(),
        day: chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        starts: chrono::DateTime::parse_from_rfc3339("2024-03-01T09:30:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc),
    };
    meeting.merge(&graph).await.unwrap();

    let found = Meeting::match_node(&graph, "planning").await.unwrap().unwrap();
    assert_eq!(found, meeting);
}

#[tokio::test]
async fn test_batch_merge_keeps_input_order() {
    let graph = graph();
    let people = vec![person("C", 3), person("A", 1), person("B", 2)];
    let merged = Person::merge_nodes(&graph, people).await.unwrap();
    assert_eq!(names(&merged), vec!["C", "A", "B"]);
}

#[tokio::test]
async fn test_batch_merge_repeated_identity_returns_each_write() {
    let graph = graph();
    let merged = Person::merge_nodes(&graph, vec![person("A", 1), person("B", 5), person("A", 2)])
        .await
        .unwrap();

    assert_eq!(names(&merged), vec!["A", "B", "A"]);
    assert_eq!(merged[0].age, Some(1));
    assert_eq!(merged[2].age, Some(2));
    assert_eq!(Person::get_count(&graph, &Filters::new()).await.unwrap(), 2);
    let stored = Person::match_node(&graph, "A").await.unwrap().unwrap();
    assert_eq!(stored.age, Some(2));
}

#[tokio::test]
async fn test_merge_after_duplicate_create() {
    let graph = graph();
    person("Alice", 30).create(&graph).await.unwrap();
    person("Alice", 31).create(&graph).await.unwrap();

    let merged = person("Alice", 40).merge(&graph).await.unwrap();
    assert_eq!(merged.name, "Alice");
    assert_eq!(merged.age, Some(40));

    let batch = Person::merge_nodes(&graph, vec![person("Alice", 41), person("Bob", 1)])
        .await
        .unwrap();
    assert_eq!(names(&batch), vec!["Alice", "Bob"]);
    assert_eq!(batch[1].age, Some(1));
    assert_eq!(Person::get_count(&graph, &by_name("Alice")).await.unwrap(), 2);
}

#[tokio::test]
async fn test_merge_dyn_nodes_rejects_other_types() {
    #[derive(Debug, Clone, Serialize, Deserialize, Node)]
    #[neontology(label = "Robot", primary_property = "serial")]
    struct Robot {
        serial: String,
    }

    let graph = graph();
    let nodes: Vec<Arc<dyn GraphNode>> = vec![
        Arc::new(person("Alice", 30)),
        Arc::new(Robot { serial: "R2".into() }),
    ];
    match Person::merge_dyn_nodes(&graph, &nodes).await {
        Err(NeontologyError::WrongEntityType { expected, got }) => {
            assert_eq!(expected, "Person");
            assert_eq!(got, "Robot");
        }
        other => panic!("expected WrongEntityType, got {other:?}"),
    }
    assert_eq!(Person::get_count(&graph, &Filters::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_merge_records_reports_bad_row() {
    let graph = graph();
    let records = vec![
        json!({"name": "Alice", "age": 30}),
        json!({"age": 31}),
    ]
    .into_iter()
    .map(|v| match v {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    })
    .collect();

    let err = Person::merge_records(&graph, records).await.unwrap_err();
    assert!(err.to_string().contains("Person::merge_records (row 1)"), "{err}");
    assert_eq!(Person::get_count(&graph, &Filters::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_merge_df_expands_duplicate_rows() {
    let graph = graph();
    let frame = Frame::new(
        vec!["name".into(), "age".into()],
        vec![
            vec![json!("A"), json!(1)],
            vec![json!("B"), json!(2)],
            vec![json!("A"), json!(1)],
        ],
    )
    .unwrap();

    let merged = Person::merge_df(&graph, &frame, true).await.unwrap();
    assert_eq!(names(&merged), vec!["A", "B", "A"]);
    assert_eq!(Person::get_count(&graph, &Filters::new()).await.unwrap(), 2);

    let again = Person::merge_df(&graph, &frame, false).await.unwrap();
    assert_eq!(again.len(), 3);
    assert_eq!(Person::get_count(&graph, &Filters::new()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_merge_df_missing_cells_and_empty_frame() {
    let graph = graph();
    let frame = Frame::new(
        vec!["name".into(), "age".into()],
        vec![vec![json!("A"), json!("NaN")]],
    )
    .unwrap();
    let merged = Person::merge_df(&graph, &frame, true).await.unwrap();
    assert_eq!(merged[0].age, None);

    let empty = Frame::new(vec!["name".into()], vec![]).unwrap();
    assert!(Person::merge_df(&graph, &empty, true).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_match_node_absent_is_none() {
    let graph = graph();
    assert!(Person::match_node(&graph, "Nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_match_nodes_filters_and_pagination() {
    let graph = graph();
    for (name, age) in [("A", 10), ("B", 20), ("C", 30)] {
        person(name, age).merge(&graph).await.unwrap();
    }

    let all = Person::match_nodes(&graph, &MatchOptions::default()).await.unwrap();
    assert_eq!(names(&all), vec!["C", "B", "A"]);

    let page = Person::match_nodes(&graph, &MatchOptions::default().skip(1).limit(1))
        .await
        .unwrap();
    assert_eq!(names(&page), vec!["B"]);

    let adults = MatchOptions::default().filters(Filters::new().and("age__gte", 20).unwrap());
    assert_eq!(names(&Person::match_nodes(&graph, &adults).await.unwrap()), vec!["C", "B"]);

    let in_list = Filters::new().and("name__in", json!(["A", "C"])).unwrap();
    assert_eq!(Person::get_count(&graph, &in_list).await.unwrap(), 2);
}

#[tokio::test]
async fn test_unsupported_lookup_is_not_implemented() {
    let graph = graph();
    let options = MatchOptions::default().filters(Filters::new().and("name__icontains", "a").unwrap());
    let err = Person::match_nodes(&graph, &options).await.unwrap_err();
    assert!(err.is_not_implemented(), "{err}");
}

#[tokio::test]
async fn test_delete_detaches_relationships() {
    let graph = graph();
    let alice = person("Alice", 30).merge(&graph).await.unwrap();
    let bob = person("Bob", 40).merge(&graph).await.unwrap();
    follows(&alice, &bob, "web").merge(&graph).await.unwrap();

    Person::delete(&graph, "Alice").await.unwrap();
    Person::delete(&graph, "Nobody").await.unwrap();

    assert_eq!(Person::get_count(&graph, &Filters::new()).await.unwrap(), 1);
    assert_eq!(Follows::get_count(&graph).await.unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_relationship_identity_includes_merge_on() {
    let graph = graph();
    let alice = person("Alice", 30).merge(&graph).await.unwrap();
    let bob = person("Bob", 40).merge(&graph).await.unwrap();

    follows(&alice, &bob, "web").merge(&graph).await.unwrap();
    follows(&alice, &bob, "web").merge(&graph).await.unwrap();
    assert_eq!(Follows::get_count(&graph).await.unwrap(), 1);

    follows(&alice, &bob, "mobile").merge(&graph).await.unwrap();
    assert_eq!(Follows::get_count(&graph).await.unwrap(), 2);

    follows(&bob, &alice, "web").merge(&graph).await.unwrap();
    assert_eq!(Follows::get_count(&graph).await.unwrap(), 3);
}

#[derive(Debug, Clone, Serialize, Deserialize, Relationship)]
#[neontology(type = "MENTIONS")]
struct Mentions {
    source: Person,
    target: Person,
    #[neontology(merge_on)]
    context: Option<String>,
}

#[tokio::test]
async fn test_null_merge_on_is_rejected() {
    let graph = graph();
    let alice = person("Alice", 30).merge(&graph).await.unwrap();
    let bob = person("Bob", 40).merge(&graph).await.unwrap();

    let mentions = |context: Option<&str>| Mentions {
        source: alice.clone(),
        target: bob.clone(),
        context: context.map(str::to_owned),
    };

    match Mentions::merge_relationships(&graph, vec![mentions(Some("post")), mentions(None)]).await {
        Err(NeontologyError::InvalidRecord(message)) => assert!(message.contains("context"), "{message}"),
        other => panic!("expected InvalidRecord, got {other:?}"),
    }
    assert_eq!(Mentions::get_count(&graph).await.unwrap(), 0);

    mentions(Some("post")).merge(&graph).await.unwrap();
    mentions(Some("post")).merge(&graph).await.unwrap();
    assert_eq!(Mentions::get_count(&graph).await.unwrap(), 1);
}

#[tokio::test]
async fn test_relationship_set_on_create() {
    let graph = graph();
    let alice = person("Alice", 30).merge(&graph).await.unwrap();
    let bob = person("Bob", 40).merge(&graph).await.unwrap();

    let mut edge = follows(&alice, &bob, "web");
    edge.since = Some("2020".into());
    edge.merge(&graph).await.unwrap();
    edge.since = Some("2021".into());
    edge.merge(&graph).await.unwrap();

    let stored = Follows::match_relationships(&graph, None, None).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].since.as_deref(), Some("2020"));
    assert_eq!(stored[0].source.name, "Alice");
    assert_eq!(stored[0].target.name, "Bob");
}

#[tokio::test]
async fn test_relationship_needs_existing_endpoints() {
    let graph = graph();
    let alice = person("Alice", 30).merge(&graph).await.unwrap();
    follows(&alice, &person("Ghost", 0), "web").merge(&graph).await.unwrap();
    assert_eq!(Follows::get_count(&graph).await.unwrap(), 0);
}

#[tokio::test]
async fn test_relationship_merge_records() {
    let graph = graph();
    Person::merge_nodes(&graph, vec![person("Alice", 30), person("Bob", 40)])
        .await
        .unwrap();

    let Value::Object(record) = json!({"source": "Alice", "target": "Bob", "platform": "web"}) else {
        unreachable!()
    };
    Follows::merge_records(&graph, vec![record], &RecordOptions::default())
        .await
        .unwrap();
    assert_eq!(Follows::get_count(&graph).await.unwrap(), 1);

    let Value::Object(no_source) = json!({"target": "Bob", "platform": "web"}) else {
        unreachable!()
    };
    match Follows::merge_records(&graph, vec![no_source], &RecordOptions::default()).await {
        Err(NeontologyError::InvalidRecord(message)) => assert!(message.contains("source")),
        other => panic!("expected InvalidRecord, got {other:?}"),
    }
}

#[tokio::test]
async fn test_relationship_merge_df() {
    let graph = graph();
    Person::merge_nodes(&graph, vec![person("Alice", 30), person("Bob", 40)])
        .await
        .unwrap();
    let frame = Frame::new(
        vec!["source".into(), "target".into(), "platform".into()],
        vec![
            vec![json!("Alice"), json!("Bob"), json!("web")],
            vec![json!("Alice"), json!("Bob"), json!("web")],
            vec![json!("Bob"), json!("Alice"), json!("web")],
        ],
    )
    .unwrap();
    Follows::merge_df(&graph, &frame, &RecordOptions::default(), true)
        .await
        .unwrap();
    assert_eq!(Follows::get_count(&graph).await.unwrap(), 2);
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_get_related_depth_and_direction() {
    let graph = graph();
    let people = Person::merge_nodes(&graph, vec![person("A", 1), person("B", 2), person("C", 3)])
        .await
        .unwrap();
    Follows::merge_relationships(
        &graph,
        vec![
            follows(&people[0], &people[1], "web"),
            follows(&people[1], &people[2], "web"),
        ],
    )
    .await
    .unwrap();

    let one_hop = people[0].get_related(&graph, &RelatedOptions::default()).await.unwrap();
    assert_eq!(one_hop.relationships.len(), 1);
    let mut found: Vec<String> = one_hop.nodes.iter().map(|n| n.name()).collect();
    found.sort();
    assert_eq!(found, vec!["A", "B"]);
    assert_eq!(one_hop.records[0].nodes["o"].name(), "A");

    let two_hops = RelatedOptions {
        max_depth: 2,
        ..Default::default()
    };
    let result = people[0].get_related(&graph, &two_hops).await.unwrap();
    assert_eq!(result.relationships.len(), 2);
    assert_eq!(result.nodes.len(), 3);

    let both = RelatedOptions {
        incoming: true,
        ..Default::default()
    };
    let result = people[1].get_related(&graph, &both).await.unwrap();
    assert_eq!(result.relationships.len(), 2);

    let neither = RelatedOptions {
        outgoing: false,
        ..Default::default()
    };
    match people[0].get_related(&graph, &neither).await {
        Err(NeontologyError::NoDirection) => {}
        other => panic!("expected NoDirection, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_uninitialized_connection() {
    let graph = GraphConnection::new();
    match Person::get_count(&graph, &Filters::new()).await {
        Err(NeontologyError::NotInitialized) => {}
        other => panic!("expected NotInitialized, got {other:?}"),
    }

    graph.init(&EngineConfig::Memory).await.unwrap();
    assert_eq!(Person::get_count(&graph, &Filters::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_close_uninitializes() {
    let graph = graph();
    graph.close().await.unwrap();
    assert!(!graph.is_initialized());
    assert!(matches!(
        graph.verify_connection().await,
        Err(NeontologyError::NotInitialized)
    ));
}

#[tokio::test]
async fn test_change_engine_swaps_backend() {
    let graph = graph();
    person("Alice", 30).merge(&graph).await.unwrap();

    let previous = graph.engine().unwrap();
    graph.change_engine(&EngineConfig::Memory).await.unwrap();

    assert_eq!(Person::get_count(&graph, &Filters::new()).await.unwrap(), 0);
    assert!(matches!(
        previous.verify_connection().await,
        Err(NeontologyError::EngineClosed(_))
    ));
}

#[tokio::test]
async fn test_change_engine_requires_initialized() {
    let graph = GraphConnection::new();
    match graph.change_engine(&EngineConfig::Memory).await {
        Err(NeontologyError::NotInitialized) => {}
        other => panic!("expected NotInitialized, got {other:?}"),
    }
}

#[tokio::test]
async fn test_memory_engine_rejects_cypher() {
    let graph = graph();
    let err = graph.evaluate_query("MATCH (n) RETURN n").await.unwrap_err();
    assert!(err.is_not_implemented(), "{err}");
}

#[tokio::test]
async fn test_constraints_are_skipped_without_support() {
    let graph = graph();
    graph.register_node::<Person>();
    assert_eq!(graph.apply_constraints().await.unwrap(), 0);
    assert!(graph.get_constraints().await.unwrap_err().is_not_implemented());
}

#[tokio::test]
async fn test_schema_lists_outgoing_relationships() {
    let graph = graph();
    graph.register_relationship::<Follows>();

    let schema = Person::neontology_schema(Some(&graph)).unwrap();
    assert_eq!(schema.label, "Person");
    assert!(schema.md_node_table().contains("| name |"));
    assert!(schema.md_rel_tables(3).starts_with("### FOLLOWS"));

    let rel = Follows::neontology_schema().unwrap();
    assert_eq!(rel.relationship_type, "FOLLOWS");
    assert_eq!(rel.target_labels, vec!["Person".to_string()]);
}
