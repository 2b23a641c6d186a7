use std::sync::Arc;

use neontology::prelude::*;
use neontology::{import_records, ImportOptions, MemoryEngine};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize, Node)]
#[neontology(label = "PersonImport", primary_property = "name")]
struct PersonImport {
    name: String,
    age: Option<i64>,
    #[neontology(never_set)]
    #[serde(default)]
    element_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Relationship)]
#[neontology(type = "IMPORT_FOLLOWS")]
struct FollowsImport {
    source: PersonImport,
    target: PersonImport,
    note: Option<String>,
}

fn graph() -> GraphConnection {
    let graph = GraphConnection::with_engine(Arc::new(MemoryEngine::new()));
    graph
        .register_node::<PersonImport>()
        .register_relationship::<FollowsImport>();
    graph
}

async fn counts(graph: &GraphConnection) -> (u64, u64) {
    (
        PersonImport::get_count(graph, &Filters::new()).await.unwrap(),
        FollowsImport::get_count(graph).await.unwrap(),
    )
}

fn link_data() -> serde_json::Value {
    json!({
        "nodes": [
            {"LABEL": "PersonImport", "name": "Alice", "age": 76},
            {"LABEL": "PersonImport", "name": "Bob", "age": 84},
        ],
        "edges": [
            {
                "RELATIONSHIP_TYPE": "IMPORT_FOLLOWS",
                "SOURCE_LABEL": "PersonImport",
                "TARGET_LABEL": "PersonImport",
                "source": "Bob",
                "target": "Alice",
                "note": "since school",
            }
        ],
    })
}

#[tokio::test]
async fn test_import_link_data() {
    let graph = graph();
    let summary = import_records(&graph, vec![link_data()], &ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.nodes, 2);
    assert_eq!(summary.relationships, 1);
    assert!(summary.warnings.is_empty());
    assert_eq!(counts(&graph).await, (2, 1));

    let stored = FollowsImport::match_relationships(&graph, None, None).await.unwrap();
    assert_eq!(stored[0].note.as_deref(), Some("since school"));
}

#[tokio::test]
async fn test_import_is_idempotent() {
    let graph = graph();
    let options = ImportOptions::default();
    import_records(&graph, vec![link_data()], &options).await.unwrap();
    import_records(&graph, vec![link_data()], &options).await.unwrap();
    assert_eq!(counts(&graph).await, (2, 1));
}

#[tokio::test]
async fn test_dump_reimports_into_fresh_graph() {
    let source = graph();
    import_records(&source, vec![link_data()], &ImportOptions::default())
        .await
        .unwrap();

    let result = source.match_relationships("IMPORT_FOLLOWS", None, None).await.unwrap();
    let dump = result.neontology_dump().unwrap();
    assert_eq!(dump["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(dump["edges"][0]["RELATIONSHIP_TYPE"], json!("IMPORT_FOLLOWS"));
    assert_eq!(dump["edges"][0]["source"], json!("Bob"));

    let copy = graph();
    import_records(&copy, vec![dump], &ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(counts(&copy).await, (2, 1));
}

#[tokio::test]
async fn test_import_sub_records_with_target_nodes() {
    let graph = graph();
    let record = json!({
        "LABEL": "PersonImport",
        "name": "Bob",
        "age": 84,
        "RELATIONSHIPS_OUT": [
            {
                "RELATIONSHIP_TYPE": "IMPORT_FOLLOWS",
                "TARGET_LABEL": "PersonImport",
                "TARGET_NODES": [{"LABEL": "PersonImport", "name": "Alice", "age": 76}],
                "note": "nested",
            }
        ],
    });

    let options = ImportOptions {
        error_on_unmatched: true,
        ..Default::default()
    };
    import_records(&graph, vec![record], &options).await.unwrap();
    assert_eq!(counts(&graph).await, (2, 1));

    let stored = FollowsImport::match_relationships(&graph, None, None).await.unwrap();
    assert_eq!(stored[0].source.name, "Bob");
    assert_eq!(stored[0].target.name, "Alice");
}

#[tokio::test]
async fn test_import_sub_records_with_targets() {
    let graph = graph();
    let records = json!([
        {
            "LABEL": "PersonImport",
            "name": "Bob",
            "RELATIONSHIPS_OUT": [
                {"RELATIONSHIP_TYPE": "IMPORT_FOLLOWS", "TARGET_LABEL": "PersonImport", "TARGETS": ["Alice"]}
            ],
        },
        {"LABEL": "PersonImport", "name": "Alice"},
    ]);

    let options = ImportOptions {
        error_on_unmatched: true,
        ..Default::default()
    };
    import_records(&graph, vec![records], &options).await.unwrap();
    assert_eq!(counts(&graph).await, (2, 1));
}

#[tokio::test]
async fn test_unmatched_target_warns_by_default() {
    let graph = graph();
    let records = json!([
        {"LABEL": "PersonImport", "name": "Bob"},
        {
            "RELATIONSHIP_TYPE": "IMPORT_FOLLOWS",
            "SOURCE_LABEL": "PersonImport",
            "TARGET_LABEL": "PersonImport",
            "source": "Bob",
            "target": "Nobody",
        },
    ]);

    let summary = import_records(&graph, vec![records.clone()], &ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.warnings.len(), 1);
    assert!(summary.warnings[0].contains("Nobody"));
    assert_eq!(counts(&graph).await, (1, 0));

    let strict = ImportOptions {
        error_on_unmatched: true,
        ..Default::default()
    };
    match import_records(&graph, vec![records.clone()], &strict).await {
        Err(NeontologyError::UnmatchedTargets { count, target_label, .. }) => {
            assert_eq!(count, 1);
            assert_eq!(target_label, "PersonImport");
        }
        other => panic!("expected UnmatchedTargets, got {other:?}"),
    }

    let unchecked = ImportOptions {
        check_unmatched: false,
        error_on_unmatched: true,
        ..Default::default()
    };
    let summary = import_records(&graph, vec![records], &unchecked).await.unwrap();
    assert!(summary.warnings.is_empty());
}

#[tokio::test]
async fn test_validate_only_writes_nothing() {
    let graph = graph();
    let options = ImportOptions {
        validate_only: true,
        ..Default::default()
    };
    let summary = import_records(&graph, vec![link_data()], &options).await.unwrap();
    assert_eq!((summary.nodes, summary.relationships), (2, 1));
    assert_eq!(counts(&graph).await, (0, 0));
}

#[tokio::test]
async fn test_validate_only_still_rejects_bad_records() {
    let graph = graph();
    let options = ImportOptions {
        validate_only: true,
        ..Default::default()
    };

    let no_target_label = json!({
        "RELATIONSHIP_TYPE": "IMPORT_FOLLOWS",
        "SOURCE_LABEL": "PersonImport",
        "source": "Bob",
        "target": "Alice",
    });
    match import_records(&graph, vec![no_target_label], &options).await {
        Err(NeontologyError::InvalidRecord(message)) => assert!(message.contains("TARGET_LABEL")),
        other => panic!("expected InvalidRecord, got {other:?}"),
    }

    let unknown_type = json!({
        "RELATIONSHIP_TYPE": "KNOWS",
        "SOURCE_LABEL": "PersonImport",
        "TARGET_LABEL": "PersonImport",
        "source": "Bob",
        "target": "Alice",
    });
    match import_records(&graph, vec![unknown_type], &options).await {
        Err(NeontologyError::UnknownRelationshipType(t)) => assert_eq!(t, "KNOWS"),
        other => panic!("expected UnknownRelationshipType, got {other:?}"),
    }

    let bad_node = json!({"LABEL": "PersonImport", "age": 3});
    assert!(import_records(&graph, vec![bad_node], &options).await.is_err());
}
