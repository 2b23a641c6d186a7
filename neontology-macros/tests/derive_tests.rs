use std::sync::Arc;

use neontology_core::entity::Entity;
use neontology_core::node::{GraphNode, NodeClass, NodeRef, NodeType};
use neontology_core::relationship::{validate_relationship, GraphRelationship, RelationshipType};
use neontology_core::{NeontologyError, Properties};
use neontology_macros::{Node, NodeUnion, Relationship};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize, Node)]
#[neontology(secondary_labels(Agent))]
struct AgentBase {
    name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Node)]
#[neontology(label = "Person", primary_property = "name", secondary_labels(Human))]
struct Person {
    #[serde(flatten)]
    #[neontology(extends)]
    base: AgentBase,
    age: Option<i64>,
    #[neontology(set_on_create)]
    first_seen: Option<String>,
    #[neontology(set_on_match)]
    last_seen: Option<String>,
    #[neontology(never_set)]
    #[serde(default)]
    element_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Node)]
#[neontology(label = "Team", primary_property = "team_name")]
struct Team {
    #[serde(rename = "team_name")]
    name: String,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Clone, NodeUnion)]
enum Member {
    Person(Person),
    Team(Team),
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

#[derive(Debug, Clone, Serialize, Relationship)]
#[neontology(type = "MEMBER_OF")]
struct MemberOf {
    source: Member,
    target: Team,
    #[serde(rename = "joined")]
    joined_at: Option<String>,
}

fn person(name: &str) -> Person {
    Person {
        base: AgentBase { name: name.into() },
        age: Some(30),
        first_seen: None,
        last_seen: None,
        element_id: None,
    }
}

fn team(name: &str) -> Team {
    Team { name: name.into(), tags: vec!["core".into()] }
}

// --- Node descriptors ---

#[test]
fn test_node_constants() {
    assert_eq!(Person::PRIMARY_LABEL, "Person");
    assert_eq!(Person::PRIMARY_PROPERTY, "name");
    assert_eq!(Team::PRIMARY_PROPERTY, "team_name");
}

#[test]
fn test_secondary_labels_accumulate() {
    assert_eq!(Person::labels(), vec!["Person", "Human", "Agent"]);
    assert_eq!(Team::labels(), vec!["Team"]);
}

#[test]
fn test_abstract_node_has_no_label() {
    let descriptor = AgentBase::node_descriptor();
    assert!(descriptor.is_abstract());
    assert_eq!(descriptor.secondary_labels, vec!["Agent"]);
    match descriptor.require_label() {
        Err(NeontologyError::AbstractEntity(name)) => assert_eq!(name, "AgentBase"),
        other => panic!("expected AbstractEntity, got: {other:?}"),
    }
    assert!(descriptor.hydrate(Properties::new()).is_err());
}

#[test]
fn test_inheritance_chain() {
    let descriptor = Person::node_descriptor();
    assert!(descriptor.is_subclass_of(AgentBase::node_descriptor()));
    assert!(!Team::node_descriptor().is_subclass_of(AgentBase::node_descriptor()));
    assert!(descriptor.has_field("name"));
}

#[test]
fn test_field_usage() {
    let usage = Person::field_usage();
    assert!(usage.always_set.contains(&"name".to_string()));
    assert!(usage.always_set.contains(&"age".to_string()));
    assert_eq!(usage.set_on_create, vec!["first_seen"]);
    assert_eq!(usage.set_on_match, vec!["last_seen"]);
    assert_eq!(usage.never_set, vec!["element_id"]);
}

#[test]
fn test_field_specs_use_wire_names() {
    let specs = Team::field_specs();
    let name = specs.iter().find(|f| f.name == "name").unwrap();
    assert_eq!(name.wire_name, "team_name");
    assert!(name.required);
    let tags = specs.iter().find(|f| f.name == "tags").unwrap();
    assert!(!tags.required);
    assert_eq!(tags.type_repr, "Vec<String>");
}

// --- Node values ---

#[test]
fn test_engine_dict_flattens_parent() {
    let dict = person("Alice").engine_dict().unwrap();
    assert_eq!(dict.get("name"), Some(&json!("Alice")));
    assert_eq!(dict.get("age"), Some(&json!(30)));
    assert!(!dict.contains_key("first_seen"));
    assert!(!dict.contains_key("base"));
}

#[test]
fn test_primary_value_uses_alias() {
    assert_eq!(team("Core").primary_value().unwrap(), json!("Core"));
}

#[test]
fn test_merge_parameters_skip_primary_and_never_set() {
    let mut p = person("Alice");
    p.element_id = Some("12".into());
    let params = p.node_merge_parameters().unwrap();
    assert!(!params.always_set.contains_key("name"));
    assert_eq!(params.always_set.get("age"), Some(&json!(30)));
    assert!(params.set_on_create.contains_key("first_seen"));
    assert!(!params.all_props.contains_key("element_id"));
    assert_eq!(params.all_props.get("name"), Some(&json!("Alice")));
}

#[test]
fn test_hydrate_through_descriptor() {
    let mut props = Properties::new();
    props.insert("name".into(), json!("Bob"));
    props.insert("age".into(), json!(41));
    let node = Person::node_descriptor().hydrate(props).unwrap();
    let bob = node.downcast_ref::<Person>().unwrap();
    assert_eq!(bob.base.name, "Bob");
    assert_eq!(bob.age, Some(41));
    assert_eq!(node.dedup_key().unwrap(), ("Person", "string:Bob".to_string()));
}

#[test]
fn test_hydrate_validation_error() {
    let mut props = Properties::new();
    props.insert("age".into(), json!("old"));
    let err = Person::node_descriptor().hydrate(props).unwrap_err();
    assert!(err.to_string().contains("Person"));
}

// --- Node unions ---

#[test]
fn test_union_concrete_types() {
    assert_eq!(Member::declared_type(), "Member");
    let names: Vec<_> = Member::concrete_types().iter().map(|d| d.type_name).collect();
    assert_eq!(names, vec!["Person", "Team"]);
}

#[test]
fn test_union_delegates_to_variant() {
    let m: Member = team("Core").into();
    assert_eq!(m.endpoint_descriptor().type_name, "Team");
    assert_eq!(m.endpoint_value().unwrap(), json!("Core"));
    assert_eq!(serde_json::to_value(&m).unwrap()["team_name"], json!("Core"));
}

#[test]
fn test_union_from_graph_node() {
    let node: Arc<dyn GraphNode> = Arc::new(person("Alice"));
    match Member::from_graph_node(&node) {
        Some(Member::Person(p)) => assert_eq!(p.base.name, "Alice"),
        other => panic!("expected a Person member, got: {other:?}"),
    }
    assert!(Team::from_graph_node(&node).is_none());
}

// --- Relationships ---

#[test]
fn test_relationship_descriptor() {
    let descriptor = Follows::relationship_descriptor();
    assert_eq!(Follows::RELATIONSHIP_TYPE, "FOLLOWS");
    assert_eq!(descriptor.relationship_type, "FOLLOWS");
    assert_eq!(descriptor.source_type, "Person");
    assert_eq!(descriptor.default_target().unwrap().type_name, "Person");
    assert_eq!(descriptor.usage.merge_on, vec!["platform"]);
    assert_eq!(descriptor.usage.set_on_create, vec!["since"]);
    assert!(!descriptor.usage.always_set.contains(&"source".to_string()));
}

#[test]
fn test_union_endpoint_needs_explicit_type() {
    let descriptor = MemberOf::relationship_descriptor();
    assert_eq!(descriptor.source_types.len(), 2);
    assert!(descriptor.default_source().is_err());
    assert_eq!(descriptor.default_target().unwrap().type_name, "Team");
}

#[test]
fn test_relationship_from_parts() {
    let mut props = Properties::new();
    props.insert("platform".into(), json!("web"));
    let rel = Follows::from_parts(props, person("A"), person("B")).unwrap();
    assert_eq!(rel.platform, "web");
    assert_eq!(rel.target.base.name, "B");
    assert!(rel.since.is_none());
}

#[test]
fn test_relationship_properties_exclude_endpoints() {
    let rel = MemberOf {
        source: Member::Person(person("A")),
        target: team("Core"),
        joined_at: Some("2024".into()),
    };
    let props = GraphRelationship::properties(&rel).unwrap();
    assert_eq!(props.len(), 1);
    assert_eq!(props.get("joined"), Some(&json!("2024")));

    let record = (&rel as &dyn GraphRelationship).export_record().unwrap();
    assert_eq!(record["SOURCE_LABEL"], json!("Person"));
    assert_eq!(record["TARGET_LABEL"], json!("Team"));
    assert_eq!(record["source"], json!("A"));
}

#[test]
fn test_validate_relationship_requires_fields() {
    let err = validate_relationship::<Follows>(Properties::new()).unwrap_err();
    assert!(err.to_string().contains("platform"));

    let mut props = Properties::new();
    props.insert("platform".into(), json!("web"));
    props.insert("since".into(), serde_json::Value::Null);
    let stored = validate_relationship::<Follows>(props).unwrap();
    assert_eq!(stored.len(), 1);
}

#[test]
fn test_hydrate_relationship_checks_endpoint_types() {
    let a: Arc<dyn GraphNode> = Arc::new(person("A"));
    let core: Arc<dyn GraphNode> = Arc::new(team("Core"));
    let hydrate = Follows::relationship_descriptor().hydrate;

    let mut props = Properties::new();
    props.insert("platform".into(), json!("web"));
    assert!(hydrate(props.clone(), &a, &a).is_ok());
    match hydrate(props, &a, &core) {
        Err(NeontologyError::TypeMismatch { context, .. }) => assert_eq!(context, "target"),
        other => panic!("expected TypeMismatch, got: {other:?}"),
    }
}
