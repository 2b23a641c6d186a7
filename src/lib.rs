#![doc = r#"
A typed object-graph mapper for Cypher graph databases.

`neontology` lets you declare node and relationship types as plain `serde`
structs and persist them with idempotent merges. Each node type names a
primary label and a primary property that identifies it; each field can be
tagged to be written only when a node is created, only when it is matched,
or never. Backends are pluggable: Neo4j and Memgraph over [`neo4rs`] 0.8,
and an in-process engine for tests.

# Quick start

## Declare models

```rust,ignore
use neontology::prelude::*;

#[derive(Debug, Clone, Serialize, Deserialize, Node)]
#[neontology(label = "Person", primary_property = "name")]
struct Person {
    name: String,
    age: Option<i64>,
    #[neontology(set_on_create)]
    first_seen: Option<String>,
    #[neontology(set_on_match)]
    last_seen: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Relationship)]
#[neontology(type = "FOLLOWS")]
struct Follows {
    source: Person,
    target: Person,
    #[neontology(merge_on)]
    platform: String,
}
```

Generated code refers to `neontology_core`, so add both `neontology` and
`neontology-core` to your dependencies.

## Connect

```rust,no_run
use neontology::{EngineConfig, GraphConnection};

# async fn example() -> neontology::Result<()> {
// Reads NEONTOLOGY_ENGINE and the engine's variables, loading `.env` first.
let graph = GraphConnection::connect(&EngineConfig::from_env()?).await?;

// Or run in process:
let graph = GraphConnection::connect(&EngineConfig::Memory).await?;
# Ok(())
# }
```

A connection holds one engine at a time. [`GraphConnection::change_engine`]
swaps it, closing the previous one.

## Merge, match, delete

```rust,ignore
let alice = Person { name: "Alice".into(), age: Some(30), first_seen: None, last_seen: None };
let stored = alice.merge(&graph).await?;

let found: Option<Person> = Person::match_node(&graph, "Alice").await?;
let adults = Person::match_nodes(
    &graph,
    &MatchOptions::default().filters(Filters::new().and("age__gte", 18)?),
)
.await?;

Follows { source: alice.clone(), target: bob.clone(), platform: "web".into() }
    .merge(&graph)
    .await?;

Person::delete(&graph, "Alice").await?;
```

A merge matches the node on its primary label and primary property. Fields
tagged `set_on_create` are written when the node is created, fields tagged
`set_on_match` when it already existed, and every other non-null field
both times. Relationships merge between existing nodes, keyed on their type
and any `merge_on` fields.

## Run Cypher

```rust,ignore
let result = graph
    .evaluate_query(Query::new("MATCH (n:Person)-[r]->(o) RETURN n, r, o"))
    .await?;

let people: Vec<Person> = result.nodes_of::<Person>();
for warning in &result.warnings {
    eprintln!("{warning}");
}
```

Rows are materialized into the registered model types. Rows that cannot be
interpreted (unknown labels, relationships without both endpoints) are
dropped and reported on [`NeontologyResult::warnings`](neontology_core::NeontologyResult)
instead of failing the query.

# Filters

Filter keys are `field` or `field__lookup`:

| Lookup | Meaning |
|--------|---------|
| `exact` (default) | `n.field = value` |
| `iexact` | case-insensitive equality |
| `contains`, `icontains` | substring |
| `startswith`, `istartswith` | prefix |
| `gt`, `lt`, `gte`, `lte` | comparisons |
| `in` | membership in a list |
| `isnull` | `true` or `false` |

Engines that cannot evaluate a lookup fail with
[`NeontologyError::NotImplemented`].

# Error handling

Every operation returns [`Result`]. Validation errors from bulk input carry
the row they came from:

```text
Person::merge_records (row 3): serialization error: missing field `name`
```

[`neo4rs`]: https://docs.rs/neo4rs
"#]

extern crate self as neontology;

pub mod config;
pub mod connection;
pub mod engine;
pub mod import;
pub mod ops;
pub mod prelude;
pub mod related;

pub use neontology_macros::{related_nodes, related_property, Node, NodeUnion, Relationship};

pub use config::{EngineConfig, MemgraphConfig, Neo4jConfig};
pub use connection::GraphConnection;
pub use engine::{GraphEngine, MemgraphEngine, MemoryEngine, Neo4jEngine};
pub use import::{import_records, ImportOptions, ImportSummary};
pub use ops::{MatchOptions, NodeOps, RecordOptions, RelationshipOps};
pub use related::RelatedQuery;

pub use neontology_core::{
    Filters, Frame, NeontologyError, NeontologyResult, Properties, Query, RelatedOptions, Result,
};
