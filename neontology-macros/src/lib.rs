
//! Procedural macros for neontology.
//!
//! This crate is not meant to be used directly. Use the [`neontology`] facade
//! crate, which re-exports all macros.
//!
//! Generated code refers to `neontology_core`, so a crate deriving models
//! depends on both `neontology` and `neontology-core`.

extern crate proc_macro;

use proc_macro::TokenStream;

mod attrs;
mod node;
mod node_union;
mod relationship;
mod related;

/// Derive [`Entity`](neontology_core::entity::Entity) and
/// [`NodeClass`](neontology_core::node::NodeClass) for a struct, plus
/// [`NodeType`](neontology_core::node::NodeType) and
/// [`NodeRef`](neontology_core::node::NodeRef) when it declares a label.
///
/// The struct must also derive `Serialize`, `Deserialize`, `Clone` and
/// `Debug`. Property names are the serde wire names, so
/// `#[serde(rename = "...")]` is the alias mechanism.
///
/// # Attributes
///
/// **Struct-level:**
/// - `#[neontology(label = "...", primary_property = "...")]`: the primary
///   label and the identifying property. Both or neither; a struct with
///   neither is abstract and can only be extended.
/// - `#[neontology(secondary_labels(A, B))]`: extra labels, accumulated by
///   every type extending this one.
///
/// **Field-level:**
/// - `#[neontology(set_on_create)]`: written only when a merge creates the node.
/// - `#[neontology(set_on_match)]`: written only when a merge finds the node.
/// - `#[neontology(never_set)]`: never written (e.g. `element_id`).
/// - `#[neontology(extends)]` together with `#[serde(flatten)]`: inherit the
///   fields and secondary labels of another node type.
///
/// # Example
///
/// ```rust,ignore
/// use neontology::prelude::*;
///
/// #[derive(Debug, Clone, Serialize, Deserialize, Node)]
/// #[neontology(secondary_labels(Agent))]
/// struct AgentBase {
///     name: String,
/// }
///
/// #[derive(Debug, Clone, Serialize, Deserialize, Node)]
/// #[neontology(label = "Person", primary_property = "name")]
/// struct Person {
///     #[serde(flatten)]
///     #[neontology(extends)]
///     base: AgentBase,
///     age: Option<i64>,
///     #[neontology(set_on_create)]
///     first_seen: Option<String>,
/// }
/// ```
#[proc_macro_derive(Node, attributes(neontology))]
pub fn node(input: TokenStream) -> TokenStream {
    node::expand(input)
}

/// Derive [`Entity`](neontology_core::entity::Entity) and
/// [`RelationshipType`](neontology_core::relationship::RelationshipType) for
/// a struct with `source` and `target` fields.
///
/// Endpoints are concrete node types or `#[derive(NodeUnion)]` enums. The
/// struct must also derive `Serialize`, `Clone` and `Debug`; the remaining
/// fields are read back through a generated property type, so they must be
/// deserializable.
///
/// # Attributes
///
/// **Struct-level:**
/// - `#[neontology(type = "...")]`: the relationship type. Required.
///
/// **Field-level:**
/// - `#[neontology(merge_on)]`: part of the edge identity used by `MERGE`.
/// - `#[neontology(set_on_create)]`, `#[neontology(set_on_match)]`,
///   `#[neontology(never_set)]`: as for nodes.
///
/// # Example
///
/// ```rust,ignore
/// use neontology::prelude::*;
///
/// #[derive(Debug, Clone, Serialize, Deserialize, Relationship)]
/// #[neontology(type = "FOLLOWS")]
/// struct Follows {
///     source: Person,
///     target: Person,
///     #[neontology(merge_on)]
///     platform: String,
/// }
/// ```
#[proc_macro_derive(Relationship, attributes(neontology))]
pub fn relationship(input: TokenStream) -> TokenStream {
    relationship::expand(input)
}

/// Derive [`NodeRef`](neontology_core::node::NodeRef) for an enum whose
/// variants each hold one concrete node type.
///
/// Use it as a relationship endpoint that accepts any of the variants. Also
/// implements `Serialize` (as the held node) and `From` for every variant.
///
/// ```rust,ignore
/// #[derive(Debug, Clone, NodeUnion)]
/// enum Agent {
///     Person(Person),
///     Team(Team),
/// }
/// ```
#[proc_macro_derive(NodeUnion)]
pub fn node_union(input: TokenStream) -> TokenStream {
    node_union::expand(input)
}

/// Turn a method returning a `RelatedQuery`
/// into an async method that runs it and returns the nodes it yields.
///
/// Use `#ThisNode` in the Cypher to refer to the receiver. With a type
/// argument, `#[related_nodes(Person)]`, only nodes of that type are returned.
///
/// ```rust,ignore
/// impl Person {
///     #[related_nodes(Person)]
///     fn follows(&self) -> RelatedQuery {
///         RelatedQuery::new("MATCH #ThisNode-[:FOLLOWS]->(o) RETURN o")
///     }
/// }
///
/// let followed: Vec<Person> = alice.follows(&graph).await?;
/// ```
#[proc_macro_attribute]
pub fn related_nodes(attr: TokenStream, item: TokenStream) -> TokenStream {
    related::expand(attr, item, related::Output::Nodes)
}

/// Turn a method returning a `RelatedQuery`
/// into an async method that runs it and returns the single value it yields.
///
/// With a type argument, `#[related_property(i64)]`, the value is
/// deserialized into that type.
///
/// ```rust,ignore
/// impl Person {
///     #[related_property(i64)]
///     fn follower_count(&self) -> RelatedQuery {
///         RelatedQuery::new("MATCH #ThisNode<-[:FOLLOWS]-(o) RETURN COUNT(o)")
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn related_property(attr: TokenStream, item: TokenStream) -> TokenStream {
    related::expand(attr, item, related::Output::Property)
}
