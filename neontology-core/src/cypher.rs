//! Cypher statement builders shared by every Cypher-speaking engine.
//!
//! Each builder returns a [`Query`] whose text only interpolates escaped
//! identifiers (labels, relationship types, property keys); every value
//! travels as a parameter.

use serde::Serialize;
use serde_json::Value;

use crate::entity::MergeParameters;
use crate::error::{NeontologyError, Result};
use crate::filter::Filters;
use crate::identifier::escape_identifier;
use crate::query::Query;
use crate::value::Properties;

/// Placeholder standing for "this node, matched on its primary property"
/// inside related-query Cypher.
pub const THIS_NODE: &str = "#ThisNode";

/// Parameter carrying the primary value substituted for [`THIS_NODE`].
pub const THIS_NODE_PARAM: &str = "pp";

/// `:A:B` for the given labels.
pub fn label_expression(labels: &[&str]) -> String {
    labels.iter().map(|l| format!(":{}", escape_identifier(l))).collect()
}

// ---------------------------------------------------------------------------
// Row bundles
// ---------------------------------------------------------------------------

/// One node to create: its primary value and every other property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateRow {
    pub pp: Value,
    pub props: Properties,
}

/// One node to merge: its primary value and lifecycle buckets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeRow {
    pub pp: Value,
    pub always_set: Properties,
    pub set_on_create: Properties,
    pub set_on_match: Properties,
}

impl MergeRow {
    pub fn new(pp: Value, params: MergeParameters) -> Self {
        MergeRow {
            pp,
            always_set: params.always_set,
            set_on_create: params.set_on_create,
            set_on_match: params.set_on_match,
        }
    }
}

/// One relationship to merge between two existing nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipRow {
    /// Value of the source node's matching property.
    pub source_prop: Value,
    /// Value of the target node's matching property.
    pub target_prop: Value,
    /// Values of the merge-on keys, part of the edge identity.
    pub merge_on: Properties,
    pub always_set: Properties,
    pub set_on_create: Properties,
    pub set_on_match: Properties,
}

impl RelationshipRow {
    /// Split merge parameters, moving the `merge_on` keys into the edge
    /// identity.
    pub fn new(source_prop: Value, target_prop: Value, params: MergeParameters, merge_on: &[String]) -> Self {
        let merge_on = merge_on
            .iter()
            .map(|k| (k.clone(), params.all_props.get(k).cloned().unwrap_or(Value::Null)))
            .collect();
        RelationshipRow {
            source_prop,
            target_prop,
            merge_on,
            always_set: params.always_set,
            set_on_create: params.set_on_create,
            set_on_match: params.set_on_match,
        }
    }
}

/// Everything needed to merge a batch of relationships of one type between
/// one concrete (source, target) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRelationshipSpec {
    pub source_label: String,
    pub target_label: String,
    pub source_prop: String,
    pub target_prop: String,
    pub rel_type: String,
    pub merge_on: Vec<String>,
}

fn rows_param<T: Serialize>(rows: &[T]) -> Result<Value> {
    Ok(serde_json::to_value(rows)?)
}

// ---------------------------------------------------------------------------
// Node statements
// ---------------------------------------------------------------------------

pub fn create_nodes(labels: &[&str], pp_key: &str, rows: &[CreateRow]) -> Result<Query> {
    let cypher = format!(
        "UNWIND $node_list AS node \
         CREATE (n{} {{{}: node.pp}}) \
         SET n += node.props \
         RETURN n",
        label_expression(labels),
        escape_identifier(pp_key),
    );
    Ok(Query::new(cypher).param("node_list", rows_param(rows)?))
}

pub fn merge_nodes(labels: &[&str], pp_key: &str, rows: &[MergeRow]) -> Result<Query> {
    let cypher = format!(
        "UNWIND $node_list AS node \
         MERGE (n{} {{{}: node.pp}}) \
         ON MATCH SET n += node.set_on_match \
         ON CREATE SET n += node.set_on_create \
         SET n += node.always_set \
         RETURN n",
        label_expression(labels),
        escape_identifier(pp_key),
    );
    Ok(Query::new(cypher).param("node_list", rows_param(rows)?))
}

pub fn delete_nodes(label: &str, pp_key: &str, pp_values: Vec<Value>) -> Query {
    let cypher = format!(
        "UNWIND $pp_values AS pp \
         MATCH (n:{}) \
         WHERE n.{} = pp \
         DETACH DELETE n",
        escape_identifier(label),
        escape_identifier(pp_key),
    );
    Query::new(cypher).param("pp_values", pp_values)
}

fn paginate(mut query: Query, skip: Option<u64>, limit: Option<u64>) -> Query {
    if let Some(skip) = skip {
        query.cypher.push_str(" SKIP $skip");
        query = query.param("skip", skip);
    }
    if let Some(limit) = limit {
        query.cypher.push_str(" LIMIT $limit");
        query = query.param("limit", limit);
    }
    query
}

/// Match nodes by primary label, newest first.
pub fn match_nodes(label: &str, limit: Option<u64>, skip: Option<u64>, filters: &Filters) -> Query {
    let (where_clause, params) = filters.where_clause("n");
    let cypher = format!(
        "MATCH (n:{}) {where_clause} RETURN n ORDER BY id(n) DESC",
        escape_identifier(label)
    );
    paginate(Query::new(cypher).params(params), skip, limit)
}

/// Look up one node by primary value.
pub fn match_node(label: &str, pp_key: &str, pp_value: Value) -> Query {
    let cypher = format!(
        "MATCH (n:{}) WHERE n.{} = $pp RETURN n LIMIT 1",
        escape_identifier(label),
        escape_identifier(pp_key),
    );
    Query::new(cypher).param("pp", pp_value)
}

pub fn count_nodes(label: &str, filters: &Filters) -> Query {
    let (where_clause, params) = filters.where_clause("n");
    let cypher = format!(
        "MATCH (n:{}) {where_clause} RETURN COUNT(DISTINCT n)",
        escape_identifier(label)
    );
    Query::new(cypher).params(params)
}

// ---------------------------------------------------------------------------
// Relationship statements
// ---------------------------------------------------------------------------

pub fn merge_relationships(spec: &MergeRelationshipSpec, rows: &[RelationshipRow]) -> Result<Query> {
    let merge_props = spec
        .merge_on
        .iter()
        .map(|k| format!("{}: rel.merge_on.{}", escape_identifier(k), escape_identifier(k)))
        .collect::<Vec<_>>()
        .join(", ");
    let merge_props = if merge_props.is_empty() {
        String::new()
    } else {
        format!(" {{{merge_props}}}")
    };

    let cypher = format!(
        "UNWIND $rel_list AS rel \
         MATCH (source:{}) WHERE source.{} = rel.source_prop \
         MATCH (target:{}) WHERE target.{} = rel.target_prop \
         MERGE (source)-[r:{}{merge_props}]->(target) \
         ON MATCH SET r += rel.set_on_match \
         ON CREATE SET r += rel.set_on_create \
         SET r += rel.always_set",
        escape_identifier(&spec.source_label),
        escape_identifier(&spec.source_prop),
        escape_identifier(&spec.target_label),
        escape_identifier(&spec.target_prop),
        escape_identifier(&spec.rel_type),
    );
    Ok(Query::new(cypher).param("rel_list", rows_param(rows)?))
}

/// Every edge of a type with both endpoints.
pub fn match_relationships(rel_type: &str, limit: Option<u64>, skip: Option<u64>) -> Query {
    let cypher = format!(
        "MATCH (n)-[r:{}]->(o) RETURN DISTINCT n, r, o",
        escape_identifier(rel_type)
    );
    paginate(Query::new(cypher), skip, limit)
}

pub fn count_relationships(rel_type: &str) -> Query {
    Query::new(format!(
        "MATCH ()-[r:{}]->() RETURN COUNT(DISTINCT r)",
        escape_identifier(rel_type)
    ))
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// Options for a relationship traversal starting at one node.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedOptions {
    /// Relationship types to follow; empty means any.
    pub relationship_types: Vec<String>,
    /// Exact-match property filters every traversed edge must satisfy.
    pub relationship_properties: Properties,
    /// Primary label the far node must carry.
    pub target_label: Option<String>,
    pub outgoing: bool,
    pub incoming: bool,
    pub min_depth: u32,
    pub max_depth: u32,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub distinct: bool,
}

impl Default for RelatedOptions {
    fn default() -> Self {
        RelatedOptions {
            relationship_types: Vec::new(),
            relationship_properties: Properties::new(),
            target_label: None,
            outgoing: true,
            incoming: false,
            min_depth: 1,
            max_depth: 1,
            limit: None,
            skip: None,
            distinct: false,
        }
    }
}

impl RelatedOptions {
    /// Fail with [`NeontologyError::NoDirection`] when neither direction is
    /// requested, and normalize an inverted depth range.
    pub fn validate(&self) -> Result<(u32, u32)> {
        if !self.outgoing && !self.incoming {
            return Err(NeontologyError::NoDirection);
        }
        let min = self.min_depth;
        let max = self.max_depth.max(min);
        Ok((min, max))
    }

    /// Whether an edge of `rel_type` carrying `props` may be traversed.
    pub fn accepts_edge(&self, rel_type: &str, props: &Properties) -> bool {
        (self.relationship_types.is_empty() || self.relationship_types.iter().any(|t| t == rel_type))
            && self
                .relationship_properties
                .iter()
                .all(|(k, v)| props.get(k).map_or(false, |p| crate::filter::values_equal(p, v)))
    }
}

/// Traverse from the node `label`.`pp_key` = `pp_value`.
///
/// Each output row holds the origin `o`, the far node `n`, one edge `r` of
/// the traversed path and that edge's endpoints as `r_source`/`r_target`, so
/// every edge materializes with both of its nodes present.
pub fn get_related(label: &str, pp_key: &str, pp_value: Value, options: &RelatedOptions) -> Result<Query> {
    let (min, max) = options.validate()?;

    let types = options
        .relationship_types
        .iter()
        .map(|t| escape_identifier(t).into_owned())
        .collect::<Vec<_>>()
        .join("|");
    let types = if types.is_empty() { types } else { format!(":{types}") };

    let (left, right) = match (options.outgoing, options.incoming) {
        (true, false) => ("-", "->"),
        (false, true) => ("<-", "-"),
        _ => ("-", "-"),
    };

    let target = match &options.target_label {
        Some(l) => format!("n:{}", escape_identifier(l)),
        None => "n".to_owned(),
    };

    let mut query = Query::new(format!(
        "MATCH (o:{}) WHERE o.{} = $pp MATCH p = (o){left}[{types}*{min}..{max}]{right}({target})",
        escape_identifier(label),
        escape_identifier(pp_key),
    ))
    .param("pp", pp_value);

    if !options.relationship_properties.is_empty() {
        let predicates = options
            .relationship_properties
            .iter()
            .enumerate()
            .map(|(i, (k, v))| {
                let name = format!("rel_prop_{i}");
                query.params.insert(name.clone(), v.clone());
                format!("x.{} = ${name}", escape_identifier(k))
            })
            .collect::<Vec<_>>()
            .join(" AND ");
        query.cypher.push_str(&format!(" WHERE all(x IN relationships(p) WHERE {predicates})"));
    }

    query
        .cypher
        .push_str(if options.distinct { " WITH DISTINCT o, n, p" } else { " WITH o, n, p" });
    query = paginate(query, options.skip, options.limit);
    query.cypher.push_str(
        " UNWIND relationships(p) AS r RETURN o, n, r, startNode(r) AS r_source, endNode(r) AS r_target",
    );
    Ok(query)
}

/// Replace [`THIS_NODE`] with a pattern binding `ThisNode` to the node
/// `label`.`pp_key` = `$pp`.
///
/// ```rust
/// # use neontology_core::cypher::substitute_this_node;
/// let cypher = substitute_this_node("MATCH #ThisNode-[:FOLLOWS]->(o) RETURN o", "Person", "name");
/// assert_eq!(cypher, "MATCH (ThisNode:Person {name: $pp})-[:FOLLOWS]->(o) RETURN o");
/// ```
pub fn substitute_this_node(cypher: &str, label: &str, pp_key: &str) -> String {
    cypher.replace(
        THIS_NODE,
        &format!(
            "(ThisNode:{} {{{}: ${THIS_NODE_PARAM}}})",
            escape_identifier(label),
            escape_identifier(pp_key)
        ),
    )
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

pub fn apply_constraint(label: &str, property: &str) -> Query {
    Query::new(format!(
        "CREATE CONSTRAINT IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE",
        escape_identifier(label),
        escape_identifier(property)
    ))
}

pub fn drop_constraint(name: &str) -> Query {
    Query::new(format!("DROP CONSTRAINT {}", escape_identifier(name)))
}

pub fn get_constraints() -> Query {
    Query::new("SHOW CONSTRAINTS YIELD name RETURN COLLECT(DISTINCT name)")
}
