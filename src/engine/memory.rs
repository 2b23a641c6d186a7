//! An in-process graph.
//!
//! `MemoryEngine` stores nodes and edges in ordered maps and performs the
//! structural operations directly, with the same observable semantics as the
//! Cypher statements the other engines run: `SET n += map` removes keys
//! whose value is null, `MERGE` matches on every label and the identifying
//! properties, and deletes detach incident edges. It does not evaluate
//! Cypher text and has no constraints.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use neontology_core::cypher::{CreateRow, MergeRelationshipSpec, MergeRow, RelationshipRow};
use neontology_core::filter::values_equal;
use neontology_core::{
    Filters, Lookup, NeontologyError, Properties, Query, RawNode, RawRecord, RawRelationship, RawValue,
    RelatedOptions, Result,
};

use super::GraphEngine;

const NAME: &str = "memory";

/// Lookups evaluated by the in-memory engine. The case-insensitive string
/// lookups are not available.
pub const MEMORY_LOOKUPS: &[Lookup] = &[
    Lookup::Exact,
    Lookup::Contains,
    Lookup::StartsWith,
    Lookup::Gt,
    Lookup::Lt,
    Lookup::Gte,
    Lookup::Lte,
    Lookup::In,
    Lookup::IsNull,
];

#[derive(Debug, Clone)]
struct StoredNode {
    labels: Vec<String>,
    props: Properties,
}

#[derive(Debug, Clone)]
struct StoredEdge {
    rel_type: String,
    start: i64,
    end: i64,
    props: Properties,
}

#[derive(Debug, Default)]
struct Store {
    next_id: i64,
    nodes: BTreeMap<i64, StoredNode>,
    edges: BTreeMap<i64, StoredEdge>,
}

/// `SET x += map`: null values remove the key.
fn apply(props: &mut Properties, update: &Properties) {
    for (key, value) in update {
        if value.is_null() {
            props.remove(key);
        } else {
            props.insert(key.clone(), value.clone());
        }
    }
}

fn prop_equals(props: &Properties, key: &str, value: &Value) -> bool {
    props.get(key).map_or(false, |v| values_equal(v, value))
}

fn paginate<T>(items: impl Iterator<Item = T>, skip: Option<u64>, limit: Option<u64>) -> Vec<T> {
    let skipped = items.skip(skip.unwrap_or(0) as usize);
    match limit {
        Some(limit) => skipped.take(limit as usize).collect(),
        None => skipped.collect(),
    }
}

impl Store {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_node(&mut self, labels: &[&str], props: Properties) -> i64 {
        let id = self.allocate();
        let node = StoredNode {
            labels: labels.iter().map(|l| (*l).to_owned()).collect(),
            props,
        };
        self.nodes.insert(id, node);
        id
    }

    fn raw_node(&self, id: i64) -> Option<RawNode> {
        self.nodes.get(&id).map(|n| RawNode {
            id,
            labels: n.labels.clone(),
            properties: n.props.clone(),
        })
    }

    fn raw_edge(&self, id: i64) -> Option<RawRelationship> {
        self.edges.get(&id).map(|e| RawRelationship {
            id,
            rel_type: e.rel_type.clone(),
            start: e.start,
            end: e.end,
            properties: e.props.clone(),
        })
    }

    fn node_row(&self, id: i64) -> Option<RawRecord> {
        self.raw_node(id).map(|n| RawRecord::new().with("n", RawValue::Node(n)))
    }

    /// Ids of nodes carrying every label in `labels` whose `key` equals `value`.
    fn find_nodes(&self, labels: &[&str], key: &str, value: &Value) -> Vec<i64> {
        self.nodes
            .iter()
            .filter(|(_, n)| labels.iter().all(|l| n.labels.iter().any(|nl| nl == l)))
            .filter(|(_, n)| prop_equals(&n.props, key, value))
            .map(|(id, _)| *id)
            .collect()
    }

    fn labelled<'a>(&'a self, label: &'a str, filters: &'a Filters) -> impl Iterator<Item = i64> + 'a {
        self.nodes
            .iter()
            .rev()
            .filter(move |(_, n)| n.labels.iter().any(|l| l == label) && filters.matches(&n.props))
            .map(|(id, _)| *id)
    }

    fn detach_delete(&mut self, id: i64) {
        self.nodes.remove(&id);
        self.edges.retain(|_, e| e.start != id && e.end != id);
    }

    fn merge_edge(&mut self, spec: &MergeRelationshipSpec, start: i64, end: i64, row: &RelationshipRow) {
        let existing = self.edges.iter_mut().find(|(_, e)| {
            e.rel_type == spec.rel_type
                && e.start == start
                && e.end == end
                && row.merge_on.iter().all(|(k, v)| prop_equals(&e.props, k, v))
        });
        match existing {
            Some((_, edge)) => {
                apply(&mut edge.props, &row.set_on_match);
                apply(&mut edge.props, &row.always_set);
            }
            None => {
                let mut props = Properties::new();
                apply(&mut props, &row.merge_on);
                apply(&mut props, &row.set_on_create);
                apply(&mut props, &row.always_set);
                let id = self.allocate();
                self.edges.insert(
                    id,
                    StoredEdge {
                        rel_type: spec.rel_type.clone(),
                        start,
                        end,
                        props,
                    },
                );
            }
        }
    }

    /// Every path from `origin` within the depth range, as
    /// `(far node, edge ids)`, in a stable order. An edge appears at most once
    /// per path.
    fn paths(&self, origin: i64, options: &RelatedOptions, min: u32, max: u32) -> Vec<(i64, Vec<i64>)> {
        let mut out = Vec::new();
        let mut stack = vec![(origin, Vec::<i64>::new())];

        while let Some((node, path)) = stack.pop() {
            let depth = path.len() as u32;
            if depth >= min.max(1) && self.reaches_target(node, options) {
                out.push((node, path.clone()));
            }
            if depth >= max {
                continue;
            }

            let mut steps = Vec::new();
            for (id, edge) in &self.edges {
                if path.contains(id) || !options.accepts_edge(&edge.rel_type, &edge.props) {
                    continue;
                }
                if options.outgoing && edge.start == node {
                    steps.push((edge.end, *id));
                } else if options.incoming && edge.end == node {
                    steps.push((edge.start, *id));
                }
            }
            // Reversed so the lowest edge id is explored first.
            for (next, edge) in steps.into_iter().rev() {
                let mut extended = path.clone();
                extended.push(edge);
                stack.push((next, extended));
            }
        }
        out
    }

    fn reaches_target(&self, node: i64, options: &RelatedOptions) -> bool {
        match &options.target_label {
            Some(label) => self.nodes.get(&node).map_or(false, |n| n.labels.iter().any(|l| l == label)),
            None => true,
        }
    }
}

/// The in-process engine.
#[derive(Debug)]
pub struct MemoryEngine {
    store: Mutex<Option<Store>>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        MemoryEngine {
            store: Mutex::new(Some(Store::default())),
        }
    }

    fn with_store<T>(&self, f: impl FnOnce(&mut Store) -> T) -> Result<T> {
        let mut guard = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(store) => Ok(f(store)),
            None => Err(NeontologyError::EngineClosed(NAME.to_owned())),
        }
    }

    /// Number of stored nodes and edges.
    pub fn size(&self) -> Result<(usize, usize)> {
        self.with_store(|s| (s.nodes.len(), s.edges.len()))
    }
}

#[async_trait]
impl GraphEngine for MemoryEngine {
    fn name(&self) -> &'static str {
        NAME
    }

    fn supported_lookups(&self) -> &'static [Lookup] {
        MEMORY_LOOKUPS
    }

    async fn verify_connection(&self) -> Result<()> {
        self.with_store(|_| ())
    }

    async fn close(&self) -> Result<()> {
        let previous = self.store.lock().unwrap_or_else(PoisonError::into_inner).take();
        if previous.is_some() {
            tracing::info!(engine = NAME, "engine closed");
        }
        Ok(())
    }

    async fn execute(&self, _query: Query) -> Result<Vec<RawRecord>> {
        Err(NeontologyError::not_implemented("Cypher queries", NAME))
    }

    async fn create_nodes(&self, labels: &[&str], pp_key: &str, rows: Vec<CreateRow>) -> Result<Vec<RawRecord>> {
        tracing::debug!(engine = NAME, ?labels, rows = rows.len(), "create nodes");
        self.with_store(|s| {
            rows.into_iter()
                .filter_map(|row| {
                    let mut props = Properties::new();
                    props.insert(pp_key.to_owned(), row.pp);
                    apply(&mut props, &row.props);
                    let id = s.insert_node(labels, props);
                    s.node_row(id)
                })
                .collect()
        })
    }

    async fn merge_nodes(&self, labels: &[&str], pp_key: &str, rows: Vec<MergeRow>) -> Result<Vec<RawRecord>> {
        tracing::debug!(engine = NAME, ?labels, rows = rows.len(), "merge nodes");
        self.with_store(|s| {
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                let found = s.find_nodes(labels, pp_key, &row.pp);
                let ids = if found.is_empty() {
                    let mut props = Properties::new();
                    props.insert(pp_key.to_owned(), row.pp.clone());
                    apply(&mut props, &row.set_on_create);
                    apply(&mut props, &row.always_set);
                    vec![s.insert_node(labels, props)]
                } else {
                    for id in &found {
                        if let Some(node) = s.nodes.get_mut(id) {
                            apply(&mut node.props, &row.set_on_match);
                            apply(&mut node.props, &row.always_set);
                        }
                    }
                    found
                };
                out.extend(ids.into_iter().filter_map(|id| s.node_row(id)));
            }
            out
        })
    }

    async fn delete_nodes(&self, label: &str, pp_key: &str, pp_values: Vec<Value>) -> Result<()> {
        self.with_store(|s| {
            for value in &pp_values {
                for id in s.find_nodes(&[label], pp_key, value) {
                    s.detach_delete(id);
                }
            }
        })
    }

    async fn match_nodes(
        &self,
        label: &str,
        limit: Option<u64>,
        skip: Option<u64>,
        filters: &Filters,
    ) -> Result<Vec<RawRecord>> {
        filters.check_supported(MEMORY_LOOKUPS, NAME)?;
        self.with_store(|s| {
            let ids = paginate(s.labelled(label, filters), skip, limit);
            ids.into_iter().filter_map(|id| s.node_row(id)).collect()
        })
    }

    async fn match_node(&self, label: &str, pp_key: &str, pp_value: Value) -> Result<Vec<RawRecord>> {
        self.with_store(|s| {
            s.find_nodes(&[label], pp_key, &pp_value)
                .into_iter()
                .take(1)
                .filter_map(|id| s.node_row(id))
                .collect()
        })
    }

    async fn count_nodes(&self, label: &str, filters: &Filters) -> Result<u64> {
        filters.check_supported(MEMORY_LOOKUPS, NAME)?;
        self.with_store(|s| s.labelled(label, filters).count() as u64)
    }

    async fn merge_relationships(&self, spec: &MergeRelationshipSpec, rows: Vec<RelationshipRow>) -> Result<()> {
        tracing::debug!(engine = NAME, rel_type = %spec.rel_type, rows = rows.len(), "merge relationships");
        self.with_store(|s| {
            for row in &rows {
                let sources = s.find_nodes(&[spec.source_label.as_str()], &spec.source_prop, &row.source_prop);
                let targets = s.find_nodes(&[spec.target_label.as_str()], &spec.target_prop, &row.target_prop);
                for start in &sources {
                    for end in &targets {
                        s.merge_edge(spec, *start, *end, row);
                    }
                }
            }
        })
    }

    async fn match_relationships(&self, rel_type: &str, limit: Option<u64>, skip: Option<u64>) -> Result<Vec<RawRecord>> {
        self.with_store(|s| {
            let ids = s
                .edges
                .iter()
                .filter(|(_, e)| e.rel_type == rel_type)
                .map(|(id, _)| *id);
            paginate(ids, skip, limit)
                .into_iter()
                .filter_map(|id| {
                    let edge = s.raw_edge(id)?;
                    Some(
                        RawRecord::new()
                            .with("n", RawValue::Node(s.raw_node(edge.start)?))
                            .with("o", RawValue::Node(s.raw_node(edge.end)?))
                            .with("r", RawValue::Relationship(edge)),
                    )
                })
                .collect()
        })
    }

    async fn count_relationships(&self, rel_type: &str) -> Result<u64> {
        self.with_store(|s| s.edges.values().filter(|e| e.rel_type == rel_type).count() as u64)
    }

    async fn get_related(
        &self,
        label: &str,
        pp_key: &str,
        pp_value: Value,
        options: &RelatedOptions,
    ) -> Result<Vec<RawRecord>> {
        let (min, max) = options.validate()?;
        self.with_store(|s| {
            let mut rows = Vec::new();
            for origin in s.find_nodes(&[label], pp_key, &pp_value) {
                let paths = paginate(s.paths(origin, options, min, max).into_iter(), options.skip, options.limit);
                for (far, edges) in paths {
                    for edge_id in edges {
                        let row = (|| {
                            let edge = s.raw_edge(edge_id)?;
                            Some(
                                RawRecord::new()
                                    .with("o", RawValue::Node(s.raw_node(origin)?))
                                    .with("n", RawValue::Node(s.raw_node(far)?))
                                    .with("r_source", RawValue::Node(s.raw_node(edge.start)?))
                                    .with("r_target", RawValue::Node(s.raw_node(edge.end)?))
                                    .with("r", RawValue::Relationship(edge)),
                            )
                        })();
                        rows.extend(row);
                    }
                }
            }
            rows
        })
    }

    async fn apply_constraint(&self, _label: &str, _property: &str) -> Result<()> {
        Err(NeontologyError::not_implemented("constraints", NAME))
    }

    async fn drop_constraint(&self, _name: &str) -> Result<()> {
        Err(NeontologyError::not_implemented("constraints", NAME))
    }

    async fn get_constraints(&self) -> Result<Vec<String>> {
        Err(NeontologyError::not_implemented("constraints", NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(pairs: &[(&str, Value)]) -> Properties {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn merge_row(pp: &str, always: Properties, create: Properties, on_match: Properties) -> MergeRow {
        MergeRow {
            pp: json!(pp),
            always_set: always,
            set_on_create: create,
            set_on_match: on_match,
        }
    }

    #[tokio::test]
    async fn test_merge_lifecycle() {
        let engine = MemoryEngine::new();
        let first = merge_row(
            "A",
            props(&[("age", json!(1))]),
            props(&[("first", json!("x"))]),
            props(&[("last", json!("x"))]),
        );
        engine.merge_nodes(&["Person"], "name", vec![first]).await.unwrap();

        let second = merge_row(
            "A",
            props(&[("age", json!(2))]),
            props(&[("first", json!("y"))]),
            props(&[("last", json!("y"))]),
        );
        let rows = engine.merge_nodes(&["Person"], "name", vec![second]).await.unwrap();

        let Some(RawValue::Node(node)) = rows[0].get("n") else {
            panic!("expected a node column");
        };
        assert_eq!(node.properties["first"], json!("x"));
        assert_eq!(node.properties["last"], json!("y"));
        assert_eq!(node.properties["age"], json!(2));
        assert_eq!(engine.size().unwrap(), (1, 0));
    }

    #[tokio::test]
    async fn test_null_update_removes_property() {
        let engine = MemoryEngine::new();
        let row = merge_row("A", Properties::new(), props(&[("nick", json!("a"))]), Properties::new());
        engine.merge_nodes(&["Person"], "name", vec![row]).await.unwrap();
        let row = merge_row("A", Properties::new(), Properties::new(), props(&[("nick", Value::Null)]));
        let rows = engine.merge_nodes(&["Person"], "name", vec![row]).await.unwrap();
        let Some(RawValue::Node(node)) = rows[0].get("n") else {
            panic!("expected a node column");
        };
        assert!(!node.properties.contains_key("nick"));
    }

    #[tokio::test]
    async fn test_match_nodes_newest_first() {
        let engine = MemoryEngine::new();
        let rows = ["A", "B", "C"]
            .iter()
            .map(|n| CreateRow { pp: json!(n), props: Properties::new() })
            .collect();
        engine.create_nodes(&["Person"], "name", rows).await.unwrap();

        let found = engine.match_nodes("Person", Some(2), None, &Filters::new()).await.unwrap();
        let names: Vec<_> = found
            .iter()
            .filter_map(|r| match r.get("n") {
                Some(RawValue::Node(n)) => n.properties.get("name").cloned(),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec![json!("C"), json!("B")]);
    }

    #[tokio::test]
    async fn test_case_insensitive_lookup_not_implemented() {
        let engine = MemoryEngine::new();
        let filters = Filters::new().and("name__icontains", "a").unwrap();
        let err = engine.match_nodes("Person", None, None, &filters).await.unwrap_err();
        assert!(err.is_not_implemented());
    }

    #[tokio::test]
    async fn test_closed_engine() {
        let engine = MemoryEngine::new();
        engine.close().await.unwrap();
        engine.close().await.unwrap();
        assert!(matches!(
            engine.count_nodes("Person", &Filters::new()).await,
            Err(NeontologyError::EngineClosed(_))
        ));
    }

    #[tokio::test]
    async fn test_get_related_depth() {
        let engine = MemoryEngine::new();
        let rows = ["A", "B", "C"]
            .iter()
            .map(|n| CreateRow { pp: json!(n), props: Properties::new() })
            .collect();
        engine.create_nodes(&["Person"], "name", rows).await.unwrap();

        let spec = MergeRelationshipSpec {
            source_label: "Person".into(),
            target_label: "Person".into(),
            source_prop: "name".into(),
            target_prop: "name".into(),
            rel_type: "FOLLOWS".into(),
            merge_on: vec![],
        };
        let edge = |s: &str, t: &str| RelationshipRow {
            source_prop: json!(s),
            target_prop: json!(t),
            merge_on: Properties::new(),
            always_set: Properties::new(),
            set_on_create: Properties::new(),
            set_on_match: Properties::new(),
        };
        engine
            .merge_relationships(&spec, vec![edge("A", "B"), edge("B", "C")])
            .await
            .unwrap();

        let one_hop = engine
            .get_related("Person", "name", json!("A"), &RelatedOptions::default())
            .await
            .unwrap();
        assert_eq!(one_hop.len(), 1);

        let two_hops = RelatedOptions { max_depth: 2, ..Default::default() };
        let rows = engine.get_related("Person", "name", json!("A"), &two_hops).await.unwrap();
        // A-B as a path of its own, then A-B-C unwound into two rows.
        assert_eq!(rows.len(), 3);

        let incoming = RelatedOptions { outgoing: false, incoming: true, ..Default::default() };
        let rows = engine.get_related("Person", "name", json!("A"), &incoming).await.unwrap();
        assert!(rows.is_empty());
    }
}
