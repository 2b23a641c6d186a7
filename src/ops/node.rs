//! Node persistence.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use neontology_core::cypher::{CreateRow, MergeRow};
use neontology_core::materialize::hydrate_raw_node;
use neontology_core::value::typed_identity_key;
use neontology_core::{
    Filters, Frame, GraphNode, NeontologyError, NeontologyResult, NodeDescriptor, NodeSchema, NodeType,
    Properties, RawValue, RelatedOptions, Result,
};

use crate::connection::GraphConnection;

/// Pagination and filtering for [`NodeOps::match_nodes`].
#[derive(Debug, Clone, Default)]
pub struct MatchOptions {
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub filters: Filters,
}

impl MatchOptions {
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }
}

/// Nodes of type `T` in column `n`, one per row that carried one.
fn matched_nodes<T: NodeType>(result: &NeontologyResult) -> Vec<T> {
    result
        .records
        .iter()
        .filter_map(|row| row.nodes.get("n"))
        .filter_map(|node| node.downcast_ref::<T>())
        .cloned()
        .collect()
}

/// The written nodes of type `T`, one per value in `sent`, in input order.
///
/// Rows are hydrated one by one rather than through the deduplicated
/// envelope, so a batch that repeats a primary value gets each row's own
/// state back. Rows whose identity does not match the next input are extra
/// matches of an identity that is stored more than once and are skipped.
fn written_nodes<T: NodeType>(result: &NeontologyResult, sent: &[Value], what: &str) -> Result<Vec<T>> {
    let descriptor = T::node_descriptor();
    let mut rows = result.records_raw.iter().filter_map(|record| match record.get("n") {
        Some(RawValue::Node(raw)) => Some(raw),
        _ => None,
    });

    let mut nodes = Vec::with_capacity(sent.len());
    for (i, identity) in sent.iter().enumerate() {
        let wanted = typed_identity_key(identity);
        let node = loop {
            let Some(raw) = rows.next() else {
                let mut message = format!("{what}: {} node(s) sent, row {i} was not returned", sent.len());
                if !result.warnings.is_empty() {
                    message.push_str(&format!(" ({})", result.warnings.join("; ")));
                }
                return Err(NeontologyError::Mapping(message));
            };
            let node = hydrate_raw_node(raw, descriptor).map_err(|e| e.with_context(format!("{what} (row {i})")))?;
            if typed_identity_key(&node.identity_value()?) == wanted {
                break node;
            }
        };
        let node = node
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| NeontologyError::Mapping(format!("{what} (row {i}): returned node is not a {what}")))?;
        nodes.push(node);
    }
    Ok(nodes)
}

/// Merge type-erased nodes that all share `descriptor`.
pub(crate) async fn merge_graph_nodes(
    graph: &GraphConnection,
    descriptor: &'static NodeDescriptor,
    nodes: &[Arc<dyn GraphNode>],
) -> Result<NeontologyResult> {
    let pp_key = descriptor.require_primary_property()?;
    let labels = descriptor.labels();
    graph.registry().register_node_descriptor(descriptor);

    let rows = nodes
        .iter()
        .map(|node| {
            if node.descriptor() != descriptor {
                return Err(NeontologyError::WrongEntityType {
                    expected: descriptor.type_name.to_owned(),
                    got: node.descriptor().type_name.to_owned(),
                });
            }
            Ok(MergeRow::new(node.identity_value()?, node.lifecycle_parameters()?))
        })
        .collect::<Result<Vec<_>>>()?;

    graph.merge_nodes(&labels, pp_key, rows).await
}

/// Merge type-erased nodes of any concrete types, one batch per type.
pub(crate) async fn merge_mixed_nodes(graph: &GraphConnection, nodes: Vec<Arc<dyn GraphNode>>) -> Result<usize> {
    let mut groups: BTreeMap<&'static str, (&'static NodeDescriptor, Vec<Arc<dyn GraphNode>>)> = BTreeMap::new();
    for node in nodes {
        let descriptor = node.descriptor();
        groups
            .entry(descriptor.type_name)
            .or_insert_with(|| (descriptor, Vec::new()))
            .1
            .push(node);
    }

    let mut merged = 0;
    for (descriptor, group) in groups.into_values() {
        tracing::debug!(node_type = descriptor.type_name, count = group.len(), "merging nodes");
        merge_graph_nodes(graph, descriptor, &group).await?;
        merged += group.len();
    }
    Ok(merged)
}

/// Create, merge, match and delete nodes of a concrete type.
///
/// ```rust,ignore
/// let alice = Person { name: "Alice".into(), age: Some(30) };
/// let stored = alice.merge(&graph).await?;
/// let found = Person::match_node(&graph, "Alice").await?;
/// ```
#[async_trait]
pub trait NodeOps: NodeType {
    /// Insert this node unconditionally and return it as stored.
    async fn create(&self, graph: &GraphConnection) -> Result<Self> {
        Self::create_nodes(graph, vec![self.clone()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| NeontologyError::Mapping(format!("{} was not returned after create", Self::type_name())))
    }

    /// Upsert this node on its primary property and return it as stored.
    async fn merge(&self, graph: &GraphConnection) -> Result<Self> {
        Self::merge_nodes(graph, vec![self.clone()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| NeontologyError::Mapping(format!("{} was not returned after merge", Self::type_name())))
    }

    /// Insert every node in one statement.
    async fn create_nodes(graph: &GraphConnection, nodes: Vec<Self>) -> Result<Vec<Self>> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }
        graph.register_node::<Self>();

        let rows = nodes
            .iter()
            .map(|node| {
                let mut props = node.node_merge_parameters()?.all_props;
                let pp = props
                    .remove(Self::PRIMARY_PROPERTY)
                    .ok_or_else(|| NeontologyError::missing_property(Self::PRIMARY_PROPERTY, Self::PRIMARY_LABEL))?;
                Ok(CreateRow { pp, props })
            })
            .collect::<Result<Vec<_>>>()?;

        let sent: Vec<Value> = rows.iter().map(|row| row.pp.clone()).collect();
        let result = graph.create_nodes(&Self::labels(), Self::PRIMARY_PROPERTY, rows).await?;
        written_nodes(&result, &sent, Self::type_name())
    }

    /// Upsert every node in one statement. Output order follows input order.
    async fn merge_nodes(graph: &GraphConnection, nodes: Vec<Self>) -> Result<Vec<Self>> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }
        graph.register_node::<Self>();

        let rows = nodes
            .iter()
            .map(|node| Ok(MergeRow::new(node.primary_value()?, node.node_merge_parameters()?)))
            .collect::<Result<Vec<_>>>()?;

        let sent: Vec<Value> = rows.iter().map(|row| row.pp.clone()).collect();
        let result = graph.merge_nodes(&Self::labels(), Self::PRIMARY_PROPERTY, rows).await?;
        written_nodes(&result, &sent, Self::type_name())
    }

    /// Merge type-erased nodes, all of which must be `Self`.
    async fn merge_dyn_nodes(graph: &GraphConnection, nodes: &[Arc<dyn GraphNode>]) -> Result<Vec<Self>> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }
        let sent = nodes
            .iter()
            .map(|node| node.identity_value())
            .collect::<Result<Vec<_>>>()?;
        let result = merge_graph_nodes(graph, Self::node_descriptor(), nodes).await?;
        written_nodes(&result, &sent, Self::type_name())
    }

    /// Validate property maps into nodes, then merge them.
    async fn merge_records(graph: &GraphConnection, records: Vec<Properties>) -> Result<Vec<Self>> {
        let nodes = records
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                Self::from_properties(record)
                    .map_err(|e| e.with_context(format!("{}::merge_records (row {i})", Self::type_name())))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::merge_nodes(graph, nodes).await
    }

    /// Merge the rows of a frame. Row `i` of the output belongs to row `i`
    /// of the input; with `deduplicate`, identical rows are merged once and
    /// share the result.
    async fn merge_df(graph: &GraphConnection, frame: &Frame, deduplicate: bool) -> Result<Vec<Self>> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        if !deduplicate {
            return Self::merge_records(graph, frame.records()).await;
        }

        let (unique, positions) = frame.deduplicate();
        let merged = Self::merge_records(graph, unique).await?;
        positions
            .into_iter()
            .map(|i| {
                merged
                    .get(i)
                    .cloned()
                    .ok_or_else(|| NeontologyError::Mapping(format!("no merged node for frame row {i}")))
            })
            .collect()
    }

    /// The node with this primary value, if any.
    async fn match_node<V>(graph: &GraphConnection, pp: V) -> Result<Option<Self>>
    where
        V: Into<Value> + Send,
    {
        graph.register_node::<Self>();
        let result = graph.match_node(Self::PRIMARY_LABEL, Self::PRIMARY_PROPERTY, pp.into()).await?;
        Ok(matched_nodes(&result).into_iter().next())
    }

    /// Nodes of this type, newest first.
    async fn match_nodes(graph: &GraphConnection, options: &MatchOptions) -> Result<Vec<Self>> {
        graph.register_node::<Self>();
        let result = graph
            .match_nodes(Self::PRIMARY_LABEL, options.limit, options.skip, &options.filters)
            .await?;
        Ok(matched_nodes(&result))
    }

    /// Detach-delete the node with this primary value. Absent nodes are ignored.
    async fn delete<V>(graph: &GraphConnection, pp: V) -> Result<()>
    where
        V: Into<Value> + Send,
    {
        Self::delete_nodes(graph, vec![pp.into()]).await
    }

    async fn delete_nodes(graph: &GraphConnection, pp_values: Vec<Value>) -> Result<()> {
        if pp_values.is_empty() {
            return Ok(());
        }
        graph
            .delete_nodes(Self::PRIMARY_LABEL, Self::PRIMARY_PROPERTY, pp_values)
            .await
    }

    async fn get_count(graph: &GraphConnection, filters: &Filters) -> Result<u64> {
        graph.count_nodes(Self::PRIMARY_LABEL, filters).await
    }

    /// Traverse from this node. The result holds the origin under column
    /// `o`, the far node under `n` and each traversed edge under `r`.
    async fn get_related(&self, graph: &GraphConnection, options: &RelatedOptions) -> Result<NeontologyResult> {
        graph.register_node::<Self>();
        graph
            .get_related(Self::PRIMARY_LABEL, Self::PRIMARY_PROPERTY, self.primary_value()?, options)
            .await
    }

    /// Structural description of this type. With a connection, outgoing
    /// relationships are resolved from its registry.
    fn neontology_schema(graph: Option<&GraphConnection>) -> Result<NodeSchema> {
        let registry = graph.map(|g| {
            g.register_node::<Self>();
            g.registry().snapshot()
        });
        NodeSchema::new(Self::node_descriptor(), registry.as_ref())
    }
}

impl<T: NodeType> NodeOps for T {}
