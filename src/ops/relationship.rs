//! Relationship persistence.

use async_trait::async_trait;
use serde_json::Value;

use neontology_core::cypher::{MergeRelationshipSpec, RelationshipRow};
use neontology_core::{
    EndpointRef, FieldUsage, Frame, MergeParameters, NeontologyError, NodeDescriptor, Properties,
    RelationshipDescriptor, RelationshipSchema, RelationshipType, Result, TypeRegistry,
};

use crate::connection::GraphConnection;

/// How raw `source` / `target` values in bulk records identify nodes.
///
/// Endpoint types default to the relationship's declared types, which must
/// then be a single concrete type each. Properties default to the endpoint
/// type's primary property.
#[derive(Debug, Clone, Default)]
pub struct RecordOptions {
    pub source_type: Option<&'static NodeDescriptor>,
    pub target_type: Option<&'static NodeDescriptor>,
    pub source_prop: Option<String>,
    pub target_prop: Option<String>,
}

/// One edge ready to merge: its endpoint stand-ins and property buckets.
pub(crate) struct EdgeParts {
    pub source: EndpointRef,
    pub target: EndpointRef,
    pub params: MergeParameters,
}

/// Merge edges of one relationship type, one statement per consecutive run
/// of identical (source type, source property, target type, target
/// property).
///
/// A null `merge_on` value can never match a stored edge, so every merge
/// would add another one; such edges are rejected before anything is sent.
pub(crate) async fn merge_edges(
    graph: &GraphConnection,
    rel_type: &str,
    usage: &FieldUsage,
    edges: Vec<EdgeParts>,
) -> Result<usize> {
    for (i, edge) in edges.iter().enumerate() {
        let missing = usage
            .merge_on
            .iter()
            .find(|k| edge.params.all_props.get(k.as_str()).map_or(true, Value::is_null));
        if let Some(key) = missing {
            return Err(NeontologyError::InvalidRecord(format!(
                "{rel_type} relationship {i} has no value for merge_on property '{key}'"
            )));
        }
    }

    let mut merged = 0;
    let mut edges = edges.into_iter().peekable();

    while let Some(first) = edges.next() {
        let spec = MergeRelationshipSpec {
            source_label: first.source.label()?.to_owned(),
            target_label: first.target.label()?.to_owned(),
            source_prop: first.source.property.clone(),
            target_prop: first.target.property.clone(),
            rel_type: rel_type.to_owned(),
            merge_on: usage.merge_on.clone(),
        };
        let same_group = |e: &EdgeParts| {
            e.source.descriptor == first.source.descriptor
                && e.target.descriptor == first.target.descriptor
                && e.source.property == spec.source_prop
                && e.target.property == spec.target_prop
        };

        let mut group = Vec::new();
        while let Some(next) = edges.next_if(same_group) {
            group.push(next);
        }
        let rows: Vec<_> = std::iter::once(first)
            .chain(group)
            .map(|e| RelationshipRow::new(e.source.value, e.target.value, e.params, &usage.merge_on))
            .collect();

        tracing::debug!(
            rel_type,
            source = %spec.source_label,
            target = %spec.target_label,
            count = rows.len(),
            "merging relationships"
        );
        merged += rows.len();
        graph.merge_relationships(&spec, rows).await?;
    }
    Ok(merged)
}

fn endpoint_type(
    explicit: Option<&'static NodeDescriptor>,
    accepted: &[&'static NodeDescriptor],
    default: impl FnOnce() -> Result<&'static NodeDescriptor>,
) -> Result<&'static NodeDescriptor> {
    match explicit {
        Some(d) if accepted.iter().any(|a| *a == d) => Ok(d),
        Some(d) => Err(NeontologyError::WrongEntityType {
            expected: accepted.iter().map(|a| a.type_name).collect::<Vec<_>>().join(" | "),
            got: d.type_name.to_owned(),
        }),
        None => default(),
    }
}

fn take_endpoint(record: &mut Properties, key: &str, row: usize) -> Result<Value> {
    match record.remove(key) {
        Some(Value::Null) | None => Err(NeontologyError::InvalidRecord(format!(
            "row {row} has no '{key}' value"
        ))),
        Some(value) => Ok(value),
    }
}

/// Validate relationship records for `descriptor` and merge them.
pub(crate) async fn merge_relationship_records(
    graph: &GraphConnection,
    descriptor: &'static RelationshipDescriptor,
    records: Vec<Properties>,
    options: &RecordOptions,
) -> Result<usize> {
    graph.registry().register_relationship_descriptor(descriptor);
    let edges = relationship_edges(descriptor, records, options)?;
    merge_edges(graph, descriptor.relationship_type, &descriptor.usage, edges).await
}

/// Validate relationship records into mergeable edges without touching the
/// backend.
pub(crate) fn relationship_edges(
    descriptor: &'static RelationshipDescriptor,
    records: Vec<Properties>,
    options: &RecordOptions,
) -> Result<Vec<EdgeParts>> {
    let source_type = endpoint_type(options.source_type, &descriptor.source_types, || descriptor.default_source())?;
    let target_type = endpoint_type(options.target_type, &descriptor.target_types, || descriptor.default_target())?;
    let source_prop = match &options.source_prop {
        Some(p) => p.clone(),
        None => source_type.require_primary_property()?.to_owned(),
    };
    let target_prop = match &options.target_prop {
        Some(p) => p.clone(),
        None => target_type.require_primary_property()?.to_owned(),
    };

    records
        .into_iter()
        .enumerate()
        .map(|(i, mut record)| {
            let source = take_endpoint(&mut record, "source", i)?;
            let target = take_endpoint(&mut record, "target", i)?;
            let props = (descriptor.validate)(record)
                .map_err(|e| e.with_context(format!("{}::merge_records (row {i})", descriptor.type_name)))?;
            Ok(EdgeParts {
                source: EndpointRef {
                    descriptor: source_type,
                    property: source_prop.clone(),
                    value: source,
                },
                target: EndpointRef {
                    descriptor: target_type,
                    property: target_prop.clone(),
                    value: target,
                },
                params: MergeParameters::build(&props, &descriptor.usage, &[]),
            })
        })
        .collect()
}

/// Merge and match relationships of a declared type.
#[async_trait]
pub trait RelationshipOps: RelationshipType {
    /// Merge this edge between its (existing) endpoints.
    async fn merge(&self, graph: &GraphConnection) -> Result<()> {
        Self::merge_relationships(graph, vec![self.clone()]).await
    }

    /// Merge every edge. Edges are batched per consecutive run of the same
    /// concrete endpoint types.
    async fn merge_relationships(graph: &GraphConnection, relationships: Vec<Self>) -> Result<()> {
        if relationships.is_empty() {
            return Ok(());
        }
        graph.register_relationship::<Self>();

        let edges = relationships
            .iter()
            .map(|rel| {
                let (source, target) = rel.endpoints()?;
                Ok(EdgeParts {
                    source,
                    target,
                    params: rel.relationship_merge_parameters()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        merge_edges(graph, Self::RELATIONSHIP_TYPE, Self::field_usage(), edges).await?;
        Ok(())
    }

    /// Merge property maps whose `source` and `target` hold endpoint
    /// identity values.
    async fn merge_records(graph: &GraphConnection, records: Vec<Properties>, options: &RecordOptions) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        merge_relationship_records(graph, Self::relationship_descriptor(), records, options).await?;
        Ok(())
    }

    /// Merge the rows of a frame with `source` and `target` columns.
    async fn merge_df(graph: &GraphConnection, frame: &Frame, options: &RecordOptions, deduplicate: bool) -> Result<()> {
        if frame.is_empty() {
            return Ok(());
        }
        let records = if deduplicate {
            frame.deduplicate().0
        } else {
            frame.records()
        };
        Self::merge_records(graph, records, options).await
    }

    /// Edges of this type with their endpoints, in backend order.
    async fn match_relationships(graph: &GraphConnection, limit: Option<u64>, skip: Option<u64>) -> Result<Vec<Self>> {
        graph.register_relationship::<Self>();
        let result = graph.match_relationships(Self::RELATIONSHIP_TYPE, limit, skip).await?;
        Ok(result
            .records
            .iter()
            .filter_map(|row| row.relationships.get("r"))
            .filter_map(|rel| rel.downcast_ref::<Self>())
            .cloned()
            .collect())
    }

    async fn get_count(graph: &GraphConnection) -> Result<u64> {
        graph.count_relationships(Self::RELATIONSHIP_TYPE).await
    }

    fn neontology_schema() -> Result<RelationshipSchema> {
        let mut registry = TypeRegistry::new();
        registry.add_relationship(Self::relationship_descriptor());
        registry
            .relationship(Self::RELATIONSHIP_TYPE)
            .map(RelationshipSchema::from_type_data)
            .ok_or_else(|| NeontologyError::UnknownRelationshipType(Self::RELATIONSHIP_TYPE.to_owned()))
    }
}

impl<R: RelationshipType> RelationshipOps for R {}
