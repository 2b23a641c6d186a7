//! Relationship model traits and descriptors.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use serde_json::Value;

use crate::entity::{Entity, MergeParameters};
use crate::error::{NeontologyError, Result};
use crate::fields::{FieldSpec, FieldUsage};
use crate::identifier::check_identifier;
use crate::node::{EndpointRef, GraphNode, NodeDescriptor, NodeRef};
use crate::value::{export_properties, Properties};

/// Function that rebuilds a relationship from backend properties and its
/// two hydrated endpoints.
pub type RelationshipHydrator =
    fn(Properties, &Arc<dyn GraphNode>, &Arc<dyn GraphNode>) -> Result<Arc<dyn GraphRelationship>>;

/// Function that validates a raw property record against the relationship's
/// declared fields and returns the storable properties.
pub type RelationshipValidator = fn(Properties) -> Result<Properties>;

/// Runtime description of a declared relationship type.
#[derive(Debug)]
pub struct RelationshipDescriptor {
    pub type_name: &'static str,
    pub relationship_type: &'static str,
    /// Declared endpoint types, possibly node unions.
    pub source_type: &'static str,
    pub target_type: &'static str,
    /// Concrete node types accepted at each end.
    pub source_types: Vec<&'static NodeDescriptor>,
    pub target_types: Vec<&'static NodeDescriptor>,
    pub fields: Vec<FieldSpec>,
    pub usage: FieldUsage,
    pub hydrate: RelationshipHydrator,
    pub validate: RelationshipValidator,
}

impl RelationshipDescriptor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        type_name: &'static str,
        relationship_type: &'static str,
        source_type: &'static str,
        target_type: &'static str,
        source_types: Vec<&'static NodeDescriptor>,
        target_types: Vec<&'static NodeDescriptor>,
        fields: Vec<FieldSpec>,
        hydrate: RelationshipHydrator,
        validate: RelationshipValidator,
    ) -> Self {
        check_identifier("relationship type", relationship_type);
        let usage = FieldUsage::classify(&fields);
        RelationshipDescriptor {
            type_name,
            relationship_type,
            source_type,
            target_type,
            source_types,
            target_types,
            fields,
            usage,
            hydrate,
            validate,
        }
    }

    /// The single concrete source type, when the declared type is not a union.
    pub fn default_source(&self) -> Result<&'static NodeDescriptor> {
        single_endpoint(&self.source_types, self.source_type)
    }

    /// The single concrete target type, when the declared type is not a union.
    pub fn default_target(&self) -> Result<&'static NodeDescriptor> {
        single_endpoint(&self.target_types, self.target_type)
    }
}

fn single_endpoint(types: &[&'static NodeDescriptor], declared: &str) -> Result<&'static NodeDescriptor> {
    match types {
        [only] => Ok(only),
        _ => Err(NeontologyError::Mapping(format!(
            "{declared} accepts {} concrete node types; pass the endpoint type explicitly",
            types.len()
        ))),
    }
}

impl PartialEq for RelationshipDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
    }
}

/// A relationship type declared with `#[derive(Relationship)]`.
pub trait RelationshipType: Entity {
    const RELATIONSHIP_TYPE: &'static str;

    type Source: NodeRef;
    type Target: NodeRef;

    fn source(&self) -> &Self::Source;
    fn target(&self) -> &Self::Target;

    /// Build an instance from its properties and endpoints.
    fn from_parts(props: Properties, source: Self::Source, target: Self::Target) -> Result<Self>;

    /// Validate relationship properties (without endpoints) through the
    /// declared fields and return them in storable form.
    fn validate_properties(props: Properties) -> Result<Properties>;

    fn relationship_descriptor() -> &'static RelationshipDescriptor;

    /// Stand-ins for the two endpoints.
    fn endpoints(&self) -> Result<(EndpointRef, EndpointRef)> {
        Ok((EndpointRef::of(self.source())?, EndpointRef::of(self.target())?))
    }

    /// Merge parameters for the edge's own properties.
    fn relationship_merge_parameters(&self) -> Result<MergeParameters> {
        MergeParameters::of(self, &["source", "target"], &[])
    }
}

/// Type-erased view of a hydrated relationship, as held by query results.
pub trait GraphRelationship: Debug + Send + Sync + 'static {
    fn descriptor(&self) -> &'static RelationshipDescriptor;
    fn source_ref(&self) -> Result<EndpointRef>;
    fn target_ref(&self) -> Result<EndpointRef>;
    /// Non-null storable properties, endpoints excluded.
    fn properties(&self) -> Result<Properties>;
    fn as_any(&self) -> &dyn Any;
}

impl<R: RelationshipType> GraphRelationship for R {
    fn descriptor(&self) -> &'static RelationshipDescriptor {
        R::relationship_descriptor()
    }

    fn source_ref(&self) -> Result<EndpointRef> {
        EndpointRef::of(self.source())
    }

    fn target_ref(&self) -> Result<EndpointRef> {
        EndpointRef::of(self.target())
    }

    fn properties(&self) -> Result<Properties> {
        self.engine_dict_with(&crate::entity::DictOptions {
            exclude: &["source", "target"],
            ..Default::default()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn GraphRelationship {
    /// Borrow the concrete relationship if it is an `R`.
    pub fn downcast_ref<R: RelationshipType>(&self) -> Option<&R> {
        self.as_any().downcast_ref::<R>()
    }

    pub fn relationship_type(&self) -> &'static str {
        self.descriptor().relationship_type
    }

    /// The relationship in bulk-record form: its properties plus the
    /// reserved `RELATIONSHIP_TYPE`, `SOURCE_LABEL`, `TARGET_LABEL` keys and
    /// the endpoint identity values under `source` and `target`.
    pub fn export_record(&self) -> Result<Properties> {
        let source = self.source_ref()?;
        let target = self.target_ref()?;
        let mut record = self.properties()?;
        record.insert("RELATIONSHIP_TYPE".into(), Value::from(self.relationship_type()));
        record.insert("SOURCE_LABEL".into(), Value::from(source.label()?));
        record.insert("TARGET_LABEL".into(), Value::from(target.label()?));
        record.insert("source".into(), source.value);
        record.insert("target".into(), target.value);
        Ok(record)
    }
}

/// Descriptor hydrator for a relationship type; stored in its descriptor.
pub fn hydrate_relationship<R: RelationshipType>(
    props: Properties,
    source: &Arc<dyn GraphNode>,
    target: &Arc<dyn GraphNode>,
) -> Result<Arc<dyn GraphRelationship>> {
    let s = R::Source::from_graph_node(source).ok_or_else(|| {
        NeontologyError::type_mismatch(R::Source::declared_type(), source.descriptor().type_name, "source")
    })?;
    let t = R::Target::from_graph_node(target).ok_or_else(|| {
        NeontologyError::type_mismatch(R::Target::declared_type(), target.descriptor().type_name, "target")
    })?;
    Ok(Arc::new(R::from_parts(props, s, t)?))
}

/// Descriptor validator for a relationship type; stored in its descriptor.
pub fn validate_relationship<R: RelationshipType>(props: Properties) -> Result<Properties> {
    let props = R::validate_properties(props)?;
    export_properties(props)
}
