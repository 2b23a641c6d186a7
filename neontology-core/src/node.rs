//! Node model traits and descriptors.
//!
//! A node type is described at runtime by a [`NodeDescriptor`], produced once
//! per type by `#[derive(Node)]`. Concrete node types (those declaring a
//! primary label) implement [`NodeType`]; abstract ones only implement
//! [`NodeClass`], so the persistence operations simply do not exist for them.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::entity::{Entity, MergeParameters};
use crate::error::{NeontologyError, Result};
use crate::fields::FieldSpec;
use crate::identifier::check_identifier;
use crate::value::{identity_key, typed_identity_key, Properties};

/// Function that rebuilds a node from backend properties.
pub type NodeHydrator = fn(Properties) -> Result<Arc<dyn GraphNode>>;

/// Runtime description of a declared node type.
#[derive(Debug)]
pub struct NodeDescriptor {
    pub type_name: &'static str,
    /// `None` for abstract node types.
    pub primary_label: Option<&'static str>,
    pub primary_property: Option<&'static str>,
    /// Own secondary labels followed by every ancestor's, without duplicates.
    pub secondary_labels: Vec<&'static str>,
    pub parent: Option<&'static NodeDescriptor>,
    pub fields: Vec<FieldSpec>,
    pub hydrate: Option<NodeHydrator>,
}

impl NodeDescriptor {
    /// Assemble a descriptor, accumulating inherited secondary labels and
    /// warning about non-conforming identifiers.
    pub fn new(
        type_name: &'static str,
        primary_label: Option<&'static str>,
        primary_property: Option<&'static str>,
        own_secondary_labels: &[&'static str],
        parent: Option<&'static NodeDescriptor>,
        fields: Vec<FieldSpec>,
        hydrate: Option<NodeHydrator>,
    ) -> Self {
        if let Some(label) = primary_label {
            check_identifier("label", label);
        }
        if let Some(prop) = primary_property {
            check_identifier("property", prop);
        }

        let inherited = parent.map(|p| p.secondary_labels.as_slice()).unwrap_or_default();
        let mut secondary_labels: Vec<&'static str> = Vec::new();
        for label in own_secondary_labels.iter().chain(inherited) {
            if Some(*label) != primary_label && !secondary_labels.contains(label) {
                check_identifier("label", label);
                secondary_labels.push(*label);
            }
        }

        NodeDescriptor {
            type_name,
            primary_label,
            primary_property,
            secondary_labels,
            parent,
            fields,
            hydrate,
        }
    }

    pub fn is_abstract(&self) -> bool {
        self.primary_label.is_none()
    }

    /// The primary label, or [`NeontologyError::AbstractEntity`].
    pub fn require_label(&self) -> Result<&'static str> {
        self.primary_label
            .ok_or_else(|| NeontologyError::AbstractEntity(self.type_name.to_owned()))
    }

    /// The primary property, or [`NeontologyError::AbstractEntity`].
    pub fn require_primary_property(&self) -> Result<&'static str> {
        self.primary_property
            .ok_or_else(|| NeontologyError::AbstractEntity(self.type_name.to_owned()))
    }

    /// Primary label first, then secondary labels.
    pub fn labels(&self) -> Vec<&'static str> {
        self.primary_label
            .into_iter()
            .chain(self.secondary_labels.iter().copied())
            .collect()
    }

    pub fn has_field(&self, wire_name: &str) -> bool {
        self.fields.iter().any(|f| f.wire_name == wire_name)
    }

    /// Whether `self` is `other` or inherits from it through `extends`.
    pub fn is_subclass_of(&self, other: &NodeDescriptor) -> bool {
        let mut current = Some(self);
        while let Some(d) = current {
            if d.type_name == other.type_name {
                return true;
            }
            current = d.parent;
        }
        false
    }

    /// Rebuild a node of this type from backend properties.
    pub fn hydrate(&self, props: Properties) -> Result<Arc<dyn GraphNode>> {
        match self.hydrate {
            Some(hydrate) => hydrate(props),
            None => Err(NeontologyError::AbstractEntity(self.type_name.to_owned())),
        }
    }
}

impl PartialEq for NodeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
    }
}

impl Eq for NodeDescriptor {}

/// Any type declared with `#[derive(Node)]`, abstract or concrete.
pub trait NodeClass: Entity {
    fn node_descriptor() -> &'static NodeDescriptor;
}

/// A concrete node type: one with a primary label and primary property.
pub trait NodeType: NodeClass + DeserializeOwned {
    const PRIMARY_LABEL: &'static str;
    const PRIMARY_PROPERTY: &'static str;

    /// All labels written to the backend, primary first.
    fn labels() -> Vec<&'static str> {
        Self::node_descriptor().labels()
    }

    /// The value of the primary property.
    fn primary_value(&self) -> Result<Value> {
        let mut dict = self.engine_dict()?;
        dict.remove(Self::PRIMARY_PROPERTY)
            .ok_or_else(|| NeontologyError::missing_property(Self::PRIMARY_PROPERTY, Self::PRIMARY_LABEL))
    }

    /// Human-readable name used by exports. Defaults to the primary value.
    fn display_name(&self) -> String {
        self.primary_value()
            .map(|v| identity_key(&v))
            .unwrap_or_else(|_| Self::type_name().to_owned())
    }

    /// Merge parameters for this node: the primary value is matched on and
    /// therefore left out of the lifecycle buckets.
    fn node_merge_parameters(&self) -> Result<MergeParameters> {
        MergeParameters::of(self, &[], &[Self::PRIMARY_PROPERTY])
    }

    /// Build an instance from a property map, running serde validation.
    fn from_properties(props: Properties) -> Result<Self> {
        crate::entity::from_properties(props, Self::type_name())
    }
}

/// Type-erased view of a hydrated node, as held by query results.
pub trait GraphNode: Debug + Send + Sync + 'static {
    fn descriptor(&self) -> &'static NodeDescriptor;
    fn identity_value(&self) -> Result<Value>;
    fn properties(&self) -> Result<Properties>;
    fn lifecycle_parameters(&self) -> Result<MergeParameters>;
    fn name(&self) -> String;
    fn as_any(&self) -> &dyn Any;
}

impl<T: NodeType> GraphNode for T {
    fn descriptor(&self) -> &'static NodeDescriptor {
        T::node_descriptor()
    }

    fn identity_value(&self) -> Result<Value> {
        self.primary_value()
    }

    fn properties(&self) -> Result<Properties> {
        self.engine_dict()
    }

    fn lifecycle_parameters(&self) -> Result<MergeParameters> {
        self.node_merge_parameters()
    }

    fn name(&self) -> String {
        self.display_name()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn GraphNode {
    /// Borrow the concrete node if it is a `T`.
    pub fn downcast_ref<T: NodeType>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// The primary label of the concrete type.
    pub fn primary_label(&self) -> &'static str {
        self.descriptor().primary_label.unwrap_or(self.descriptor().type_name)
    }

    /// `(primary label, identity key)`, the node deduplication key.
    pub fn dedup_key(&self) -> Result<(&'static str, String)> {
        Ok((self.primary_label(), typed_identity_key(&self.identity_value()?)))
    }
}

/// Descriptor hydrator for a concrete node type; stored in its descriptor.
pub fn hydrate_node<T: NodeType>(props: Properties) -> Result<Arc<dyn GraphNode>> {
    Ok(Arc::new(T::from_properties(props)?))
}

/// A node value usable as a relationship endpoint.
///
/// Implemented for every concrete node type and for `#[derive(NodeUnion)]`
/// enums, which stand for "any one of these concrete types".
pub trait NodeRef: Serialize + Clone + Debug + Send + Sync + 'static {
    /// The name of the declared endpoint type.
    fn declared_type() -> &'static str;

    /// Every concrete node type the endpoint accepts.
    fn concrete_types() -> Vec<&'static NodeDescriptor>;

    /// Descriptor of the concrete node held by this value.
    fn endpoint_descriptor(&self) -> &'static NodeDescriptor;

    /// Primary value of the concrete node held by this value.
    fn endpoint_value(&self) -> Result<Value>;

    /// Convert a hydrated node into this endpoint type, if it is one of
    /// the accepted concrete types.
    fn from_graph_node(node: &Arc<dyn GraphNode>) -> Option<Self>;
}

/// Minimal stand-in for an existing node: just enough to match it.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointRef {
    pub descriptor: &'static NodeDescriptor,
    /// Property used to match the node, normally its primary property.
    pub property: String,
    pub value: Value,
}

impl EndpointRef {
    /// Stand-in matched on the descriptor's primary property.
    pub fn primary(descriptor: &'static NodeDescriptor, value: Value) -> Result<Self> {
        Ok(EndpointRef {
            descriptor,
            property: descriptor.require_primary_property()?.to_owned(),
            value,
        })
    }

    /// Stand-in for a concrete endpoint value.
    pub fn of<N: NodeRef>(node: &N) -> Result<Self> {
        Self::primary(node.endpoint_descriptor(), node.endpoint_value()?)
    }

    pub fn label(&self) -> Result<&'static str> {
        self.descriptor.require_label()
    }
}
