//! Registry of known node and relationship types.
//!
//! Types are registered explicitly. A [`Registry`] is owned by the graph
//! connection and consulted on every query, so types registered after the
//! connection was opened are still recognized. [`Registry::reset`] clears
//! it for test isolation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

use crate::node::{NodeClass, NodeDescriptor};
use crate::relationship::{RelationshipDescriptor, RelationshipType};

/// Metadata for one relationship type.
#[derive(Debug, Clone)]
pub struct RelationshipTypeData {
    pub relationship: &'static RelationshipDescriptor,
    /// Declared endpoint type names, possibly unions.
    pub source_type: &'static str,
    pub target_type: &'static str,
    /// Concrete node types accepted at each end.
    pub all_source: Vec<&'static NodeDescriptor>,
    pub all_target: Vec<&'static NodeDescriptor>,
}

impl RelationshipTypeData {
    fn new(relationship: &'static RelationshipDescriptor) -> Self {
        RelationshipTypeData {
            relationship,
            source_type: relationship.source_type,
            target_type: relationship.target_type,
            all_source: relationship.source_types.clone(),
            all_target: relationship.target_types.clone(),
        }
    }

    pub fn source_labels(&self) -> Vec<&'static str> {
        self.all_source.iter().filter_map(|d| d.primary_label).collect()
    }

    pub fn target_labels(&self) -> Vec<&'static str> {
        self.all_target.iter().filter_map(|d| d.primary_label).collect()
    }
}

/// An immutable view of registered types.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    /// Every registered node class (abstract ones included), by type name.
    classes: BTreeMap<&'static str, &'static NodeDescriptor>,
    /// Concrete node types by primary label.
    labels: BTreeMap<&'static str, &'static NodeDescriptor>,
    relationships: BTreeMap<&'static str, RelationshipTypeData>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node class and its ancestors.
    pub fn add_node(&mut self, descriptor: &'static NodeDescriptor) {
        let mut current = Some(descriptor);
        while let Some(d) = current {
            self.classes.insert(d.type_name, d);
            if let Some(label) = d.primary_label {
                if let Some(existing) = self.labels.insert(label, d) {
                    if existing.type_name != d.type_name {
                        tracing::warn!(
                            label,
                            replaced = existing.type_name,
                            by = d.type_name,
                            "primary label registered by two node types"
                        );
                    }
                }
            }
            current = d.parent;
        }
    }

    /// Register a relationship type and every concrete endpoint type.
    pub fn add_relationship(&mut self, descriptor: &'static RelationshipDescriptor) {
        for node in descriptor.source_types.iter().chain(&descriptor.target_types) {
            self.add_node(*node);
        }
        let data = RelationshipTypeData::new(descriptor);
        if let Some(existing) = self.relationships.insert(descriptor.relationship_type, data) {
            if existing.relationship.type_name != descriptor.type_name {
                tracing::warn!(
                    relationship_type = descriptor.relationship_type,
                    replaced = existing.relationship.type_name,
                    by = descriptor.type_name,
                    "relationship type registered twice"
                );
            }
        }
    }

    /// The concrete node type with this primary label.
    pub fn node_by_label(&self, label: &str) -> Option<&'static NodeDescriptor> {
        self.labels.get(label).copied()
    }

    pub fn class_by_name(&self, type_name: &str) -> Option<&'static NodeDescriptor> {
        self.classes.get(type_name).copied()
    }

    pub fn primary_labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.labels.keys().copied()
    }

    /// Concrete node types by primary label, optionally restricted to
    /// descendants of `base` (inclusive).
    pub fn node_types(&self, base: Option<&NodeDescriptor>) -> BTreeMap<&'static str, &'static NodeDescriptor> {
        self.labels
            .iter()
            .filter(|(_, d)| base.map_or(true, |b| d.is_subclass_of(b)))
            .map(|(l, d)| (*l, *d))
            .collect()
    }

    pub fn relationship_types(&self) -> &BTreeMap<&'static str, RelationshipTypeData> {
        &self.relationships
    }

    pub fn relationship(&self, relationship_type: &str) -> Option<&RelationshipTypeData> {
        self.relationships.get(relationship_type)
    }

    /// Relationship types that may leave a node with this primary label.
    pub fn rels_by_source(&self, label: &str) -> BTreeSet<&'static str> {
        self.relationships
            .iter()
            .filter(|(_, data)| data.source_labels().contains(&label))
            .map(|(t, _)| *t)
            .collect()
    }

    /// Relationship types that may arrive at a node with this primary label.
    pub fn rels_by_target(&self, label: &str) -> BTreeSet<&'static str> {
        self.relationships
            .iter()
            .filter(|(_, data)| data.target_labels().contains(&label))
            .map(|(t, _)| *t)
            .collect()
    }

    /// Relationship types that may leave `class` or any registered subclass.
    pub fn rels_by_source_class(&self, class: &NodeDescriptor) -> BTreeSet<&'static str> {
        self.node_types(Some(class))
            .keys()
            .flat_map(|label| self.rels_by_source(label))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.relationships.is_empty()
    }
}

/// Shared, explicitly owned registry.
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<TypeRegistry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_node<T: NodeClass>(&self) -> &Self {
        self.register_node_descriptor(T::node_descriptor())
    }

    pub fn register_relationship<R: RelationshipType>(&self) -> &Self {
        self.register_relationship_descriptor(R::relationship_descriptor())
    }

    pub fn register_node_descriptor(&self, descriptor: &'static NodeDescriptor) -> &Self {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add_node(descriptor);
        self
    }

    pub fn register_relationship_descriptor(&self, descriptor: &'static RelationshipDescriptor) -> &Self {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add_relationship(descriptor);
        self
    }

    /// A copy of the current registrations.
    pub fn snapshot(&self) -> TypeRegistry {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Forget every registration.
    pub fn reset(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = TypeRegistry::default();
    }
}
