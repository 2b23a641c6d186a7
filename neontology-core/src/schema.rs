//! Structural descriptions of node and relationship types, for
//! documentation.

use std::fmt::Write as _;

use serde::Serialize;

use crate::error::Result;
use crate::fields::FieldSpec;
use crate::node::NodeDescriptor;
use crate::registry::{RelationshipTypeData, TypeRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeAnnotation {
    /// The field's Rust type as written, e.g. `Option<Vec<String>>`.
    pub representation: String,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaProperty {
    pub name: String,
    pub type_annotation: TypeAnnotation,
    pub required: bool,
}

impl From<&FieldSpec> for SchemaProperty {
    fn from(field: &FieldSpec) -> Self {
        SchemaProperty {
            name: field.wire_name.to_owned(),
            type_annotation: TypeAnnotation {
                representation: field.type_repr.to_owned(),
                optional: field.optional,
            },
            required: field.required,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipSchema {
    /// The Rust type name.
    pub name: String,
    pub relationship_type: String,
    pub source_labels: Vec<String>,
    pub target_labels: Vec<String>,
    pub properties: Vec<SchemaProperty>,
}

impl RelationshipSchema {
    /// Describe a registered relationship type, expanding union endpoints
    /// to their concrete labels.
    pub fn from_type_data(data: &RelationshipTypeData) -> Self {
        let descriptor = data.relationship;
        RelationshipSchema {
            name: descriptor.type_name.to_owned(),
            relationship_type: descriptor.relationship_type.to_owned(),
            source_labels: data.source_labels().into_iter().map(str::to_owned).collect(),
            target_labels: data.target_labels().into_iter().map(str::to_owned).collect(),
            properties: descriptor
                .fields
                .iter()
                .filter(|f| f.wire_name != "source" && f.wire_name != "target")
                .map(SchemaProperty::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSchema {
    pub label: String,
    /// The Rust type name.
    pub title: String,
    pub secondary_labels: Vec<String>,
    pub properties: Vec<SchemaProperty>,
    pub outgoing_relationships: Vec<RelationshipSchema>,
}

impl NodeSchema {
    /// Describe a concrete node type.
    ///
    /// With a registry, outgoing relationship types are resolved for the
    /// type and every registered subtype.
    pub fn new(descriptor: &NodeDescriptor, registry: Option<&TypeRegistry>) -> Result<Self> {
        let outgoing_relationships = match registry {
            Some(registry) => registry
                .rels_by_source_class(descriptor)
                .into_iter()
                .filter_map(|t| registry.relationship(t))
                .map(RelationshipSchema::from_type_data)
                .collect(),
            None => Vec::new(),
        };

        Ok(NodeSchema {
            label: descriptor.require_label()?.to_owned(),
            title: descriptor.type_name.to_owned(),
            secondary_labels: descriptor.secondary_labels.iter().map(|l| l.to_string()).collect(),
            properties: descriptor.fields.iter().map(SchemaProperty::from).collect(),
            outgoing_relationships,
        })
    }

    /// The property table as markdown.
    pub fn md_node_table(&self) -> String {
        property_table(&self.properties)
    }

    /// One section per outgoing relationship type, with a property table
    /// when the relationship has properties.
    pub fn md_rel_tables(&self, heading_level: usize) -> String {
        let mut out = String::new();
        for rel in &self.outgoing_relationships {
            let _ = writeln!(out, "{} {}", "#".repeat(heading_level), rel.relationship_type);
            let _ = writeln!(out);
            let _ = writeln!(out, "Target Label(s): {}", rel.target_labels.join(", "));
            if !rel.properties.is_empty() {
                let _ = writeln!(out);
                out.push_str(&property_table(&rel.properties));
                out.push('\n');
            }
            out.push('\n');
        }
        out.trim().to_owned()
    }
}

fn property_table(properties: &[SchemaProperty]) -> String {
    let mut out = String::from("| Property Name | Type | Required |\n| ------------- | ---- | -------- |");
    for p in properties {
        let _ = write!(out, "\n| {} | {} | {} |", p.name, p.type_annotation.representation, p.required);
    }
    out
}
