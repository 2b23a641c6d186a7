//! Core traits, descriptors, query builders and result materialization for
//! neontology.
//!
//! This crate is not meant to be used directly. Use the [`neontology`] facade
//! crate instead, which re-exports everything you need.
//!
//! [`neontology`]: https://docs.rs/neontology

pub mod error;
pub mod identifier;
pub mod value;
pub mod fields;

pub mod entity;
pub mod node;
pub mod relationship;
pub mod registry;

pub mod filter;
pub mod query;
pub mod cypher;

pub mod record;
pub mod result;
pub mod materialize;

pub mod schema;
pub mod frame;

pub use error::{NeontologyError, Result};
pub use value::Properties;
pub use fields::{FieldSpec, FieldTag, FieldUsage};
pub use entity::{DictOptions, Entity, MergeParameters};
pub use node::{EndpointRef, GraphNode, NodeClass, NodeDescriptor, NodeRef, NodeType};
pub use relationship::{GraphRelationship, RelationshipDescriptor, RelationshipType};
pub use registry::{Registry, RelationshipTypeData, TypeRegistry};
pub use filter::{Filter, Filters, Lookup};
pub use query::Query;
pub use cypher::RelatedOptions;
pub use record::{RawNode, RawPath, RawRecord, RawRelationship, RawValue};
pub use result::{NeontologyResult, ResultRecord};
pub use schema::{NodeSchema, RelationshipSchema, SchemaProperty, TypeAnnotation};
pub use frame::Frame;

/// Re-exports used by derive-generated code.
#[doc(hidden)]
pub mod __private {
    pub use serde;
    pub use serde_json;
}
