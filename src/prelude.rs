//! Convenience re-exports for common neontology usage.
//!
//! ```rust
//! use neontology::prelude::*;
//! ```
//!
//! This imports the derive and attribute macros, the operation traits
//! (`NodeOps`, `RelationshipOps`), the model traits they build on, the
//! connection and query types, and serde's `Serialize` / `Deserialize`.

pub use crate::{related_nodes, related_property, Node, NodeUnion, Relationship};

pub use crate::connection::GraphConnection;
pub use crate::ops::{MatchOptions, NodeOps, RecordOptions, RelationshipOps};
pub use crate::related::RelatedQuery;

pub use neontology_core::{
    Entity, Filters, Frame, GraphNode, GraphRelationship, NeontologyError, NeontologyResult, NodeClass, NodeRef,
    NodeType, Properties, Query, RelatedOptions, RelationshipType,
};

pub use serde::{Deserialize, Serialize};
