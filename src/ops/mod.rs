//! Persistence operations on declared models.
//!
//! [`NodeOps`] and [`RelationshipOps`] are blanket-implemented for every
//! concrete node and relationship type, so `use neontology::prelude::*` is
//! enough to call `person.merge(&graph)`.

pub mod node;
pub mod relationship;

pub use node::{MatchOptions, NodeOps};
pub use relationship::{RecordOptions, RelationshipOps};
