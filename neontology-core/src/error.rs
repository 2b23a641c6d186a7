//! Error types for neontology operations.

use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type Result<T, E = NeontologyError> = std::result::Result<T, E>;

/// Unified error type for all neontology operations.
///
/// Result-shape problems (unknown labels, missing relationship endpoints,
/// multi-row answers to single-value queries) are *not* errors: they are
/// reported as warnings on the [`NeontologyResult`](crate::result::NeontologyResult)
/// and the offending record is dropped.
#[derive(Error, Debug)]
pub enum NeontologyError {
    /// A general mapping error with a freeform message.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// A required property was not found on a node or relationship.
    #[error("missing property '{property}' on {label}")]
    MissingProperty { property: String, label: String },

    /// A value did not have the shape the caller expected.
    #[error("type mismatch: expected {expected}, got {got} ({context})")]
    TypeMismatch {
        expected: String,
        got: String,
        context: String,
    },

    /// Wraps an inner error with additional context.
    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<NeontologyError>,
    },

    /// The graph connection was used before an engine was installed.
    #[error("graph connection is not initialized")]
    NotInitialized,

    /// The engine was closed and can no longer run queries.
    #[error("the {0} engine has been closed")]
    EngineClosed(String),

    /// A connection parameter was neither passed explicitly nor found in the environment.
    #[error("missing configuration value '{key}' for the {engine} engine")]
    MissingConfig { engine: String, key: String },

    /// Configuration was present but unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An abstract node type (one without a primary label) was used where a
    /// concrete one is required.
    #[error("{0} is abstract and has no primary label")]
    AbstractEntity(String),

    /// A batch operation received an instance of the wrong class.
    #[error("expected instances of {expected}, got {got}")]
    WrongEntityType { expected: String, got: String },

    /// A property value cannot be stored by a graph backend.
    #[error("unsupported value for property '{property}': {reason}")]
    UnsupportedProperty { property: String, reason: String },

    /// A filter key could not be understood.
    #[error("invalid filter '{key}': {reason}")]
    InvalidFilter { key: String, reason: String },

    /// The active engine lacks a capability the caller asked for.
    #[error("{feature} is not implemented for the {engine} engine")]
    NotImplemented { feature: String, engine: String },

    /// No registered node type carries this primary label.
    #[error("no registered node type with primary label '{0}'")]
    UnknownLabel(String),

    /// No registered relationship type has this name.
    #[error("no registered relationship type '{0}'")]
    UnknownRelationshipType(String),

    /// A bulk-import record was malformed.
    #[error("invalid import record: {0}")]
    InvalidRecord(String),

    /// Relationship records referenced target nodes that do not exist.
    #[error("{rel_type}: {count} target(s) not found by {target_label}.{target_property}: {values}")]
    UnmatchedTargets {
        rel_type: String,
        target_label: String,
        target_property: String,
        count: usize,
        values: String,
    },

    /// `get_related` was asked for neither outgoing nor incoming edges.
    #[error("get_related needs at least one of outgoing or incoming")]
    NoDirection,

    /// A result escalated with `into_strict` carried warnings.
    #[error("query result carried {} warning(s): {}", .0.len(), .0.join("; "))]
    Warnings(Vec<String>),

    /// Serializing or validating a model through serde failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading tabular input failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// A `neo4rs::Error` from the underlying driver.
    #[error("neo4j error: {0}")]
    Neo4j(#[from] neo4rs::Error),
}

impl NeontologyError {
    /// Create a [`TypeMismatch`](NeontologyError::TypeMismatch) error.
    pub fn type_mismatch(expected: &str, got: &str, context: &str) -> Self {
        NeontologyError::TypeMismatch {
            expected: expected.to_owned(),
            got: got.to_owned(),
            context: context.to_owned(),
        }
    }

    /// Create a [`MissingProperty`](NeontologyError::MissingProperty) error.
    pub fn missing_property(property: &str, label: &str) -> Self {
        NeontologyError::MissingProperty {
            property: property.to_owned(),
            label: label.to_owned(),
        }
    }

    /// Create a [`NotImplemented`](NeontologyError::NotImplemented) error.
    pub fn not_implemented(feature: impl Into<String>, engine: &str) -> Self {
        NeontologyError::NotImplemented {
            feature: feature.into(),
            engine: engine.to_owned(),
        }
    }

    /// Create an [`UnsupportedProperty`](NeontologyError::UnsupportedProperty) error.
    pub fn unsupported_property(property: &str, reason: impl Into<String>) -> Self {
        NeontologyError::UnsupportedProperty {
            property: property.to_owned(),
            reason: reason.into(),
        }
    }

    /// Create an [`InvalidFilter`](NeontologyError::InvalidFilter) error.
    pub fn invalid_filter(key: &str, reason: impl Into<String>) -> Self {
        NeontologyError::InvalidFilter {
            key: key.to_owned(),
            reason: reason.into(),
        }
    }

    /// Whether this error reports a missing engine capability.
    ///
    /// Optional features such as constraint management are expected to be
    /// skipped when this returns `true`.
    pub fn is_not_implemented(&self) -> bool {
        match self {
            NeontologyError::NotImplemented { .. } => true,
            NeontologyError::Context { source, .. } => source.is_not_implemented(),
            _ => false,
        }
    }

    /// Wrap this error with additional context, producing a [`Context`](NeontologyError::Context) variant.
    ///
    /// ```rust
    /// # use neontology_core::NeontologyError;
    /// let err = NeontologyError::type_mismatch("Integer", "String", "age");
    /// let wrapped = err.with_context("Person::merge_records (row 3)");
    /// assert!(wrapped.to_string().contains("row 3"));
    /// ```
    pub fn with_context(self, ctx: impl Into<String>) -> Self {
        NeontologyError::Context {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}
