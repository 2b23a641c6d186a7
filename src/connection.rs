//! The graph connection context.
//!
//! A [`GraphConnection`] owns at most one active engine and the registry of
//! known model types. It is constructed and passed explicitly; there is no
//! process-wide instance.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use neontology_core::cypher::{CreateRow, MergeRelationshipSpec, MergeRow, RelationshipRow};
use neontology_core::materialize::materialize;
use neontology_core::{
    Filters, NeontologyError, NeontologyResult, NodeClass, Query, RawRecord, Registry, RelatedOptions,
    RelationshipType, Result,
};

use crate::config::EngineConfig;
use crate::engine::{self, single_value, GraphEngine};

/// A handle to one graph engine plus the types it materializes into.
#[derive(Debug, Default)]
pub struct GraphConnection {
    engine: RwLock<Option<Arc<dyn GraphEngine>>>,
    registry: Registry,
}

impl GraphConnection {
    /// A connection with no engine. Every query fails with
    /// [`NeontologyError::NotInitialized`] until [`init`](Self::init) or
    /// [`change_engine_to`](Self::change_engine_to) is called.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(engine: Arc<dyn GraphEngine>) -> Self {
        GraphConnection {
            engine: RwLock::new(Some(engine)),
            registry: Registry::new(),
        }
    }

    /// Connect the engine described by `config`.
    pub async fn connect(config: &EngineConfig) -> Result<Self> {
        Ok(Self::with_engine(engine::connect(config).await?))
    }

    /// Install an engine on an uninitialized connection. An already
    /// initialized connection keeps its engine.
    pub async fn init(&self, config: &EngineConfig) -> Result<()> {
        if self.is_initialized() {
            tracing::debug!("graph connection already initialized");
            return Ok(());
        }
        let engine = engine::connect(config).await?;
        self.set_engine(Some(engine));
        Ok(())
    }

    /// Replace the active engine, closing the previous one.
    pub async fn change_engine(&self, config: &EngineConfig) -> Result<()> {
        self.engine()?;
        let engine = engine::connect(config).await?;
        self.change_engine_to(engine).await
    }

    /// Replace the active engine with an already connected one.
    pub async fn change_engine_to(&self, engine: Arc<dyn GraphEngine>) -> Result<()> {
        let name = engine.name();
        if let Some(previous) = self.set_engine(Some(engine)) {
            tracing::info!(from = previous.name(), to = name, "changing graph engine");
            previous.close().await?;
        }
        Ok(())
    }

    fn set_engine(&self, engine: Option<Arc<dyn GraphEngine>>) -> Option<Arc<dyn GraphEngine>> {
        let mut slot = self.engine.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, engine)
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// The active engine.
    pub fn engine(&self) -> Result<Arc<dyn GraphEngine>> {
        self.engine
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(NeontologyError::NotInitialized)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn register_node<T: NodeClass>(&self) -> &Self {
        self.registry.register_node::<T>();
        self
    }

    pub fn register_relationship<R: RelationshipType>(&self) -> &Self {
        self.registry.register_relationship::<R>();
        self
    }

    /// Interpret raw rows against the currently registered types.
    pub fn materialize(&self, records: Vec<RawRecord>) -> NeontologyResult {
        materialize(records, &self.registry.snapshot())
    }

    /// Release the engine. The connection becomes uninitialized.
    pub async fn close(&self) -> Result<()> {
        match self.set_engine(None) {
            Some(engine) => engine.close().await,
            None => Ok(()),
        }
    }

    pub async fn verify_connection(&self) -> Result<()> {
        self.engine()?.verify_connection().await
    }

    /// Run Cypher and materialize the rows.
    pub async fn evaluate_query(&self, query: impl Into<Query>) -> Result<NeontologyResult> {
        let records = self.engine()?.execute(query.into()).await?;
        Ok(self.materialize(records))
    }

    /// Run Cypher expected to return one row with one column.
    pub async fn evaluate_query_single(&self, query: impl Into<Query>) -> Result<Option<Value>> {
        let records = self.engine()?.execute(query.into()).await?;
        Ok(single_value(records))
    }

    // Structural operations, materialized where rows come back.

    pub async fn create_nodes(&self, labels: &[&str], pp_key: &str, rows: Vec<CreateRow>) -> Result<NeontologyResult> {
        let records = self.engine()?.create_nodes(labels, pp_key, rows).await?;
        Ok(self.materialize(records))
    }

    pub async fn merge_nodes(&self, labels: &[&str], pp_key: &str, rows: Vec<MergeRow>) -> Result<NeontologyResult> {
        let records = self.engine()?.merge_nodes(labels, pp_key, rows).await?;
        Ok(self.materialize(records))
    }

    pub async fn delete_nodes(&self, label: &str, pp_key: &str, pp_values: Vec<Value>) -> Result<()> {
        self.engine()?.delete_nodes(label, pp_key, pp_values).await
    }

    pub async fn match_nodes(
        &self,
        label: &str,
        limit: Option<u64>,
        skip: Option<u64>,
        filters: &Filters,
    ) -> Result<NeontologyResult> {
        let records = self.engine()?.match_nodes(label, limit, skip, filters).await?;
        Ok(self.materialize(records))
    }

    pub async fn match_node(&self, label: &str, pp_key: &str, pp_value: Value) -> Result<NeontologyResult> {
        let records = self.engine()?.match_node(label, pp_key, pp_value).await?;
        Ok(self.materialize(records))
    }

    pub async fn count_nodes(&self, label: &str, filters: &Filters) -> Result<u64> {
        self.engine()?.count_nodes(label, filters).await
    }

    pub async fn merge_relationships(&self, spec: &MergeRelationshipSpec, rows: Vec<RelationshipRow>) -> Result<()> {
        self.engine()?.merge_relationships(spec, rows).await
    }

    pub async fn match_relationships(
        &self,
        rel_type: &str,
        limit: Option<u64>,
        skip: Option<u64>,
    ) -> Result<NeontologyResult> {
        let records = self.engine()?.match_relationships(rel_type, limit, skip).await?;
        Ok(self.materialize(records))
    }

    pub async fn count_relationships(&self, rel_type: &str) -> Result<u64> {
        self.engine()?.count_relationships(rel_type).await
    }

    pub async fn get_related(
        &self,
        label: &str,
        pp_key: &str,
        pp_value: Value,
        options: &RelatedOptions,
    ) -> Result<NeontologyResult> {
        let records = self.engine()?.get_related(label, pp_key, pp_value, options).await?;
        Ok(self.materialize(records))
    }

    // Constraints

    pub async fn apply_constraint(&self, label: &str, property: &str) -> Result<()> {
        self.engine()?.apply_constraint(label, property).await
    }

    pub async fn drop_constraint(&self, name: &str) -> Result<()> {
        self.engine()?.drop_constraint(name).await
    }

    pub async fn get_constraints(&self) -> Result<Vec<String>> {
        self.engine()?.get_constraints().await
    }

    /// Apply a uniqueness constraint on the primary property of every
    /// registered concrete node type. Returns the number applied; engines
    /// without constraint support apply none.
    pub async fn apply_constraints(&self) -> Result<usize> {
        let engine = self.engine()?;
        let registry = self.registry.snapshot();
        let mut applied = 0;
        for (label, descriptor) in registry.node_types(None) {
            let property = descriptor.require_primary_property()?;
            match engine.apply_constraint(label, property).await {
                Ok(()) => applied += 1,
                Err(e) if e.is_not_implemented() => {
                    tracing::info!(engine = engine.name(), "constraints not supported, skipping");
                    return Ok(0);
                }
                Err(e) => return Err(e.with_context(format!("constraint on {label}.{property}"))),
            }
        }
        Ok(applied)
    }
}
