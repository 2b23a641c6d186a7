//! A `neo4rs` connection shared by the Bolt-speaking engines.

use std::sync::{Arc, PoisonError, RwLock};

use neo4rs::{ConfigBuilder, Graph};

use neontology_core::record::record_from_row;
use neontology_core::{NeontologyError, Query, RawRecord, Result};

#[derive(Clone)]
pub struct BoltClient {
    engine: &'static str,
    uri: String,
    graph: Arc<RwLock<Option<Arc<Graph>>>>,
}

impl std::fmt::Debug for BoltClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoltClient")
            .field("engine", &self.engine)
            .field("uri", &self.uri)
            .field("open", &self.is_open())
            .finish()
    }
}

impl BoltClient {
    /// Open a connection pool and verify it with a trivial query.
    pub async fn connect(
        engine: &'static str,
        uri: &str,
        username: &str,
        password: &str,
        database: Option<&str>,
    ) -> Result<Self> {
        let mut builder = ConfigBuilder::default().uri(uri).user(username).password(password);
        if let Some(db) = database {
            builder = builder.db(db);
        }
        let config = builder.build()?;
        let graph = Graph::connect(config).await?;

        let client = BoltClient {
            engine,
            uri: uri.to_owned(),
            graph: Arc::new(RwLock::new(Some(Arc::new(graph)))),
        };
        client.execute(Query::new("RETURN 1")).await?;
        tracing::info!(engine, uri, "connected");
        Ok(client)
    }

    fn is_open(&self) -> bool {
        self.graph.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    fn graph(&self) -> Result<Arc<Graph>> {
        self.graph
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| NeontologyError::EngineClosed(self.engine.to_owned()))
    }

    /// Execute and collect every row.
    pub async fn execute(&self, query: Query) -> Result<Vec<RawRecord>> {
        let graph = self.graph()?;
        tracing::debug!(engine = self.engine, cypher = %query.cypher, params = ?query.param_keys(), "executing");

        let mut stream = graph
            .execute(query.to_bolt())
            .await
            .map_err(|e| NeontologyError::from(e).with_context(query.cypher.clone()))?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(record_from_row(&row)?);
        }
        Ok(rows)
    }

    /// Drop the pool; later queries fail with [`NeontologyError::EngineClosed`].
    pub fn close(&self) {
        let previous = self.graph.write().unwrap_or_else(PoisonError::into_inner).take();
        if previous.is_some() {
            tracing::info!(engine = self.engine, uri = %self.uri, "connection closed");
        }
    }
}
