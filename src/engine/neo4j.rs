//! Neo4j over Bolt.

use async_trait::async_trait;

use neontology_core::{Query, RawRecord, Result};

use super::bolt::BoltClient;
use super::GraphEngine;
use crate::config::Neo4jSettings;

/// Neo4j engine. Uses the shared Cypher statements unchanged.
#[derive(Debug, Clone)]
pub struct Neo4jEngine {
    client: BoltClient,
}

impl Neo4jEngine {
    pub async fn connect(settings: &Neo4jSettings) -> Result<Self> {
        let client = BoltClient::connect(
            "neo4j",
            &settings.uri,
            &settings.username,
            &settings.password,
            settings.database.as_deref(),
        )
        .await?;
        Ok(Neo4jEngine { client })
    }
}

#[async_trait]
impl GraphEngine for Neo4jEngine {
    fn name(&self) -> &'static str {
        "neo4j"
    }

    async fn close(&self) -> Result<()> {
        self.client.close();
        Ok(())
    }

    async fn execute(&self, query: Query) -> Result<Vec<RawRecord>> {
        self.client.execute(query).await
    }
}
