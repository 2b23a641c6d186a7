//! Memgraph over Bolt.
//!
//! Memgraph speaks the same Cypher for data statements but has its own
//! constraint syntax, and names constraints by `Label.property`.

use async_trait::async_trait;
use serde_json::Value;

use neontology_core::identifier::escape_identifier;
use neontology_core::{NeontologyError, Query, RawRecord, Result};

use super::bolt::BoltClient;
use super::GraphEngine;
use crate::config::MemgraphSettings;

#[derive(Debug, Clone)]
pub struct MemgraphEngine {
    client: BoltClient,
}

impl MemgraphEngine {
    pub async fn connect(settings: &MemgraphSettings) -> Result<Self> {
        let client =
            BoltClient::connect("memgraph", &settings.uri, &settings.username, &settings.password, None).await?;
        Ok(MemgraphEngine { client })
    }
}

fn constraint(label: &str, property: &str) -> String {
    format!(
        "CONSTRAINT ON (n:{}) ASSERT n.{} IS UNIQUE",
        escape_identifier(label),
        escape_identifier(property)
    )
}

#[async_trait]
impl GraphEngine for MemgraphEngine {
    fn name(&self) -> &'static str {
        "memgraph"
    }

    async fn close(&self) -> Result<()> {
        self.client.close();
        Ok(())
    }

    async fn execute(&self, query: Query) -> Result<Vec<RawRecord>> {
        self.client.execute(query).await
    }

    async fn apply_constraint(&self, label: &str, property: &str) -> Result<()> {
        let query = Query::new(format!("CREATE {}", constraint(label, property)));
        self.execute(query).await.map(|_| ())
    }

    /// `name` is `Label.property`, as returned by
    /// [`get_constraints`](GraphEngine::get_constraints).
    async fn drop_constraint(&self, name: &str) -> Result<()> {
        let (label, property) = name.split_once('.').ok_or_else(|| {
            NeontologyError::InvalidConfig(format!("memgraph constraint names look like Label.property, got '{name}'"))
        })?;
        let query = Query::new(format!("DROP {}", constraint(label, property)));
        self.execute(query).await.map(|_| ())
    }

    async fn get_constraints(&self) -> Result<Vec<String>> {
        let rows = self.execute(Query::new("SHOW CONSTRAINT INFO")).await?;
        let mut names = Vec::new();
        for row in rows {
            let label = row.get("label").map(|v| v.to_json());
            let properties = row.get("properties").map(|v| v.to_json());
            if let (Some(Value::String(label)), Some(properties)) = (label, properties) {
                match properties {
                    Value::Array(props) => {
                        for p in props.iter().filter_map(Value::as_str) {
                            names.push(format!("{label}.{p}"));
                        }
                    }
                    Value::String(p) => names.push(format!("{label}.{p}")),
                    _ => {}
                }
            }
        }
        Ok(names)
    }
}
