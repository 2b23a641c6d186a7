//! Engine selection and connection parameters.
//!
//! Every connection parameter may be given explicitly or left out, in which
//! case it is read from the environment (after loading a `.env` file with
//! `dotenv`) when the engine connects.
//!
//! | Variable | Used by |
//! |----------|---------|
//! | `NEONTOLOGY_ENGINE` | [`EngineConfig::from_env`]: `NEO4J`, `MEMGRAPH` or `MEMORY` |
//! | `NEO4J_URI`, `NEO4J_USERNAME`, `NEO4J_PASSWORD`, `NEO4J_DATABASE` | [`Neo4jConfig`] |
//! | `MEMGRAPH_URI`, `MEMGRAPH_USERNAME`, `MEMGRAPH_PASSWORD` | [`MemgraphConfig`] |

use serde::{Deserialize, Serialize};

use neontology_core::{NeontologyError, Result};

/// Which engine to run and how to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "UPPERCASE")]
pub enum EngineConfig {
    Neo4j(Neo4jConfig),
    Memgraph(MemgraphConfig),
    /// The in-process engine; takes no parameters.
    Memory,
}

impl EngineConfig {
    /// Pick the engine named by `NEONTOLOGY_ENGINE`, leaving every
    /// connection parameter to be read from the environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let engine = lookup("NEONTOLOGY_ENGINE").ok_or_else(|| NeontologyError::MissingConfig {
            engine: "neontology".into(),
            key: "NEONTOLOGY_ENGINE".into(),
        })?;
        match engine.trim().to_ascii_uppercase().as_str() {
            "NEO4J" => Ok(EngineConfig::Neo4j(Neo4jConfig::default())),
            "MEMGRAPH" => Ok(EngineConfig::Memgraph(MemgraphConfig::default())),
            "MEMORY" => Ok(EngineConfig::Memory),
            other => Err(NeontologyError::InvalidConfig(format!(
                "unknown engine '{other}' in NEONTOLOGY_ENGINE"
            ))),
        }
    }

    /// Check explicitly given values without touching the environment.
    pub fn validate(&self) -> Result<()> {
        match self {
            EngineConfig::Neo4j(c) => check_uri("neo4j", c.uri.as_deref()),
            EngineConfig::Memgraph(c) => check_uri("memgraph", c.uri.as_deref()),
            EngineConfig::Memory => Ok(()),
        }
    }

    pub fn engine_name(&self) -> &'static str {
        match self {
            EngineConfig::Neo4j(_) => "neo4j",
            EngineConfig::Memgraph(_) => "memgraph",
            EngineConfig::Memory => "memory",
        }
    }
}

fn check_uri(engine: &str, uri: Option<&str>) -> Result<()> {
    match uri {
        Some(uri) if uri.trim().is_empty() => Err(NeontologyError::InvalidConfig(format!(
            "the {engine} uri is empty"
        ))),
        Some(uri) if !uri.contains("://") => Err(NeontologyError::InvalidConfig(format!(
            "the {engine} uri '{uri}' has no scheme, e.g. bolt://localhost:7687"
        ))),
        _ => Ok(()),
    }
}

/// Neo4j connection parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neo4jConfig {
    pub uri: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Database name; the server default when unset.
    pub database: Option<String>,
}

/// Fully resolved Neo4j parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neo4jSettings {
    pub uri: String,
    pub username: String,
    pub password: String,
    pub database: Option<String>,
}

impl Neo4jConfig {
    pub fn new(uri: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Neo4jConfig {
            uri: Some(uri.into()),
            username: Some(username.into()),
            password: Some(password.into()),
            database: None,
        }
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Fill unset values from the environment.
    pub fn resolve(&self) -> Result<Neo4jSettings> {
        dotenv::dotenv().ok();
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Fill unset values from `lookup`; explicit values win.
    pub fn resolve_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<Neo4jSettings> {
        let get = |explicit: &Option<String>, key: &str| {
            explicit
                .clone()
                .or_else(|| lookup(key))
                .ok_or_else(|| NeontologyError::MissingConfig {
                    engine: "neo4j".into(),
                    key: key.into(),
                })
        };
        let settings = Neo4jSettings {
            uri: get(&self.uri, "NEO4J_URI")?,
            username: get(&self.username, "NEO4J_USERNAME")?,
            password: get(&self.password, "NEO4J_PASSWORD")?,
            database: self.database.clone().or_else(|| lookup("NEO4J_DATABASE")),
        };
        check_uri("neo4j", Some(&settings.uri))?;
        Ok(settings)
    }
}

/// Memgraph connection parameters. Username and password may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemgraphConfig {
    pub uri: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Fully resolved Memgraph parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemgraphSettings {
    pub uri: String,
    pub username: String,
    pub password: String,
}

impl MemgraphConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        MemgraphConfig {
            uri: Some(uri.into()),
            ..Default::default()
        }
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn resolve(&self) -> Result<MemgraphSettings> {
        dotenv::dotenv().ok();
        self.resolve_with(|key| std::env::var(key).ok())
    }

    pub fn resolve_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<MemgraphSettings> {
        let uri = self
            .uri
            .clone()
            .or_else(|| lookup("MEMGRAPH_URI"))
            .ok_or_else(|| NeontologyError::MissingConfig {
                engine: "memgraph".into(),
                key: "MEMGRAPH_URI".into(),
            })?;
        check_uri("memgraph", Some(&uri))?;
        Ok(MemgraphSettings {
            uri,
            username: self.username.clone().or_else(|| lookup("MEMGRAPH_USERNAME")).unwrap_or_default(),
            password: self.password.clone().or_else(|| lookup("MEMGRAPH_PASSWORD")).unwrap_or_default(),
        })
    }
}
