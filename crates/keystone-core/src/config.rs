//! keystone.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeystoneConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Logical database name → storage settings.
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseConfig>,
    #[serde(default)]
    pub utilities: Vec<UtilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Frames a streaming response may queue ahead of the HTTP body.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_stream_buffer() -> usize {
    16
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// On-disk store location. Absent means in-memory.
    pub path: Option<PathBuf>,
}

/// A long-lived background utility started with the application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UtilityConfig {
    /// Identifier the utility is registered under.
    pub provides: String,
    /// Name of a registered utility factory.
    pub factory: String,
    #[serde(default = "empty_settings")]
    pub settings: serde_json::Value,
}

fn empty_settings() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl UtilityConfig {
    pub fn new(provides: impl Into<String>, factory: impl Into<String>) -> Self {
        Self {
            provides: provides.into(),
            factory: factory.into(),
            settings: empty_settings(),
        }
    }

    pub fn with_settings(mut self, settings: serde_json::Value) -> Self {
        self.settings = settings;
        self
    }
}

impl KeystoneConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: KeystoneConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a minimal keystone.toml with one in-memory database.
    pub fn scaffold(database: &str) -> Self {
        let mut databases = BTreeMap::new();
        databases.insert(database.to_string(), DatabaseConfig::default());
        KeystoneConfig {
            server: ServerConfig::default(),
            databases,
            utilities: vec![UtilityConfig::new("heartbeat", "heartbeat")
                .with_settings(serde_json::json!({ "interval_secs": 60 }))],
        }
    }
}
