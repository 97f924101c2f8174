//! ApplicationRoot — the process-wide registry of databases and utilities.
//!
//! Built once at startup from the configuration file and shared behind an
//! `Arc` by every request handler. Subscript-style mutation (`set_item`,
//! `del_item`) is meant for startup code and authorized request paths.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use keystone_core::{KeystoneConfig, UtilityConfig};
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::error::{DbError, DbResult};
use crate::utility::UtilityRegistry;

pub struct ApplicationRoot {
    dbs: RwLock<BTreeMap<String, Arc<Database>>>,
    utilities: UtilityRegistry,
    utility_configs: Vec<UtilityConfig>,
    config_file: Option<PathBuf>,
}

impl ApplicationRoot {
    pub fn new(config_file: Option<PathBuf>) -> Self {
        Self {
            dbs: RwLock::new(BTreeMap::new()),
            utilities: UtilityRegistry::new(),
            utility_configs: Vec::new(),
            config_file,
        }
    }

    /// Open every configured database. Utilities are remembered but not
    /// started until [`start_utilities`](Self::start_utilities), so
    /// factories can be registered first.
    pub fn from_config(config: &KeystoneConfig, config_file: Option<PathBuf>) -> DbResult<Self> {
        let mut root = Self::new(config_file);
        for (name, db_config) in &config.databases {
            let db = Database::open(name, db_config)?;
            root.set_item(name, db);
        }
        root.utility_configs = config.utilities.clone();
        info!(databases = root.len(), utilities = root.utility_configs.len(), "application root loaded");
        Ok(root)
    }

    /// Start every configured utility. Returns the identifiers started.
    pub async fn start_utilities(&self) -> DbResult<Vec<String>> {
        let mut started = Vec::with_capacity(self.utility_configs.len());
        for config in &self.utility_configs {
            if let Err(e) = self.utilities.add_async_utility(config).await {
                warn!(provides = %config.provides, error = %e, "failed to start utility");
                return Err(e);
            }
            started.push(config.provides.clone());
        }
        Ok(started)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dbs.read().expect("dbs lock").contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.dbs.read().expect("dbs lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fails with [`DbError::NotFound`] when `name` is not registered.
    pub fn get_item(&self, name: &str) -> DbResult<Arc<Database>> {
        self.dbs
            .read()
            .expect("dbs lock")
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::NotFound(name.to_string()))
    }

    pub fn set_item(&self, name: &str, db: impl Into<Arc<Database>>) {
        let mut dbs = self.dbs.write().expect("dbs lock");
        if dbs.insert(name.to_string(), db.into()).is_some() {
            debug!(database = %name, "database replaced");
        }
    }

    pub fn del_item(&self, name: &str) -> DbResult<Arc<Database>> {
        self.dbs
            .write()
            .expect("dbs lock")
            .remove(name)
            .ok_or_else(|| DbError::NotFound(name.to_string()))
    }

    /// Snapshot of `(name, database)` pairs in name order.
    pub fn items(&self) -> Vec<(String, Arc<Database>)> {
        self.dbs
            .read()
            .expect("dbs lock")
            .iter()
            .map(|(name, db)| (name.clone(), db.clone()))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.dbs.read().expect("dbs lock").keys().cloned().collect()
    }

    /// `None` when absent.
    pub async fn get(&self, name: &str) -> Option<Arc<Database>> {
        self.get_item(name).ok()
    }

    pub async fn async_get(&self, name: &str) -> DbResult<Arc<Database>> {
        self.get_item(name)
    }

    pub fn utilities(&self) -> &UtilityRegistry {
        &self.utilities
    }

    pub fn utilities_mut(&mut self) -> &mut UtilityRegistry {
        &mut self.utilities
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::DatabaseConfig;
    use serde_json::json;

    use crate::store::ObjectStore;

    fn memory_db(name: &str) -> Database {
        Database::new(name, ObjectStore::open_in_memory().unwrap())
    }

    #[test]
    fn subscript_operations() {
        let root = ApplicationRoot::new(None);
        assert!(root.is_empty());

        root.set_item("db", memory_db("db"));
        root.set_item("archive", memory_db("archive"));
        assert!(root.contains("db"));
        assert_eq!(root.len(), 2);
        assert_eq!(root.names(), vec!["archive", "db"]);
        assert_eq!(root.get_item("db").unwrap().id(), "db");

        root.del_item("db").unwrap();
        assert!(!root.contains("db"));
        assert!(matches!(root.get_item("db"), Err(DbError::NotFound(_))));
        assert!(matches!(root.del_item("db"), Err(DbError::NotFound(_))));
    }

    #[test]
    fn items_snapshot() {
        let root = ApplicationRoot::new(None);
        root.set_item("b", memory_db("b"));
        root.set_item("a", memory_db("a"));
        let ids: Vec<String> = root
            .items()
            .into_iter()
            .map(|(_, db)| db.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn async_lookups() {
        let root = ApplicationRoot::new(None);
        root.set_item("db", memory_db("db"));

        assert!(root.get("db").await.is_some());
        assert!(root.get("missing").await.is_none());
        assert!(root.async_get("db").await.is_ok());
        assert!(matches!(
            root.async_get("missing").await,
            Err(DbError::NotFound(name)) if name == "missing"
        ));
    }

    #[tokio::test]
    async fn from_config_opens_databases() {
        let mut config = KeystoneConfig::default();
        config.databases.insert("db".into(), DatabaseConfig::default());
        let root = ApplicationRoot::from_config(&config, Some(PathBuf::from("keystone.toml"))).unwrap();

        assert_eq!(root.names(), vec!["db"]);
        assert_eq!(root.config_file(), Some(Path::new("keystone.toml")));

        let db = root.async_get("db").await.unwrap();
        db.async_set("k", json!(true)).await.unwrap();
        assert_eq!(db.async_len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn start_utilities_requires_registered_factory() {
        let mut config = KeystoneConfig::default();
        config.utilities.push(UtilityConfig::new("clock", "unregistered"));
        let root = ApplicationRoot::from_config(&config, None).unwrap();
        assert!(matches!(
            root.start_utilities().await,
            Err(DbError::UnknownFactory(_))
        ));
    }
}
