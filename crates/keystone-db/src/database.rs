//! A named database and its transaction root.
//!
//! Every `async_*` operation resolves the root through the database's
//! own transaction manager, created on first use. Handlers that already
//! hold a request-scoped manager pass it to
//! [`get_transaction_manager`](Database::get_transaction_manager).

use std::sync::OnceLock;

use futures_core::Stream;
use keystone_core::DatabaseConfig;
use serde_json::Value;
use tracing::info;

use crate::error::DbResult;
use crate::store::ObjectStore;
use crate::transaction::{Root, TransactionManager};

pub struct Database {
    id: String,
    store: ObjectStore,
    tm: OnceLock<TransactionManager>,
}

impl Database {
    pub fn new(id: impl Into<String>, store: ObjectStore) -> Self {
        Self {
            id: id.into(),
            store,
            tm: OnceLock::new(),
        }
    }

    /// Open the store described by `config` (in memory when no path is set).
    pub fn open(id: &str, config: &DatabaseConfig) -> DbResult<Self> {
        let store = match &config.path {
            Some(path) => ObjectStore::open(path)?,
            None => ObjectStore::open_in_memory()?,
        };
        info!(database = %id, path = ?config.path, "database opened");
        Ok(Self::new(id, store))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The request's manager when given, else this database's own.
    pub fn get_transaction_manager(&self, request_tm: Option<&TransactionManager>) -> TransactionManager {
        match request_tm {
            Some(tm) => tm.clone(),
            None => self
                .tm
                .get_or_init(|| self.new_transaction_manager())
                .clone(),
        }
    }

    pub fn new_transaction_manager(&self) -> TransactionManager {
        TransactionManager::new(self.store.clone())
    }

    pub async fn get_root(&self) -> DbResult<Root> {
        self.get_transaction_manager(None).root().await
    }

    pub async fn async_get(&self, key: &str) -> DbResult<Option<Value>> {
        self.get_root().await?.async_get(key).await
    }

    pub async fn async_keys(&self) -> DbResult<Vec<String>> {
        self.get_root().await?.async_keys().await
    }

    pub async fn async_set(&self, key: &str, value: Value) -> DbResult<()> {
        self.get_root().await?.async_set(key, value).await
    }

    pub async fn async_del(&self, key: &str) -> DbResult<()> {
        self.get_root().await?.async_del(key).await
    }

    pub async fn async_items(
        &self,
    ) -> DbResult<impl Stream<Item = DbResult<(String, Value)>> + Send + 'static> {
        Ok(self.get_root().await?.items())
    }

    pub async fn async_contains(&self, key: &str) -> DbResult<bool> {
        self.get_root().await?.async_contains(key).await
    }

    pub async fn async_len(&self) -> DbResult<usize> {
        self.get_root().await?.async_len().await
    }
}
