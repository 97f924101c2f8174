//! Transaction managers and the root object they hand out.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_core::Stream;
use futures_util::stream;
use serde_json::Value;
use tracing::trace;

use crate::error::{DbError, DbResult};
use crate::store::ObjectStore;

/// Entries fetched per store read while streaming items.
pub const ITEMS_PAGE_SIZE: usize = 64;

static NEXT_TM_ID: AtomicU64 = AtomicU64::new(1);

/// Hands out the root object of one database.
///
/// A request may carry its own manager; otherwise the database keeps a
/// lazily created one.
#[derive(Clone)]
pub struct TransactionManager {
    id: u64,
    store: ObjectStore,
}

impl TransactionManager {
    pub(crate) fn new(store: ObjectStore) -> Self {
        let id = NEXT_TM_ID.fetch_add(1, Ordering::Relaxed);
        trace!(tm = id, "transaction manager created");
        Self { id, store }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn root(&self) -> DbResult<Root> {
        Ok(Root {
            store: self.store.clone(),
        })
    }
}

/// The top-level container of a database.
#[derive(Clone)]
pub struct Root {
    store: ObjectStore,
}

impl Root {
    pub async fn async_get(&self, key: &str) -> DbResult<Option<Value>> {
        self.store.get(key)
    }

    pub async fn async_set(&self, key: &str, value: Value) -> DbResult<()> {
        self.store.put(key, &value)
    }

    /// Fails with [`DbError::NotFound`] when `key` is absent.
    pub async fn async_del(&self, key: &str) -> DbResult<()> {
        if self.store.delete(key)? {
            Ok(())
        } else {
            Err(DbError::NotFound(key.to_string()))
        }
    }

    pub async fn async_keys(&self) -> DbResult<Vec<String>> {
        self.store.keys()
    }

    pub async fn async_contains(&self, key: &str) -> DbResult<bool> {
        self.store.contains(key)
    }

    pub async fn async_len(&self) -> DbResult<usize> {
        self.store.len()
    }

    /// Lazily stream `(key, value)` pairs in key order.
    ///
    /// Entries are read [`ITEMS_PAGE_SIZE`] at a time as the consumer
    /// polls. A read error ends the stream after being yielded.
    pub fn items(&self) -> impl Stream<Item = DbResult<(String, Value)>> + Send + 'static + use<> {
        let paging = Paging {
            store: self.store.clone(),
            cursor: None,
            buffer: VecDeque::new(),
            done: false,
        };
        stream::unfold(paging, |mut paging| async move {
            loop {
                if let Some(item) = paging.buffer.pop_front() {
                    return Some((Ok(item), paging));
                }
                if paging.done {
                    return None;
                }
                match paging.store.page_after(paging.cursor.as_deref(), ITEMS_PAGE_SIZE) {
                    Ok(page) => {
                        paging.done = page.len() < ITEMS_PAGE_SIZE;
                        if let Some((key, _)) = page.last() {
                            paging.cursor = Some(key.clone());
                        }
                        paging.buffer.extend(page);
                    }
                    Err(e) => {
                        paging.done = true;
                        return Some((Err(e), paging));
                    }
                }
            }
        })
    }
}

struct Paging {
    store: ObjectStore,
    cursor: Option<String>,
    buffer: VecDeque<(String, Value)>,
    done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use serde_json::json;

    async fn root() -> Root {
        let store = ObjectStore::open_in_memory().unwrap();
        TransactionManager::new(store).root().await.unwrap()
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let root = root().await;
        assert!(matches!(
            root.async_del("ghost").await,
            Err(DbError::NotFound(key)) if key == "ghost"
        ));
    }

    #[tokio::test]
    async fn items_cross_page_boundaries() {
        let root = root().await;
        let total = ITEMS_PAGE_SIZE * 2 + 5;
        for i in 0..total {
            root.async_set(&format!("{i:04}"), json!(i)).await.unwrap();
        }

        let items: Vec<(String, Value)> = root
            .items()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(items.len(), total);
        assert_eq!(items[0], ("0000".to_string(), json!(0)));
        assert_eq!(items[total - 1].1, json!(total - 1));
    }

    #[tokio::test]
    async fn items_of_empty_root() {
        let root = root().await;
        assert_eq!(root.items().count().await, 0);
    }

    #[test]
    fn managers_have_distinct_ids() {
        let store = ObjectStore::open_in_memory().unwrap();
        let a = TransactionManager::new(store.clone());
        let b = TransactionManager::new(store);
        assert_ne!(a.id(), b.id());
    }
}
