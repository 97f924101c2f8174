//! Async utilities — long-lived background tasks keyed by identifier.
//!
//! Utilities are built from named factories and started with a shutdown
//! signal. The registry keeps one slot per identifier; starting a second
//! task under a live identifier fails, as does cancelling an unknown one.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use keystone_core::UtilityConfig;
use serde_json::Value;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

pub type UtilityFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A background service started once per application root.
pub trait AsyncUtility: Send + Sync + 'static {
    /// Run until `shutdown` flips to `true` (or the task is aborted).
    fn initialize(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> UtilityFuture;
}

/// Builds a utility from the `settings` table of its configuration.
pub type UtilityFactory =
    Arc<dyn Fn(&Value) -> DbResult<Arc<dyn AsyncUtility>> + Send + Sync>;

struct UtilitySlot {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    config: Option<UtilityConfig>,
    utility: Option<Arc<dyn AsyncUtility>>,
}

impl UtilitySlot {
    fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        self.handle.abort();
    }
}

#[derive(Default)]
pub struct UtilityRegistry {
    factories: HashMap<String, UtilityFactory>,
    slots: RwLock<HashMap<String, UtilitySlot>>,
}

impl UtilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_factory(&mut self, name: impl Into<String>, factory: UtilityFactory) {
        let name = name.into();
        debug!(factory = %name, "utility factory registered");
        self.factories.insert(name, factory);
    }

    pub fn has_factory(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build the utility named by `config.factory` and start it under
    /// `config.provides`.
    pub async fn add_async_utility(&self, config: &UtilityConfig) -> DbResult<Arc<dyn AsyncUtility>> {
        let factory = self
            .factories
            .get(&config.factory)
            .ok_or_else(|| DbError::UnknownFactory(config.factory.clone()))?;

        let mut slots = self.slots.write().await;
        if slots.contains_key(&config.provides) {
            return Err(DbError::DuplicateIdentifier(config.provides.clone()));
        }

        let utility = factory(&config.settings)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(utility.clone().initialize(shutdown_rx));

        slots.insert(
            config.provides.clone(),
            UtilitySlot {
                handle,
                shutdown_tx,
                config: Some(config.clone()),
                utility: Some(utility.clone()),
            },
        );
        info!(provides = %config.provides, factory = %config.factory, "async utility started");
        Ok(utility)
    }

    /// Register an arbitrary task under `ident`.
    pub async fn add_async_task<F>(
        &self,
        ident: &str,
        config: Option<UtilityConfig>,
        task: F,
    ) -> DbResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slots = self.slots.write().await;
        if slots.contains_key(ident) {
            return Err(DbError::DuplicateIdentifier(ident.to_string()));
        }

        let (shutdown_tx, _) = watch::channel(false);
        let handle = tokio::spawn(task);
        slots.insert(
            ident.to_string(),
            UtilitySlot {
                handle,
                shutdown_tx,
                config,
                utility: None,
            },
        );
        info!(%ident, "async task started");
        Ok(())
    }

    /// Signal shutdown and abort the task. The identifier stays registered.
    pub async fn cancel_async_utility(&self, ident: &str) -> DbResult<()> {
        let slots = self.slots.read().await;
        let slot = slots
            .get(ident)
            .ok_or_else(|| DbError::UnknownIdentifier(ident.to_string()))?;
        if !slot.handle.is_finished() {
            slot.stop();
            info!(%ident, "async utility cancelled");
        }
        Ok(())
    }

    /// Cancel the task and forget the identifier, returning its configuration.
    pub async fn del_async_utility(&self, ident: &str) -> DbResult<Option<UtilityConfig>> {
        let mut slots = self.slots.write().await;
        let slot = slots
            .remove(ident)
            .ok_or_else(|| DbError::UnknownIdentifier(ident.to_string()))?;
        slot.stop();
        info!(%ident, "async utility removed");
        Ok(slot.config)
    }

    pub async fn get_utility(&self, ident: &str) -> Option<Arc<dyn AsyncUtility>> {
        let slots = self.slots.read().await;
        slots.get(ident).and_then(|slot| slot.utility.clone())
    }

    pub async fn get_config(&self, ident: &str) -> Option<UtilityConfig> {
        let slots = self.slots.read().await;
        slots.get(ident).and_then(|slot| slot.config.clone())
    }

    /// Registered identifiers, sorted.
    pub async fn active_utilities(&self) -> Vec<String> {
        let slots = self.slots.read().await;
        let mut idents: Vec<String> = slots.keys().cloned().collect();
        idents.sort();
        idents
    }

    pub async fn is_running(&self, ident: &str) -> bool {
        let slots = self.slots.read().await;
        slots.get(ident).is_some_and(|slot| !slot.handle.is_finished())
    }

    /// Stop and unregister everything (for graceful shutdown).
    pub async fn shutdown_all(&self) {
        let mut slots = self.slots.write().await;
        for (ident, slot) in slots.drain() {
            slot.stop();
            debug!(%ident, "async utility stopped");
        }
        info!("all async utilities stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Ticker {
        ticks: AtomicUsize,
    }

    impl AsyncUtility for Ticker {
        fn initialize(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> UtilityFuture {
            Box::pin(async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(5)) => {
                            self.ticks.fetch_add(1, Ordering::Relaxed);
                        }
                        _ = shutdown.changed() => break,
                    }
                }
            })
        }
    }

    fn registry() -> UtilityRegistry {
        let mut registry = UtilityRegistry::new();
        registry.register_factory(
            "ticker",
            Arc::new(|settings: &Value| {
                if settings.get("fail").is_some() {
                    return Err(DbError::UtilitySettings("fail requested".into()));
                }
                let utility: Arc<dyn AsyncUtility> = Arc::new(Ticker {
                    ticks: AtomicUsize::new(0),
                });
                Ok(utility)
            }),
        );
        registry
    }

    async fn wait_stopped(registry: &UtilityRegistry, ident: &str) -> bool {
        for _ in 0..100 {
            if !registry.is_running(ident).await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    #[tokio::test]
    async fn start_and_cancel() {
        let registry = registry();
        registry
            .add_async_utility(&UtilityConfig::new("clock", "ticker"))
            .await
            .unwrap();
        assert!(registry.is_running("clock").await);
        assert!(registry.get_utility("clock").await.is_some());

        registry.cancel_async_utility("clock").await.unwrap();
        assert!(wait_stopped(&registry, "clock").await);
        // Still registered after cancellation.
        assert_eq!(registry.active_utilities().await, vec!["clock"]);
    }

    #[tokio::test]
    async fn duplicate_identifier_is_rejected() {
        let registry = registry();
        let config = UtilityConfig::new("clock", "ticker");
        registry.add_async_utility(&config).await.unwrap();

        let err = registry.add_async_utility(&config).await.err().unwrap();
        assert!(matches!(err, DbError::DuplicateIdentifier(id) if id == "clock"));

        let err = registry
            .add_async_task("clock", None, async {})
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::DuplicateIdentifier(_)));
        registry.shutdown_all().await;
    }

    #[tokio::test]
    async fn unknown_identifier_and_factory() {
        let registry = registry();
        assert!(matches!(
            registry.cancel_async_utility("ghost").await,
            Err(DbError::UnknownIdentifier(_))
        ));
        assert!(matches!(
            registry.del_async_utility("ghost").await,
            Err(DbError::UnknownIdentifier(_))
        ));
        assert!(matches!(
            registry
                .add_async_utility(&UtilityConfig::new("x", "missing"))
                .await,
            Err(DbError::UnknownFactory(name)) if name == "missing"
        ));
    }

    #[tokio::test]
    async fn factory_settings_errors_leave_no_slot() {
        let registry = registry();
        let config = UtilityConfig::new("clock", "ticker").with_settings(json!({"fail": true}));
        assert!(matches!(
            registry.add_async_utility(&config).await,
            Err(DbError::UtilitySettings(_))
        ));
        assert!(registry.active_utilities().await.is_empty());
    }

    #[tokio::test]
    async fn delete_returns_config() {
        let registry = registry();
        let config = UtilityConfig::new("clock", "ticker").with_settings(json!({"interval_secs": 1}));
        registry.add_async_utility(&config).await.unwrap();

        let removed = registry.del_async_utility("clock").await.unwrap();
        assert_eq!(removed, Some(config));
        assert!(registry.active_utilities().await.is_empty());
        assert!(registry.get_utility("clock").await.is_none());
    }

    #[tokio::test]
    async fn plain_tasks_and_shutdown_all() {
        let registry = registry();
        registry
            .add_async_task("sleeper", None, async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            })
            .await
            .unwrap();
        registry
            .add_async_utility(&UtilityConfig::new("clock", "ticker"))
            .await
            .unwrap();

        assert_eq!(registry.active_utilities().await, vec!["clock", "sleeper"]);
        assert!(registry.get_utility("sleeper").await.is_none());

        registry.shutdown_all().await;
        assert!(registry.active_utilities().await.is_empty());
    }
}
