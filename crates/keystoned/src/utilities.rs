//! Built-in async utilities.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use keystone_db::{AsyncUtility, DbError, UtilityFactory, UtilityFuture, UtilityRegistry};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};

/// Factory name of [`Heartbeat`].
pub const HEARTBEAT_FACTORY: &str = "heartbeat";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HeartbeatSettings {
    #[serde(default = "default_interval_secs")]
    interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    60
}

/// Logs a beat every interval until shut down.
pub struct Heartbeat {
    interval: Duration,
    beats: AtomicU64,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            beats: AtomicU64::new(0),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::Relaxed)
    }
}

impl AsyncUtility for Heartbeat {
    fn initialize(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> UtilityFuture {
        Box::pin(async move {
            info!(interval_secs = self.interval.as_secs(), "heartbeat started");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {
                        let beat = self.beats.fetch_add(1, Ordering::Relaxed) + 1;
                        debug!(beat, "heartbeat");
                    }
                    _ = shutdown.changed() => {
                        info!(beats = self.beats(), "heartbeat shutting down");
                        break;
                    }
                }
            }
        })
    }
}

pub fn heartbeat_factory() -> UtilityFactory {
    Arc::new(|settings: &Value| {
        let settings: HeartbeatSettings = serde_json::from_value(settings.clone())
            .map_err(|e| DbError::UtilitySettings(e.to_string()))?;
        if settings.interval_secs == 0 {
            return Err(DbError::UtilitySettings(
                "heartbeat interval_secs must be positive".into(),
            ));
        }
        let utility: Arc<dyn AsyncUtility> =
            Arc::new(Heartbeat::new(Duration::from_secs(settings.interval_secs)));
        Ok(utility)
    })
}

/// Register every built-in factory.
pub fn register_builtin(registry: &mut UtilityRegistry) {
    registry.register_factory(HEARTBEAT_FACTORY, heartbeat_factory());
}
