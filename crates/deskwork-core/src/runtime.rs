//! Wiring of store, notification worker and engine from configuration.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{DeskworkConfig, TransportKind};
use crate::db::Store;
use crate::engine::{EngineOptions, UpdateEngine};
use crate::notify::{
    DisabledQueue, DispatchStats, Dispatcher, LogTransport, NotificationQueue,
    NotificationTransport, SpoolTransport,
};

/// A configured engine plus the notification worker feeding its transport.
pub struct Runtime {
    engine: UpdateEngine,
    dispatcher: Option<Arc<Dispatcher>>,
}

impl Runtime {
    /// Open the store under `state_dir` and start the notification worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or the worker thread
    /// cannot be spawned.
    pub fn open(state_dir: &Path, config: &DeskworkConfig) -> Result<Self> {
        Self::open_with_clock(state_dir, config, Arc::new(SystemClock))
    }

    /// Like [`Self::open`], with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`Self::open`].
    pub fn open_with_clock(
        state_dir: &Path,
        config: &DeskworkConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let store = Store::open(&config.database_path(state_dir), &config.database)?;

        let (queue, dispatcher) = if config.notifications.enabled {
            let transport: Arc<dyn NotificationTransport> = match config.notifications.transport {
                TransportKind::Log => Arc::new(LogTransport),
                TransportKind::Spool => Arc::new(SpoolTransport::new(config.spool_path(state_dir))),
            };
            let dispatcher =
                Arc::new(Dispatcher::start(transport).context("start notification worker")?);
            let queue: Arc<dyn NotificationQueue> = dispatcher.clone();
            (queue, Some(dispatcher))
        } else {
            let queue: Arc<dyn NotificationQueue> = Arc::new(DisabledQueue);
            (queue, None)
        };

        let engine = UpdateEngine::new(store, queue, clock).with_options(EngineOptions {
            reject_stale_writes: config.engine.reject_stale_writes,
        });

        tracing::debug!(
            state_dir = %state_dir.display(),
            notifications = config.notifications.enabled,
            reject_stale_writes = config.engine.reject_stale_writes,
            "runtime ready"
        );
        Ok(Self { engine, dispatcher })
    }

    #[must_use]
    pub const fn engine(&self) -> &UpdateEngine {
        &self.engine
    }

    /// Wait for queued notifications to be delivered and stop the worker.
    pub fn shutdown(self) -> DispatchStats {
        self.dispatcher
            .as_deref()
            .map(Dispatcher::shutdown)
            .unwrap_or_default()
    }
}
