//! Delivery backends for notifications.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::Notification;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("spool write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode notification: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("transport rejected notification: {0}")]
    Rejected(String),
}

/// Best-effort delivery of one notification.
pub trait NotificationTransport: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] when the message could not be handed off.
    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Emits each notification as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

impl NotificationTransport for LogTransport {
    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        tracing::info!(
            recipient = %notification.recipient,
            template = %notification.template,
            reference = notification.params.get("reference").map(String::as_str),
            "notification delivered to log"
        );
        Ok(())
    }
}

/// Appends one JSON line per notification for an external mailer.
#[derive(Debug)]
pub struct SpoolTransport {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SpoolTransport {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NotificationTransport for SpoolTransport {
    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let mut line = serde_json::to_string(notification)?;
        line.push('\n');

        let _guard = self
            .lock
            .lock()
            .map_err(|_| DeliveryError::Rejected("spool lock poisoned".into()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
