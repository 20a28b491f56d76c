//! Background notification worker.
//!
//! Submission pushes onto an unbounded channel and returns immediately.
//! A single named thread delivers in FIFO order. Failures are logged and
//! dropped; there is no retry, no timeout and no cancellation.

use std::io;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{Receiver, Sender};

use super::Notification;
use super::transport::NotificationTransport;

/// Sink the engine hands committed notifications to.
pub trait NotificationQueue: Send + Sync {
    /// Enqueue without waiting for delivery.
    fn submit(&self, notification: Notification);
}

enum DispatchCommand {
    Deliver(Box<Notification>),
    Shutdown,
}

/// Delivery counters reported when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: usize,
    pub failed: usize,
}

/// Channel-fed delivery worker.
pub struct Dispatcher {
    tx: Sender<DispatchCommand>,
    worker: Mutex<Option<JoinHandle<DispatchStats>>>,
}

impl Dispatcher {
    /// Spawn the worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn start(transport: Arc<dyn NotificationTransport>) -> io::Result<Self> {
        let (tx, rx) = crossbeam::channel::unbounded();
        let worker = thread::Builder::new()
            .name("deskwork-notify".to_string())
            .spawn(move || run_dispatch_loop(transport.as_ref(), &rx))?;
        Ok(Self {
            tx,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Deliver everything already queued, then stop the worker.
    ///
    /// Later calls return empty stats.
    pub fn shutdown(&self) -> DispatchStats {
        let handle = match self.worker.lock() {
            Ok(mut worker) => worker.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return DispatchStats::default();
        };

        let _ = self.tx.send(DispatchCommand::Shutdown);
        handle.join().unwrap_or_else(|_| {
            tracing::warn!("notification worker panicked");
            DispatchStats::default()
        })
    }
}

impl NotificationQueue for Dispatcher {
    fn submit(&self, notification: Notification) {
        let template = notification.template;
        if self
            .tx
            .send(DispatchCommand::Deliver(Box::new(notification)))
            .is_err()
        {
            tracing::warn!(template = %template, "notification worker stopped; notification dropped");
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn run_dispatch_loop(
    transport: &dyn NotificationTransport,
    rx: &Receiver<DispatchCommand>,
) -> DispatchStats {
    let mut stats = DispatchStats::default();
    while let Ok(cmd) = rx.recv() {
        match cmd {
            DispatchCommand::Deliver(notification) => {
                match transport.deliver(&notification) {
                    Ok(()) => stats.delivered += 1,
                    Err(err) => {
                        stats.failed += 1;
                        tracing::warn!(
                            recipient = %notification.recipient,
                            template = %notification.template,
                            error = %err,
                            "notification delivery failed"
                        );
                    }
                }
            }
            DispatchCommand::Shutdown => break,
        }
    }
    stats
}

/// Queue used when notifications are turned off in config.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledQueue;

impl NotificationQueue for DisabledQueue {
    fn submit(&self, notification: Notification) {
        tracing::debug!(
            recipient = %notification.recipient,
            template = %notification.template,
            "notifications disabled; dropped"
        );
    }
}
