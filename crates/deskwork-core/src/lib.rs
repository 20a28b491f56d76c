//! deskwork-core library.
//!
//! Work-item model, SQLite store, and the update/transition engine that
//! applies partial updates to tickets and tasks with an audit trail and
//! post-commit notifications.
//!
//! # Conventions
//!
//! - **Errors**: domain errors derive `thiserror::Error`; store helpers
//!   return `anyhow::Result` with context chains.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `debug!`) with
//!   structured fields.

pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod model;
pub mod notify;
pub mod runtime;

pub use engine::{Actor, Requester, UpdateEngine, UpdateOutcome};
pub use error::{ErrorCode, UpdateError};
