//! SQLite store utilities.
//!
//! Runtime defaults are intentionally conservative:
//! - `journal_mode = WAL` to allow concurrent readers while a writer commits
//! - `busy_timeout = 5s` to reduce transient lock failures under contention
//! - `foreign_keys = ON` to protect relational integrity between items and users

pub mod intake;
pub mod migrations;
pub mod query;
pub mod schema;

use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex};
use std::{path::Path, time::Duration};

use crate::config::DatabaseConfig;

/// Busy timeout used when no config is supplied.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) one SQLite connection and apply runtime pragmas.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created or the
/// database cannot be opened/configured.
pub fn open_connection(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create database directory {}", parent.display()))?;
    }

    let conn =
        Connection::open(path).with_context(|| format!("open database {}", path.display()))?;

    configure_connection(&conn, busy_timeout).context("configure sqlite pragmas")?;
    Ok(conn)
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

/// A fixed-size pool of configured, migrated SQLite connections.
///
/// Each engine phase checks a connection out and hands it back on drop, so
/// concurrent requests share the pool without a lock spanning the whole
/// load → commit sequence. Writers serialize inside SQLite.
pub struct Store {
    idle: Mutex<Vec<Connection>>,
    available: Condvar,
    size: usize,
}

impl Store {
    /// Open a pooled store at `path`, migrating the schema to the latest
    /// version.
    ///
    /// # Errors
    ///
    /// Returns an error if any connection fails to open or migrations fail.
    pub fn open(path: &Path, config: &DatabaseConfig) -> Result<Self> {
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let size = config.pool_size.max(1);

        let mut first = open_connection(path, busy_timeout)?;
        migrations::migrate(&mut first).context("apply store migrations")?;

        let mut idle = Vec::with_capacity(size);
        idle.push(first);
        for _ in 1..size {
            idle.push(open_connection(path, busy_timeout)?);
        }

        tracing::debug!(path = %path.display(), pool_size = size, "opened store");
        Ok(Self::from_connections(idle))
    }

    /// Single-connection in-memory store, for tests and throwaway sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if configuring or migrating the database fails.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().context("open in-memory database")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("enable foreign keys")?;
        migrations::migrate(&mut conn).context("apply store migrations")?;
        Ok(Self::from_connections(vec![conn]))
    }

    fn from_connections(idle: Vec<Connection>) -> Self {
        let size = idle.len();
        Self {
            idle: Mutex::new(idle),
            available: Condvar::new(),
            size,
        }
    }

    /// Number of connections owned by the pool.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Borrow a connection, blocking until one is idle.
    ///
    /// Never hold two checkouts on the same thread: with a pool of one the
    /// second call waits forever.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool mutex was poisoned by a panicking holder.
    pub fn checkout(&self) -> Result<PooledConnection<'_>> {
        let mut idle = self
            .idle
            .lock()
            .map_err(|_| anyhow!("connection pool poisoned"))?;
        loop {
            if let Some(conn) = idle.pop() {
                return Ok(PooledConnection {
                    store: self,
                    conn: Some(conn),
                });
            }
            idle = self
                .available
                .wait(idle)
                .map_err(|_| anyhow!("connection pool poisoned"))?;
        }
    }

    fn give_back(&self, conn: Connection) {
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(conn);
            self.available.notify_one();
        }
    }
}

/// A connection on loan from a [`Store`]; returned to the pool on drop.
pub struct PooledConnection<'a> {
    store: &'a Store,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("pooled connection present until drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("pooled connection present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.store.give_back(conn);
        }
    }
}
