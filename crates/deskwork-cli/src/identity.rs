//! Acting-user resolution for CLI commands.
//!
//! The resolution chain: `--as` flag > `DESKWORK_USER` env > `acting_user`
//! in the user-level config. Commands that change items require a user;
//! `update --system` acts as the system instead.

use std::env;
use std::fmt;

use rusqlite::Connection;

use deskwork_core::db::query;
use deskwork_core::engine::Requester;

/// Errors from acting-user resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityError {
    pub message: String,
    pub code: &'static str,
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for IdentityError {}

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

fn resolve_user_id_with(
    cli_flag: Option<i64>,
    env: &dyn EnvReader,
    config_user: Option<i64>,
) -> Result<Option<i64>, IdentityError> {
    if let Some(id) = cli_flag {
        return Ok(Some(id));
    }

    if let Some(raw) = env.get("DESKWORK_USER") {
        return raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| IdentityError {
                message: format!("DESKWORK_USER must be a numeric user id, got '{raw}'"),
                code: "invalid_user",
            });
    }

    Ok(config_user)
}

/// Resolve the acting user id without touching the store.
pub fn resolve_user_id(
    cli_flag: Option<i64>,
    config_user: Option<i64>,
) -> Result<Option<i64>, IdentityError> {
    resolve_user_id_with(cli_flag, &RealEnv, config_user)
}

/// Resolve the acting user and load their role.
pub fn require_requester(
    conn: &Connection,
    cli_flag: Option<i64>,
    config_user: Option<i64>,
) -> Result<Requester, IdentityError> {
    let id = resolve_user_id(cli_flag, config_user)?.ok_or_else(|| IdentityError {
        message: "An acting user is required for this command. \
                  Set --as, DESKWORK_USER, or acting_user in the user config."
            .to_string(),
        code: "missing_user",
    })?;
    lookup(conn, id)
}

fn lookup(conn: &Connection, id: i64) -> Result<Requester, IdentityError> {
    let user = query::get_user(conn, id).map_err(|e| IdentityError {
        message: format!("failed to load user {id}: {e:#}"),
        code: "storage_failure",
    })?;
    user.map(|u| Requester {
        id: u.id,
        role: u.role,
    })
    .ok_or_else(|| IdentityError {
        message: format!("user {id} does not exist"),
        code: "unknown_user",
    })
}
