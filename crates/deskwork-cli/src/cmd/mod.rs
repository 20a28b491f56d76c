pub mod create;
pub mod init;
pub mod show;
pub mod tag;
pub mod update;
pub mod user;

use anyhow::Result;
use rusqlite::Connection;
use std::path::PathBuf;

use deskwork_core::config::{self, DeskworkConfig};
use deskwork_core::db::{Store, query};
use deskwork_core::engine::Requester;
use deskwork_core::error::{ErrorCode, UpdateError};
use deskwork_core::model::{ItemRef, SeqRef};
use deskwork_core::runtime::Runtime;

use crate::identity::{self, IdentityError};
use crate::output::{CliError, OutputMode, render_error};

/// Settings every command receives from the top-level flags.
#[derive(Debug, Clone)]
pub struct Ctx {
    pub output: OutputMode,
    pub as_user: Option<i64>,
    pub config_user: Option<i64>,
    pub project_root: PathBuf,
}

impl Ctx {
    /// Resolve and load the acting user, rendering the failure.
    pub fn requester(&self, conn: &Connection) -> Result<Requester> {
        identity::require_requester(conn, self.as_user, self.config_user)
            .map_err(|e| self.identity_failure(&e))
    }

    /// Like [`Self::requester`], but an unset identity is not an error.
    pub fn optional_requester(&self, conn: &Connection) -> Result<Option<Requester>> {
        match identity::resolve_user_id(self.as_user, self.config_user) {
            Ok(None) => Ok(None),
            Ok(Some(_)) => self.requester(conn).map(Some),
            Err(e) => Err(self.identity_failure(&e)),
        }
    }

    fn identity_failure(&self, e: &IdentityError) -> anyhow::Error {
        let _ = render_error(
            self.output,
            &CliError::with_details(&e.message, "Set --as or DESKWORK_USER", e.code),
        );
        anyhow::anyhow!("{}", e.message)
    }

    /// Render an engine error and convert it for `main`.
    pub fn engine_failure(&self, err: &UpdateError) -> anyhow::Error {
        let _ = render_error(self.output, &CliError::from(err));
        anyhow::anyhow!("{err}")
    }

    /// Render a coded error and convert it for `main`.
    pub fn failure(&self, message: impl Into<String>, code: ErrorCode) -> anyhow::Error {
        let message = message.into();
        let _ = render_error(self.output, &CliError::coded(&message, code));
        anyhow::anyhow!(message)
    }
}

/// An initialized `.deskwork/` directory and its loaded config.
#[derive(Debug)]
pub struct Workspace {
    pub state_dir: PathBuf,
    pub config: DeskworkConfig,
}

impl Workspace {
    /// Find `.deskwork/` at or above the project root and load its config.
    pub fn locate(ctx: &Ctx) -> Result<Self> {
        let Some(state_dir) = config::find_state_dir(&ctx.project_root) else {
            return Err(ctx.failure(
                "not a deskwork workspace: .deskwork directory not found",
                ErrorCode::NotInitialized,
            ));
        };
        let config = config::load_config(&state_dir)
            .map_err(|e| ctx.failure(format!("{e:#}"), ErrorCode::ConfigParseError))?;
        tracing::debug!(state_dir = %state_dir.display(), "workspace located");
        Ok(Self { state_dir, config })
    }

    pub fn database_path(&self) -> PathBuf {
        self.config.database_path(&self.state_dir)
    }

    /// Open the store without starting the notification worker.
    pub fn open_store(&self) -> Result<Store> {
        Store::open(&self.database_path(), &self.config.database)
    }

    pub fn open_runtime(&self) -> Result<Runtime> {
        Runtime::open(&self.state_dir, &self.config)
    }
}

/// Resolve a `TKT-n` / `TSK-n` reference to a stored item.
pub fn resolve_ref(ctx: &Ctx, conn: &Connection, raw: &str) -> Result<ItemRef> {
    let seq_ref = raw.parse::<SeqRef>().map_err(|e| {
        let _ = render_error(
            ctx.output,
            &CliError::with_details(
                e.to_string(),
                "Use a reference such as TKT-12 or TSK-3",
                ErrorCode::InvalidPayload.code(),
            ),
        );
        anyhow::anyhow!("{e}")
    })?;

    match query::find_by_seq(conn, seq_ref)? {
        Some(item) => Ok(item),
        None => Err(ctx.failure(format!("{seq_ref} not found"), ErrorCode::ItemNotFound)),
    }
}
