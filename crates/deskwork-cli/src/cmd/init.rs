//! `dw init`: create the `.deskwork/` workspace.

use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::io::Write;

use deskwork_core::config::{CONFIG_FILE, DeskworkConfig, STATE_DIR};
use deskwork_core::db::Store;

use super::Ctx;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite the default config even if `.deskwork/` already exists.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct InitOutput {
    state_dir: String,
    config: String,
    database: String,
    reinitialized: bool,
}

/// Execute `dw init`. Creates:
///
/// ```text
/// .deskwork/
///   deskwork.toml   (default config)
///   deskwork.db     (migrated database)
/// ```
///
/// # Errors
///
/// Returns an error if `.deskwork/` already exists and `--force` is not
/// set, or if the directory, config or database cannot be created.
pub fn run_init(args: &InitArgs, ctx: &Ctx) -> Result<()> {
    let state_dir = ctx.project_root.join(STATE_DIR);
    let existed = state_dir.exists();
    if existed && !args.force {
        anyhow::bail!(".deskwork/ already exists. Use `dw init --force` to reinitialize.");
    }

    std::fs::create_dir_all(&state_dir)
        .with_context(|| format!("Failed to create {}", state_dir.display()))?;

    let config = DeskworkConfig::default();
    let config_path = state_dir.join(CONFIG_FILE);
    let rendered = toml::to_string_pretty(&config).context("Failed to render default config")?;
    std::fs::write(&config_path, rendered)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    let database = config.database_path(&state_dir);
    drop(Store::open(&database, &config.database)?);
    tracing::info!(state_dir = %state_dir.display(), "workspace initialized");

    let result = InitOutput {
        state_dir: state_dir.display().to_string(),
        config: config_path.display().to_string(),
        database: database.display().to_string(),
        reinitialized: existed,
    };
    render_mode(
        ctx.output,
        &result,
        |r, w| writeln!(w, "initialized\t{}", r.state_dir),
        |r, w| {
            pretty_section(w, "Initialized deskwork workspace")?;
            pretty_kv(w, "Directory", &r.state_dir)?;
            pretty_kv(w, "Config", &r.config)?;
            pretty_kv(w, "Database", &r.database)
        },
    )
}
