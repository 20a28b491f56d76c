//! `dw user add`: register a helpdesk user.

use anyhow::Result;
use clap::{Args, Subcommand};
use std::io::Write;

use deskwork_core::clock::{Clock, SystemClock};
use deskwork_core::db::intake::{self, NewUser};
use deskwork_core::db::query;
use deskwork_core::error::ErrorCode;
use deskwork_core::model::Role;

use super::{Ctx, Workspace};
use crate::output::{CliError, pretty_kv, pretty_section, render_error, render_mode};

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Add a user.
    Add(UserAddArgs),
}

#[derive(Args, Debug)]
pub struct UserAddArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub email: String,

    /// `admin` or `staff`.
    #[arg(long, default_value = "staff")]
    pub role: String,
}

pub fn run_user(command: &UserCommand, ctx: &Ctx) -> Result<()> {
    match command {
        UserCommand::Add(args) => run_user_add(args, ctx),
    }
}

fn run_user_add(args: &UserAddArgs, ctx: &Ctx) -> Result<()> {
    let role = args
        .role
        .parse::<Role>()
        .map_err(|e| ctx.failure(e.to_string(), ErrorCode::InvalidEnumValue))?;

    let workspace = Workspace::locate(ctx)?;
    let store = workspace.open_store()?;
    let conn = store.checkout()?;
    if let Some(existing) = query::find_user_by_email(&conn, args.email.trim())? {
        let message = format!("a user with email {} already exists", existing.email);
        let _ = render_error(
            ctx.output,
            &CliError::with_details(
                &message,
                format!("Act as the existing user with --as {}", existing.id),
                "duplicate_user",
            ),
        );
        anyhow::bail!(message);
    }
    let user = intake::create_user(
        &conn,
        &NewUser {
            name: args.name.clone(),
            email: args.email.clone(),
            role,
        },
        SystemClock.now_us(),
    )?;
    tracing::info!(user = user.id, role = %user.role, "user added");

    render_mode(
        ctx.output,
        &user,
        |u, w| writeln!(w, "{}\t{}\t{}\t{}", u.id, u.name, u.email, u.role),
        |u, w| {
            pretty_section(w, &format!("User #{}", u.id))?;
            pretty_kv(w, "Name", &u.name)?;
            pretty_kv(w, "Email", &u.email)?;
            pretty_kv(w, "Role", u.role.as_str())
        },
    )
}
