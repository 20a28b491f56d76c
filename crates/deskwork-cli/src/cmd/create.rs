//! `dw ticket create` / `dw task create`: open new work items.
//!
//! Tickets may be filed anonymously with submitter contact details; the
//! acting user, if any, is recorded as the ticket's creator. Tasks always
//! belong to the acting user.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::io::Write;

use deskwork_core::clock::{Clock, SystemClock};
use deskwork_core::db::intake::{self, Created, NewTask, NewTicket};
use deskwork_core::engine::parse_due;
use deskwork_core::model::ItemKind;

use super::{Ctx, Workspace};
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum TicketCommand {
    /// Open a ticket.
    Create(TicketCreateArgs),
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Create a task owned by the acting user.
    Create(TaskCreateArgs),
}

#[derive(Args, Debug)]
pub struct TicketCreateArgs {
    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub description: Option<String>,

    /// Name of the person who reported the issue.
    #[arg(long)]
    pub submitter_name: Option<String>,

    /// Address that receives status notifications.
    #[arg(long)]
    pub submitter_email: Option<String>,
}

#[derive(Args, Debug)]
pub struct TaskCreateArgs {
    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub description: Option<String>,

    /// Due date (RFC 3339 or YYYY-MM-DD).
    #[arg(long)]
    pub due: Option<String>,

    /// Recurrence rule, e.g. `FREQ=WEEKLY`.
    #[arg(long)]
    pub recur: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateOutput {
    reference: String,
    kind: ItemKind,
    id: i64,
    title: String,
}

impl CreateOutput {
    fn new(created: &Created, title: &str) -> Self {
        Self {
            reference: created.seq.to_string(),
            kind: created.item.kind,
            id: created.item.id,
            title: title.trim().to_string(),
        }
    }
}

pub fn run_ticket(command: &TicketCommand, ctx: &Ctx) -> Result<()> {
    let TicketCommand::Create(args) = command;
    let workspace = Workspace::locate(ctx)?;
    let store = workspace.open_store()?;
    let mut conn = store.checkout()?;
    let creator = ctx.optional_requester(&conn)?;

    let created = intake::create_ticket(
        &mut conn,
        &NewTicket {
            title: args.title.clone(),
            description: args.description.clone(),
            submitter_name: args.submitter_name.clone(),
            submitter_email: args.submitter_email.clone(),
            created_by: creator.map(|r| r.id),
        },
        SystemClock.now_us(),
    )?;
    tracing::info!(item = %created.item, reference = %created.seq, "ticket created");
    render_created(ctx, &CreateOutput::new(&created, &args.title))
}

pub fn run_task(command: &TaskCommand, ctx: &Ctx) -> Result<()> {
    let TaskCommand::Create(args) = command;
    let due_at_us = args
        .due
        .as_deref()
        .map(parse_due)
        .transpose()
        .map_err(|e| ctx.engine_failure(&e))?;

    let workspace = Workspace::locate(ctx)?;
    let store = workspace.open_store()?;
    let mut conn = store.checkout()?;
    let creator = ctx.requester(&conn)?;

    let created = intake::create_task(
        &mut conn,
        &NewTask {
            title: args.title.clone(),
            description: args.description.clone(),
            creator_id: creator.id,
            due_at_us,
            recurrence_rule: args.recur.clone(),
        },
        SystemClock.now_us(),
    )?;
    tracing::info!(item = %created.item, reference = %created.seq, "task created");
    render_created(ctx, &CreateOutput::new(&created, &args.title))
}

fn render_created(ctx: &Ctx, result: &CreateOutput) -> Result<()> {
    render_mode(
        ctx.output,
        result,
        |r, w| writeln!(w, "{}\t{}", r.reference, r.title),
        |r, w| {
            pretty_section(w, &format!("Created {}", r.reference))?;
            pretty_kv(w, "Kind", r.kind.as_str())?;
            pretty_kv(w, "Title", &r.title)
        },
    )
}
