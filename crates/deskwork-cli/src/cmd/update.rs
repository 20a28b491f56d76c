//! `dw update`: apply a partial update through the transition engine.
//!
//! Every flag maps onto one field of the update payload. Omitted flags
//! leave the field untouched; `--unassign`, `--clear-due` and
//! `--clear-recur` clear it, as does an empty `--description` or
//! `--resolution`.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::Write;

use deskwork_core::clock::format_us;
use deskwork_core::engine::{
    Actor, PartialEnrichment, UpdateOutcome, UpdatePayload, WorkItemView,
};
use deskwork_core::error::ErrorCode;

use super::{Ctx, Workspace, resolve_ref};
use crate::output::{pretty_kv, pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Item reference, e.g. TKT-12 or TSK-3.
    pub reference: String,

    /// New status (open, assigned, in_progress, closed, completed).
    #[arg(long)]
    pub status: Option<String>,

    /// Assign to a user id.
    #[arg(long, conflicts_with = "unassign")]
    pub assign: Option<i64>,

    #[arg(long)]
    pub unassign: bool,

    #[arg(long)]
    pub title: Option<String>,

    /// New description (pass an empty string to clear).
    #[arg(long)]
    pub description: Option<String>,

    /// Resolution notes. Recording notes closes the item.
    #[arg(long)]
    pub resolution: Option<String>,

    /// Due date (RFC 3339 or YYYY-MM-DD).
    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,

    #[arg(long)]
    pub clear_due: bool,

    /// Recurrence rule (tasks only).
    #[arg(long, conflicts_with = "clear_recur")]
    pub recur: Option<String>,

    #[arg(long)]
    pub clear_recur: bool,

    /// Apply as the system instead of the acting user.
    #[arg(long)]
    pub system: bool,
}

impl UpdateArgs {
    fn payload(&self) -> UpdatePayload {
        let set_or_clear = |value: &Option<String>, clear: bool| {
            if clear {
                Some(None)
            } else {
                value.clone().map(Some)
            }
        };
        UpdatePayload {
            status: self.status.clone(),
            assigned_to: if self.unassign {
                Some(None)
            } else {
                self.assign.map(Some)
            },
            title: self.title.clone(),
            description: self.description.clone().map(Some),
            resolution_notes: self.resolution.clone().map(Some),
            due_at: set_or_clear(&self.due, self.clear_due),
            recurrence_rule: set_or_clear(&self.recur, self.clear_recur),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChangeOutput {
    field: &'static str,
    old: String,
    new: String,
}

#[derive(Debug, Serialize)]
struct UpdateOutput {
    reference: String,
    actor: String,
    changed: bool,
    changes: Vec<ChangeOutput>,
    audit: Option<String>,
    auto_closed: bool,
    reopened: bool,
    notifications_scheduled: usize,
    notifications_delivered: usize,
    item: WorkItemView,
    warnings: Vec<PartialEnrichment>,
}

impl UpdateOutput {
    fn new(actor: &Actor, outcome: UpdateOutcome, delivered: usize) -> Self {
        let audit = (!outcome.changes.is_empty()).then(|| outcome.changes.audit_text());
        Self {
            reference: outcome.item.item.reference.clone(),
            actor: actor.to_string(),
            changed: outcome.changed,
            changes: outcome
                .changes
                .changes
                .iter()
                .map(|c| ChangeOutput {
                    field: c.field.label(),
                    old: c.old.clone(),
                    new: c.new.clone(),
                })
                .collect(),
            audit,
            auto_closed: outcome.changes.auto_closed,
            reopened: outcome.changes.reopened,
            notifications_scheduled: outcome.scheduled,
            notifications_delivered: delivered,
            item: outcome.item.item,
            warnings: outcome.item.warnings,
        }
    }
}

pub fn run_update(args: &UpdateArgs, ctx: &Ctx) -> Result<()> {
    let payload = args.payload();
    if payload == UpdatePayload::default() {
        return Err(ctx.failure(
            "no fields specified: use --status, --assign, --title, --description, \
             --resolution, --due or --recur",
            ErrorCode::InvalidPayload,
        ));
    }

    let workspace = Workspace::locate(ctx)?;
    let runtime = workspace.open_runtime()?;

    let (item, actor) = {
        let conn = runtime.engine().store().checkout()?;
        let item = resolve_ref(ctx, &conn, &args.reference)?;
        let actor = if args.system {
            Actor::System
        } else {
            Actor::User(ctx.requester(&conn)?)
        };
        (item, actor)
    };

    let result = runtime.engine().apply_update(item, &payload, &actor);
    let stats = runtime.shutdown();
    if stats.failed > 0 {
        tracing::warn!(failed = stats.failed, "some notifications were not delivered");
    }
    let outcome = result.map_err(|e| ctx.engine_failure(&e))?;

    let result = UpdateOutput::new(&actor, outcome, stats.delivered);
    render_mode(
        ctx.output,
        &result,
        |r, w| {
            let state = if r.changed { "updated" } else { "unchanged" };
            writeln!(
                w,
                "{}\t{state}\t{}\t{}",
                r.reference,
                r.item.status,
                r.audit.as_deref().unwrap_or("-")
            )
        },
        |r, w| {
            if r.changed {
                pretty_section(w, &format!("Updated {}", r.reference))?;
            } else {
                pretty_section(w, &format!("{} unchanged", r.reference))?;
            }
            for change in &r.changes {
                writeln!(w, "  {}: {} -> {}", change.field, change.old, change.new)?;
            }
            if r.auto_closed {
                writeln!(w, "  (closed automatically on resolution)")?;
            }
            if r.reopened {
                writeln!(w, "  (reopened)")?;
            }
            pretty_rule(w)?;
            pretty_kv(w, "Status", r.item.status.label())?;
            pretty_kv(w, "Revision", r.item.revision.to_string())?;
            pretty_kv(w, "Updated", format_us(r.item.updated_at_us))?;
            pretty_kv(
                w,
                "Notified",
                format!(
                    "{} scheduled, {} delivered",
                    r.notifications_scheduled, r.notifications_delivered
                ),
            )?;
            for warning in &r.warnings {
                writeln!(w, "warning: {}", warning.message)?;
            }
            Ok(())
        },
    )
}
