//! `dw show`: display one work item with its relations and comment stream.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::Write;

use deskwork_core::clock::format_us;
use deskwork_core::db::query;
use deskwork_core::engine::{PartialEnrichment, WorkItemView, assembler};
use deskwork_core::model::AuditComment;

use super::{Ctx, Workspace, resolve_ref};
use crate::output::{pretty_kv, pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Item reference, e.g. TKT-12 or TSK-3.
    pub reference: String,
}

#[derive(Debug, Serialize)]
struct ShowOutput {
    item: WorkItemView,
    warnings: Vec<PartialEnrichment>,
    comments: Vec<AuditComment>,
}

fn author(comment: &AuditComment) -> String {
    comment
        .author_id
        .map_or_else(|| "system".to_string(), |id| format!("user #{id}"))
}

fn or_none(value: Option<&str>) -> &str {
    value.unwrap_or("(none)")
}

pub fn run_show(args: &ShowArgs, ctx: &Ctx) -> Result<()> {
    let workspace = Workspace::locate(ctx)?;
    let store = workspace.open_store()?;
    let conn = store.checkout()?;
    let item = resolve_ref(ctx, &conn, &args.reference)?;

    let assembled = assembler::assemble(&conn, item).map_err(|e| ctx.engine_failure(&e))?;
    let comments = query::comments_for(&conn, item)?;

    let result = ShowOutput {
        item: assembled.item,
        warnings: assembled.warnings,
        comments,
    };
    render_mode(
        ctx.output,
        &result,
        |r, w| {
            let item = &r.item;
            writeln!(
                w,
                "{}\t{}\t{}\t{}",
                item.reference,
                item.status,
                item.assignee.as_ref().map_or("-", |u| u.name.as_str()),
                item.title
            )?;
            for comment in &r.comments {
                writeln!(w, "  {}\t{}\t{}", comment.created_at_us, author(comment), comment.body)?;
            }
            Ok(())
        },
        |r, w| {
            let item = &r.item;
            pretty_section(w, &format!("{}  {}", item.reference, item.title))?;
            pretty_kv(w, "Status", item.status.label())?;
            pretty_kv(
                w,
                "Assignee",
                item.assignee
                    .as_ref()
                    .map_or_else(|| "Unassigned".to_string(), |u| format!("{} <{}>", u.name, u.email)),
            )?;
            if let Some(submitter) = &item.submitter {
                pretty_kv(
                    w,
                    "Submitter",
                    format!(
                        "{} <{}>",
                        or_none(submitter.name.as_deref()),
                        or_none(submitter.email.as_deref())
                    ),
                )?;
            }
            if let Some(due) = item.due_at_us {
                pretty_kv(w, "Due", format_us(due))?;
            }
            if let Some(rule) = &item.recurrence_rule {
                pretty_kv(w, "Recurs", rule)?;
            }
            if let Some(notes) = &item.resolution_notes {
                pretty_kv(w, "Resolution", notes)?;
            }
            if let Some(closed) = item.closed_at_us {
                pretty_kv(w, "Closed", format_us(closed))?;
            }
            if !item.tags.is_empty() {
                pretty_kv(w, "Tags", item.tags.join(", "))?;
            }
            pretty_kv(w, "Revision", item.revision.to_string())?;
            pretty_kv(w, "Updated", format_us(item.updated_at_us))?;
            if let Some(description) = &item.description {
                writeln!(w)?;
                writeln!(w, "{description}")?;
            }
            for warning in &r.warnings {
                writeln!(w, "warning: {}", warning.message)?;
            }

            if !r.comments.is_empty() {
                writeln!(w)?;
                pretty_section(w, "Comments")?;
                for comment in &r.comments {
                    writeln!(
                        w,
                        "[{}] {}: {}",
                        format_us(comment.created_at_us),
                        author(comment),
                        comment.body
                    )?;
                }
                pretty_rule(w)?;
            }
            Ok(())
        },
    )
}
