//! `dw tag`: attach tags to a work item.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::Write;

use deskwork_core::clock::{Clock, SystemClock};
use deskwork_core::db::{intake, query};

use super::{Ctx, Workspace, resolve_ref};
use crate::output::{pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct TagArgs {
    /// Item reference, e.g. TKT-12 or TSK-3.
    pub reference: String,

    /// Tags to add. Existing tags are kept.
    #[arg(required = true)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct TagOutput {
    reference: String,
    tags: Vec<String>,
}

pub fn run_tag(args: &TagArgs, ctx: &Ctx) -> Result<()> {
    let workspace = Workspace::locate(ctx)?;
    let store = workspace.open_store()?;
    let conn = store.checkout()?;
    let item = resolve_ref(ctx, &conn, &args.reference)?;

    let now_us = SystemClock.now_us();
    for tag in &args.tags {
        intake::add_tag(&conn, item, tag, now_us)?;
    }

    let result = TagOutput {
        reference: args.reference.trim().to_ascii_uppercase(),
        tags: query::tags_for(&conn, item)?,
    };
    render_mode(
        ctx.output,
        &result,
        |r, w| writeln!(w, "{}\t{}", r.reference, r.tags.join(",")),
        |r, w| pretty_kv(w, &r.reference, r.tags.join(", ")),
    )
}
