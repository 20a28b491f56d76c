//! `SQLite` read helpers for the deskwork store.
//!
//! All functions take a shared `&Connection` reference and return
//! `anyhow::Result<T>` with typed structs (never raw rows).

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params, types::Type};
use std::str::FromStr;

use crate::model::{AuditComment, ItemKind, ItemRef, SeqRef, User};

/// Fetch a user by id.
///
/// # Errors
///
/// Returns an error if the query fails or the stored role is not recognized.
pub fn get_user(conn: &Connection, id: i64) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, name, email, role FROM users WHERE id = ?1",
        params![id],
        row_to_user,
    )
    .optional()
    .context("get_user")
}

/// Fetch a user by email (exact match).
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn find_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, name, email, role FROM users WHERE email = ?1",
        params![email],
        row_to_user,
    )
    .optional()
    .context("find_user_by_email")
}

/// Resolve a human-facing `TKT-n` / `TSK-n` reference to a row id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn find_by_seq(conn: &Connection, seq_ref: SeqRef) -> Result<Option<ItemRef>> {
    let sql = format!("SELECT id FROM {} WHERE seq = ?1", seq_ref.kind.table());
    let id: Option<i64> = conn
        .query_row(&sql, params![seq_ref.seq], |row| row.get(0))
        .optional()
        .with_context(|| format!("find_by_seq {seq_ref}"))?;
    Ok(id.map(|id| ItemRef::new(seq_ref.kind, id)))
}

/// Comment stream of an item, oldest first. Ties on the timestamp are
/// broken by insertion order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn comments_for(conn: &Connection, item: ItemRef) -> Result<Vec<AuditComment>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, author_id, body, is_system, created_at_us \
             FROM comments WHERE item_kind = ?1 AND item_id = ?2 \
             ORDER BY created_at_us ASC, id ASC",
        )
        .context("prepare comments_for")?;

    let rows = stmt
        .query_map(params![item.kind.as_str(), item.id], |row| {
            Ok(AuditComment {
                id: row.get(0)?,
                item,
                author_id: row.get(1)?,
                body: row.get(2)?,
                is_system: row.get::<_, i64>(3)? != 0,
                created_at_us: row.get(4)?,
            })
        })
        .context("execute comments_for")?;

    let mut comments = Vec::new();
    for row in rows {
        comments.push(row.context("read comment row")?);
    }
    Ok(comments)
}

/// Tags of an item, sorted alphabetically.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn tags_for(conn: &Connection, item: ItemRef) -> Result<Vec<String>> {
    let sql = format!(
        "SELECT tag FROM {} WHERE {} = ?1 ORDER BY tag ASC",
        item.kind.tag_table(),
        tag_owner_column(item.kind)
    );
    let mut stmt = conn.prepare(&sql).context("prepare tags_for")?;
    let rows = stmt
        .query_map(params![item.id], |row| row.get::<_, String>(0))
        .context("execute tags_for")?;

    let mut tags = Vec::new();
    for row in rows {
        tags.push(row.context("read tag row")?);
    }
    Ok(tags)
}

pub(crate) const fn tag_owner_column(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Ticket => "ticket_id",
        ItemKind::Task => "task_id",
    }
}

pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: parse_column(row, 3)?,
    })
}

/// Read a text column and parse it through `FromStr`, reporting a
/// conversion failure on unknown values.
pub(crate) fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}
