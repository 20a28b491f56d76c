//! Seed writes that happen outside the update engine: users, new work
//! items in their initial state, and tags.
//!
//! Items are always created `open`, unassigned, with every derived field
//! null. All later mutation goes through [`crate::engine::UpdateEngine`].

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, TransactionBehavior, params};

use super::query::tag_owner_column;
use crate::model::{ItemKind, ItemRef, Role, SeqRef, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// A ticket as received from an external submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub title: String,
    pub description: Option<String>,
    pub submitter_name: Option<String>,
    pub submitter_email: Option<String>,
    /// Staff user who logged the ticket, when it was entered on the
    /// submitter's behalf.
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub creator_id: i64,
    pub due_at_us: Option<i64>,
    pub recurrence_rule: Option<String>,
}

/// Identity of a freshly created item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Created {
    pub item: ItemRef,
    pub seq: SeqRef,
}

/// Insert a user.
///
/// # Errors
///
/// Returns an error if the name or email is blank, or the email is taken.
pub fn create_user(conn: &Connection, user: &NewUser, now_us: i64) -> Result<User> {
    let name = user.name.trim();
    let email = user.email.trim();
    if name.is_empty() || email.is_empty() {
        bail!("user name and email must not be empty");
    }

    conn.execute(
        "INSERT INTO users (name, email, role, created_at_us) VALUES (?1, ?2, ?3, ?4)",
        params![name, email, user.role.as_str(), now_us],
    )
    .with_context(|| format!("insert user {email}"))?;

    Ok(User {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        email: email.to_string(),
        role: user.role,
    })
}

/// Insert a ticket with the next sequence number.
///
/// # Errors
///
/// Returns an error if the title is blank or the insert fails.
pub fn create_ticket(conn: &mut Connection, ticket: &NewTicket, now_us: i64) -> Result<Created> {
    let title = non_blank_title(&ticket.title)?;
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .context("begin create_ticket")?;

    let seq = next_seq(&tx, ItemKind::Ticket)?;
    tx.execute(
        "INSERT INTO tickets (
            seq, title, description, status, created_by,
            submitter_name, submitter_email, created_at_us, updated_at_us
         ) VALUES (?1, ?2, ?3, 'open', ?4, ?5, ?6, ?7, ?7)",
        params![
            seq,
            title,
            blank_to_none(ticket.description.as_deref()),
            ticket.created_by,
            blank_to_none(ticket.submitter_name.as_deref()),
            blank_to_none(ticket.submitter_email.as_deref()),
            now_us,
        ],
    )
    .context("insert ticket")?;
    let id = tx.last_insert_rowid();
    tx.commit().context("commit create_ticket")?;

    tracing::debug!(id, seq, "created ticket");
    Ok(Created {
        item: ItemRef::ticket(id),
        seq: SeqRef {
            kind: ItemKind::Ticket,
            seq,
        },
    })
}

/// Insert a task with the next sequence number.
///
/// # Errors
///
/// Returns an error if the title is blank, the creator does not exist, or
/// the insert fails.
pub fn create_task(conn: &mut Connection, task: &NewTask, now_us: i64) -> Result<Created> {
    let title = non_blank_title(&task.title)?;
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .context("begin create_task")?;

    let seq = next_seq(&tx, ItemKind::Task)?;
    tx.execute(
        "INSERT INTO tasks (
            seq, title, description, status, creator_id,
            due_at_us, recurrence_rule, created_at_us, updated_at_us
         ) VALUES (?1, ?2, ?3, 'open', ?4, ?5, ?6, ?7, ?7)",
        params![
            seq,
            title,
            blank_to_none(task.description.as_deref()),
            task.creator_id,
            task.due_at_us,
            blank_to_none(task.recurrence_rule.as_deref()),
            now_us,
        ],
    )
    .context("insert task")?;
    let id = tx.last_insert_rowid();
    tx.commit().context("commit create_task")?;

    tracing::debug!(id, seq, "created task");
    Ok(Created {
        item: ItemRef::task(id),
        seq: SeqRef {
            kind: ItemKind::Task,
            seq,
        },
    })
}

/// Attach a tag to an item. Re-adding an existing tag is a no-op.
///
/// # Errors
///
/// Returns an error if the tag is blank or the item does not exist.
pub fn add_tag(conn: &Connection, item: ItemRef, tag: &str, now_us: i64) -> Result<()> {
    let tag = tag.trim();
    if tag.is_empty() {
        bail!("tag must not be empty");
    }
    let sql = format!(
        "INSERT OR IGNORE INTO {} ({}, tag, created_at_us) VALUES (?1, ?2, ?3)",
        item.kind.tag_table(),
        tag_owner_column(item.kind)
    );
    conn.execute(&sql, params![item.id, tag, now_us])
        .with_context(|| format!("add tag '{tag}' to {item}"))?;
    Ok(())
}

fn next_seq(conn: &Connection, kind: ItemKind) -> Result<i64> {
    let sql = format!("SELECT COALESCE(MAX(seq), 0) + 1 FROM {}", kind.table());
    conn.query_row(&sql, [], |row| row.get(0))
        .with_context(|| format!("allocate {kind} sequence number"))
}

fn non_blank_title(title: &str) -> Result<&str> {
    let title = title.trim();
    if title.is_empty() {
        bail!("title must not be empty");
    }
    Ok(title)
}

fn blank_to_none(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations;

    fn migrated() -> Connection {
        let mut conn = Connection::open_in_memory().expect("open");
        conn.pragma_update(None, "foreign_keys", "ON").expect("fk");
        migrations::migrate(&mut conn).expect("migrate");
        conn
    }

    fn ticket(title: &str) -> NewTicket {
        NewTicket {
            title: title.into(),
            description: Some("   ".into()),
            submitter_name: Some("Linus".into()),
            submitter_email: Some("linus@example.com".into()),
            created_by: None,
        }
    }

    #[test]
    fn tickets_get_increasing_sequence_numbers() {
        let mut conn = migrated();
        let first = create_ticket(&mut conn, &ticket("Printer jam"), 1).expect("first");
        let second = create_ticket(&mut conn, &ticket("VPN down"), 2).expect("second");
        assert_eq!(first.seq.seq, 1);
        assert_eq!(second.seq.seq, 2);
        assert_eq!(second.seq.to_string(), "TKT-2");
    }

    #[test]
    fn new_ticket_starts_open_and_unassigned() {
        let mut conn = migrated();
        let created = create_ticket(&mut conn, &ticket("Printer jam"), 42).expect("ticket");
        let (status, assignee, closed, description, revision): (
            String,
            Option<i64>,
            Option<i64>,
            Option<String>,
            i64,
        ) = conn
            .query_row(
                "SELECT status, assignee_id, closed_at_us, description, revision
                 FROM tickets WHERE id = ?1",
                params![created.item.id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .expect("row");
        assert_eq!(status, "open");
        assert_eq!(assignee, None);
        assert_eq!(closed, None);
        assert_eq!(description, None, "blank description is stored as NULL");
        assert_eq!(revision, 0);
    }

    #[test]
    fn blank_title_is_rejected() {
        let mut conn = migrated();
        assert!(create_ticket(&mut conn, &ticket("  "), 1).is_err());
    }

    #[test]
    fn task_requires_existing_creator() {
        let mut conn = migrated();
        let result = create_task(
            &mut conn,
            &NewTask {
                title: "Rotate keys".into(),
                description: None,
                creator_id: 77,
                due_at_us: None,
                recurrence_rule: None,
            },
            1,
        );
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let conn = migrated();
        let user = NewUser {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            role: Role::Admin,
        };
        create_user(&conn, &user, 1).expect("first");
        assert!(create_user(&conn, &user, 2).is_err());
    }

    #[test]
    fn add_tag_is_idempotent() {
        let mut conn = migrated();
        let created = create_ticket(&mut conn, &ticket("Printer jam"), 1).expect("ticket");
        add_tag(&conn, created.item, "hardware", 2).expect("tag");
        add_tag(&conn, created.item, "hardware", 3).expect("tag again");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM ticket_tags", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }
}
