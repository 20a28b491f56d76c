//! Current-state loader: the pre-update snapshot of one work item.

use rusqlite::{Connection, OptionalExtension, params};

use crate::db::query::parse_column;
use crate::error::{StorageResultExt, UpdateError};
use crate::model::{ItemKind, ItemRef, SeqRef, Status};

/// Id, name and email of a user related to an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// Who receives closure and in-progress notifications for an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitter {
    /// External contact recorded on a ticket.
    Contact {
        name: Option<String>,
        email: Option<String>,
    },
    /// Creating user of a task.
    User(UserRef),
}

impl Submitter {
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        match self {
            Self::Contact { email, .. } => email.as_deref(),
            Self::User(user) => Some(&user.email),
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Contact { name, .. } => name.as_deref(),
            Self::User(user) => Some(&user.name),
        }
    }
}

/// State of an item as read before planning an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub item: ItemRef,
    pub seq: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: Status,
    pub assignee: Option<UserRef>,
    /// User allowed to edit as creator: task `creator_id`, ticket `created_by`.
    pub creator_id: Option<i64>,
    pub submitter: Submitter,
    pub resolution_notes: Option<String>,
    pub due_at_us: Option<i64>,
    pub recurrence_rule: Option<String>,
    pub closed_at_us: Option<i64>,
    pub revision: i64,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

impl Snapshot {
    #[must_use]
    pub fn assignee_id(&self) -> Option<i64> {
        self.assignee.as_ref().map(|user| user.id)
    }

    #[must_use]
    pub const fn seq_ref(&self) -> SeqRef {
        SeqRef {
            kind: self.item.kind,
            seq: self.seq,
        }
    }
}

const TICKET_SNAPSHOT_SQL: &str = "\
SELECT t.id, t.seq, t.title, t.description, t.status, t.resolution_notes,
       t.due_at_us, NULL, t.closed_at_us, t.revision, t.updated_at_us,
       a.id, a.name, a.email,
       t.created_by, t.submitter_name, t.submitter_email, t.created_at_us
FROM tickets t
LEFT JOIN users a ON a.id = t.assignee_id
WHERE t.id = ?1";

const TASK_SNAPSHOT_SQL: &str = "\
SELECT t.id, t.seq, t.title, t.description, t.status, t.resolution_notes,
       t.due_at_us, t.recurrence_rule, t.completed_at_us, t.revision, t.updated_at_us,
       a.id, a.name, a.email,
       t.creator_id, c.name, c.email, t.created_at_us
FROM tasks t
LEFT JOIN users a ON a.id = t.assignee_id
LEFT JOIN users c ON c.id = t.creator_id
WHERE t.id = ?1";

/// Read the snapshot of `item`.
///
/// # Errors
///
/// Returns [`UpdateError::NotFound`] if the row does not exist and
/// [`UpdateError::Storage`] if the query fails.
pub fn load_snapshot(conn: &Connection, item: ItemRef) -> Result<Snapshot, UpdateError> {
    let sql = match item.kind {
        ItemKind::Ticket => TICKET_SNAPSHOT_SQL,
        ItemKind::Task => TASK_SNAPSHOT_SQL,
    };

    conn.query_row(sql, params![item.id], |row| row_to_snapshot(row, item.kind))
        .optional()
        .storage("load snapshot")?
        .ok_or(UpdateError::not_found(item))
}

/// Look up the id/name/email triple of a user.
///
/// # Errors
///
/// Returns [`UpdateError::Storage`] if the query fails.
pub fn load_user_ref(conn: &Connection, id: i64) -> Result<Option<UserRef>, UpdateError> {
    conn.query_row(
        "SELECT id, name, email FROM users WHERE id = ?1",
        params![id],
        |row| {
            Ok(UserRef {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
            })
        },
    )
    .optional()
    .storage("load user")
}

fn row_to_snapshot(row: &rusqlite::Row<'_>, kind: ItemKind) -> rusqlite::Result<Snapshot> {
    let assignee = match row.get::<_, Option<i64>>(11)? {
        Some(id) => Some(UserRef {
            id,
            name: row.get(12)?,
            email: row.get(13)?,
        }),
        None => None,
    };

    let creator_id: Option<i64> = row.get(14)?;
    let submitter = match kind {
        ItemKind::Ticket => Submitter::Contact {
            name: row.get(15)?,
            email: row.get(16)?,
        },
        ItemKind::Task => {
            let name: Option<String> = row.get(15)?;
            let email: Option<String> = row.get(16)?;
            match (creator_id, name, email) {
                (Some(id), Some(name), Some(email)) => Submitter::User(UserRef { id, name, email }),
                _ => Submitter::Contact {
                    name: None,
                    email: None,
                },
            }
        }
    };

    Ok(Snapshot {
        item: ItemRef::new(kind, row.get(0)?),
        seq: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: parse_column(row, 4)?,
        resolution_notes: row.get(5)?,
        due_at_us: row.get(6)?,
        recurrence_rule: row.get(7)?,
        closed_at_us: row.get(8)?,
        revision: row.get(9)?,
        created_at_us: row.get(17)?,
        updated_at_us: row.get(10)?,
        assignee,
        creator_id,
        submitter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::intake::{self, NewTask, NewTicket, NewUser};
    use crate::db::migrations;
    use crate::model::Role;

    fn migrated() -> Connection {
        let mut conn = Connection::open_in_memory().expect("open");
        migrations::migrate(&mut conn).expect("migrate");
        conn
    }

    #[test]
    fn ticket_snapshot_carries_contact_and_assignee() {
        let mut conn = migrated();
        let grace = intake::create_user(
            &conn,
            &NewUser {
                name: "Grace Hopper".into(),
                email: "grace@example.com".into(),
                role: Role::Staff,
            },
            1,
        )
        .expect("user");
        let created = intake::create_ticket(
            &mut conn,
            &NewTicket {
                title: "Badge reader offline".into(),
                description: Some("Lobby door".into()),
                submitter_name: Some("Linus".into()),
                submitter_email: Some("linus@example.com".into()),
                created_by: Some(grace.id),
            },
            2,
        )
        .expect("ticket");
        conn.execute(
            "UPDATE tickets SET assignee_id = ?1, status = 'assigned' WHERE id = ?2",
            params![grace.id, created.item.id],
        )
        .expect("assign");

        let snapshot = load_snapshot(&conn, created.item).expect("snapshot");
        assert_eq!(snapshot.seq_ref().to_string(), "TKT-1");
        assert_eq!(snapshot.status, Status::Assigned);
        assert_eq!(snapshot.assignee_id(), Some(grace.id));
        assert_eq!(snapshot.creator_id, Some(grace.id));
        assert_eq!(snapshot.submitter.email(), Some("linus@example.com"));
        assert_eq!(snapshot.recurrence_rule, None);
        assert_eq!(snapshot.closed_at_us, None);
        assert_eq!(snapshot.revision, 0);
    }

    #[test]
    fn task_snapshot_uses_creator_as_submitter() {
        let mut conn = migrated();
        let ada = intake::create_user(
            &conn,
            &NewUser {
                name: "Ada Lovelace".into(),
                email: "ada@example.com".into(),
                role: Role::Admin,
            },
            1,
        )
        .expect("user");
        let created = intake::create_task(
            &mut conn,
            &NewTask {
                title: "Patch mail relay".into(),
                description: None,
                creator_id: ada.id,
                due_at_us: Some(500),
                recurrence_rule: Some("FREQ=WEEKLY".into()),
            },
            2,
        )
        .expect("task");

        let snapshot = load_snapshot(&conn, created.item).expect("snapshot");
        assert_eq!(snapshot.creator_id, Some(ada.id));
        assert_eq!(snapshot.submitter.email(), Some("ada@example.com"));
        assert_eq!(snapshot.submitter.name(), Some("Ada Lovelace"));
        assert_eq!(snapshot.recurrence_rule.as_deref(), Some("FREQ=WEEKLY"));
        assert_eq!(snapshot.due_at_us, Some(500));
        assert!(snapshot.assignee.is_none());
    }

    #[test]
    fn missing_item_is_not_found() {
        let conn = migrated();
        let err = load_snapshot(&conn, ItemRef::task(404)).expect_err("must fail");
        assert!(matches!(
            err,
            UpdateError::NotFound {
                kind: ItemKind::Task,
                id: 404
            }
        ));
    }

    #[test]
    fn broken_store_is_a_storage_error() {
        let conn = migrated();
        conn.execute_batch("DROP TABLE tickets").expect("drop");
        let err = load_snapshot(&conn, ItemRef::ticket(1)).expect_err("must fail");
        assert!(matches!(err, UpdateError::Storage(_)));
    }
}
