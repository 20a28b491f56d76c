//! Result assembler: reload an item with its relations for the caller.
//!
//! The core row must load. Relations (assignee, submitter, tags) are
//! best-effort: a failed lookup becomes a [`PartialEnrichment`] warning and
//! the relation is left empty.

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::db::query::{self, parse_column};
use crate::error::{StorageResultExt, UpdateError};
use super::loader::{Snapshot, Submitter};
use crate::model::{ItemKind, ItemRef, SeqRef, Status, User};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitterView {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Linked user: task creator, or the staff member who logged a ticket.
    pub user_id: Option<i64>,
}

/// Full item as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItemView {
    pub kind: ItemKind,
    pub id: i64,
    pub seq: i64,
    pub reference: String,
    pub title: String,
    pub description: Option<String>,
    pub status: Status,
    pub assignee_id: Option<i64>,
    pub assignee: Option<User>,
    pub submitter: Option<SubmitterView>,
    pub resolution_notes: Option<String>,
    pub due_at_us: Option<i64>,
    pub recurrence_rule: Option<String>,
    pub closed_at_us: Option<i64>,
    pub revision: i64,
    pub tags: Vec<String>,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// The core row itself could not be re-read after a commit.
    Item,
    Assignee,
    Submitter,
    Tags,
}

/// A relation that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartialEnrichment {
    pub relation: Relation,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assembled {
    pub item: WorkItemView,
    pub warnings: Vec<PartialEnrichment>,
}

impl Assembled {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }
}

struct CoreRow {
    view: WorkItemView,
    linked_user: Option<i64>,
    contact_name: Option<String>,
    contact_email: Option<String>,
}

const TICKET_CORE_SQL: &str = "\
SELECT id, seq, title, description, status, assignee_id, created_by,
       submitter_name, submitter_email, resolution_notes, due_at_us, NULL,
       closed_at_us, revision, created_at_us, updated_at_us
FROM tickets WHERE id = ?1";

const TASK_CORE_SQL: &str = "\
SELECT id, seq, title, description, status, assignee_id, creator_id,
       NULL, NULL, resolution_notes, due_at_us, recurrence_rule,
       completed_at_us, revision, created_at_us, updated_at_us
FROM tasks WHERE id = ?1";

/// Load `item` and enrich it with its relations.
///
/// # Errors
///
/// Returns [`UpdateError::NotFound`] if the row is gone and
/// [`UpdateError::Storage`] if the core row cannot be read. Relation
/// failures never error.
pub fn assemble(conn: &Connection, item: ItemRef) -> Result<Assembled, UpdateError> {
    let sql = match item.kind {
        ItemKind::Ticket => TICKET_CORE_SQL,
        ItemKind::Task => TASK_CORE_SQL,
    };
    let core = conn
        .query_row(sql, params![item.id], |row| row_to_core(row, item.kind))
        .optional()
        .storage("reload item")?
        .ok_or(UpdateError::not_found(item))?;

    let mut view = core.view;
    let mut warnings = Vec::new();

    if let Some(assignee_id) = view.assignee_id {
        match query::get_user(conn, assignee_id) {
            Ok(Some(user)) => view.assignee = Some(user),
            Ok(None) => warnings.push(PartialEnrichment {
                relation: Relation::Assignee,
                message: format!("user {assignee_id} not found"),
            }),
            Err(err) => warnings.push(PartialEnrichment {
                relation: Relation::Assignee,
                message: format!("{err:#}"),
            }),
        }
    }

    view.submitter = match item.kind {
        ItemKind::Ticket => Some(SubmitterView {
            name: core.contact_name,
            email: core.contact_email,
            user_id: core.linked_user,
        }),
        ItemKind::Task => match core.linked_user.map(|id| (id, query::get_user(conn, id))) {
            None => None,
            Some((_, Ok(Some(user)))) => Some(SubmitterView {
                name: Some(user.name),
                email: Some(user.email),
                user_id: Some(user.id),
            }),
            Some((id, Ok(None))) => {
                warnings.push(PartialEnrichment {
                    relation: Relation::Submitter,
                    message: format!("user {id} not found"),
                });
                None
            }
            Some((_, Err(err))) => {
                warnings.push(PartialEnrichment {
                    relation: Relation::Submitter,
                    message: format!("{err:#}"),
                });
                None
            }
        },
    };

    match query::tags_for(conn, item) {
        Ok(tags) => view.tags = tags,
        Err(err) => warnings.push(PartialEnrichment {
            relation: Relation::Tags,
            message: format!("{err:#}"),
        }),
    }

    for warning in &warnings {
        tracing::warn!(
            item = %item,
            relation = ?warning.relation,
            error = %warning.message,
            "item enrichment degraded"
        );
    }

    Ok(Assembled {
        item: view,
        warnings,
    })
}

/// View of a committed update built from the planned state, for when the
/// row cannot be re-read. Relations are left empty and `reason` becomes the
/// single warning.
#[must_use]
pub fn committed_view(after: &Snapshot, reason: String) -> Assembled {
    let submitter = match (&after.submitter, after.item.kind) {
        (Submitter::User(user), _) => Some(SubmitterView {
            name: Some(user.name.clone()),
            email: Some(user.email.clone()),
            user_id: Some(user.id),
        }),
        (Submitter::Contact { name, email }, ItemKind::Ticket) => Some(SubmitterView {
            name: name.clone(),
            email: email.clone(),
            user_id: after.creator_id,
        }),
        (Submitter::Contact { .. }, ItemKind::Task) => None,
    };
    let warning = PartialEnrichment {
        relation: Relation::Item,
        message: reason,
    };
    tracing::warn!(
        item = %after.item,
        error = %warning.message,
        "reload after commit failed; returning committed values"
    );

    Assembled {
        item: WorkItemView {
            kind: after.item.kind,
            id: after.item.id,
            seq: after.seq,
            reference: after.seq_ref().to_string(),
            title: after.title.clone(),
            description: after.description.clone(),
            status: after.status,
            assignee_id: after.assignee_id(),
            assignee: None,
            submitter,
            resolution_notes: after.resolution_notes.clone(),
            due_at_us: after.due_at_us,
            recurrence_rule: after.recurrence_rule.clone(),
            closed_at_us: after.closed_at_us,
            revision: after.revision,
            tags: Vec::new(),
            created_at_us: after.created_at_us,
            updated_at_us: after.updated_at_us,
        },
        warnings: vec![warning],
    }
}

fn row_to_core(row: &rusqlite::Row<'_>, kind: ItemKind) -> rusqlite::Result<CoreRow> {
    let seq: i64 = row.get(1)?;
    Ok(CoreRow {
        view: WorkItemView {
            kind,
            id: row.get(0)?,
            seq,
            reference: SeqRef { kind, seq }.to_string(),
            title: row.get(2)?,
            description: row.get(3)?,
            status: parse_column(row, 4)?,
            assignee_id: row.get(5)?,
            assignee: None,
            submitter: None,
            resolution_notes: row.get(9)?,
            due_at_us: row.get(10)?,
            recurrence_rule: row.get(11)?,
            closed_at_us: row.get(12)?,
            revision: row.get(13)?,
            tags: Vec::new(),
            created_at_us: row.get(14)?,
            updated_at_us: row.get(15)?,
        },
        linked_user: row.get(6)?,
        contact_name: row.get(7)?,
        contact_email: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::intake::{self, NewTask, NewTicket, NewUser};
    use crate::db::migrations;
    use crate::model::Role;

    struct Fixture {
        conn: Connection,
        user: User,
        ticket: ItemRef,
        task: ItemRef,
    }

    fn fixture() -> Fixture {
        let mut conn = Connection::open_in_memory().expect("open");
        migrations::migrate(&mut conn).expect("migrate");
        let user = intake::create_user(
            &conn,
            &NewUser {
                name: "Grace Hopper".into(),
                email: "grace@example.com".into(),
                role: Role::Staff,
            },
            1,
        )
        .expect("user");
        let ticket = intake::create_ticket(
            &mut conn,
            &NewTicket {
                title: "Desk phone dead".into(),
                description: None,
                submitter_name: Some("Linus".into()),
                submitter_email: Some("linus@example.com".into()),
                created_by: None,
            },
            2,
        )
        .expect("ticket")
        .item;
        let task = intake::create_task(
            &mut conn,
            &NewTask {
                title: "Audit licences".into(),
                description: None,
                creator_id: user.id,
                due_at_us: None,
                recurrence_rule: None,
            },
            3,
        )
        .expect("task")
        .item;
        conn.execute(
            "UPDATE tickets SET assignee_id = ?1 WHERE id = ?2",
            params![user.id, ticket.id],
        )
        .expect("assign");
        intake::add_tag(&conn, ticket, "telephony", 4).expect("tag");
        Fixture {
            conn,
            user,
            ticket,
            task,
        }
    }

    #[test]
    fn ticket_is_fully_enriched() {
        let fx = fixture();
        let assembled = assemble(&fx.conn, fx.ticket).expect("assemble");
        assert!(assembled.is_complete());
        let view = assembled.item;
        assert_eq!(view.reference, "TKT-1");
        assert_eq!(view.assignee.as_ref(), Some(&fx.user));
        assert_eq!(view.tags, vec!["telephony".to_string()]);
        assert_eq!(
            view.submitter.and_then(|s| s.email).as_deref(),
            Some("linus@example.com")
        );
    }

    #[test]
    fn task_submitter_is_creator() {
        let fx = fixture();
        let view = assemble(&fx.conn, fx.task).expect("assemble").item;
        let submitter = view.submitter.expect("submitter");
        assert_eq!(submitter.user_id, Some(fx.user.id));
        assert_eq!(submitter.name.as_deref(), Some("Grace Hopper"));
        assert_eq!(view.reference, "TSK-1");
    }

    #[test]
    fn broken_tag_table_degrades_to_warning() {
        let fx = fixture();
        fx.conn.execute_batch("DROP TABLE ticket_tags").expect("drop");
        let assembled = assemble(&fx.conn, fx.ticket).expect("assemble");
        assert!(assembled.item.tags.is_empty());
        assert_eq!(assembled.warnings.len(), 1);
        assert_eq!(assembled.warnings[0].relation, Relation::Tags);
        assert!(assembled.item.assignee.is_some());
    }

    #[test]
    fn unreadable_assignee_degrades_to_warning() {
        let fx = fixture();
        fx.conn
            .execute_batch(
                "PRAGMA ignore_check_constraints = ON;
                 UPDATE users SET role = 'superuser';",
            )
            .expect("corrupt role");
        let assembled = assemble(&fx.conn, fx.ticket).expect("assemble");
        assert!(assembled.item.assignee.is_none());
        assert_eq!(assembled.item.assignee_id, Some(fx.user.id));
        assert!(
            assembled
                .warnings
                .iter()
                .any(|w| w.relation == Relation::Assignee)
        );
    }

    #[test]
    fn missing_core_row_is_not_found() {
        let fx = fixture();
        assert!(matches!(
            assemble(&fx.conn, ItemRef::ticket(77)),
            Err(UpdateError::NotFound { .. })
        ));
    }
}
