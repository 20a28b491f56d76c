//! Persistence committer: one row update plus one audit comment, atomically.

use rusqlite::types::ToSqlOutput;
use rusqlite::{Connection, OptionalExtension, ToSql, TransactionBehavior, params};
use std::fmt::Write as _;

use super::planner::{FieldValue, MutationPlan};
use crate::error::{StorageResultExt, UpdateError};
use crate::model::ItemRef;

/// Audit comment written alongside a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// `None` for system-originated changes.
    pub author_id: Option<i64>,
    pub body: String,
    pub created_at_us: i64,
}

/// What a successful commit wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReceipt {
    pub comment_id: i64,
    /// Revision of the row after the update.
    pub revision: i64,
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Text(value) => value.to_sql(),
            Self::Integer(value) => value.to_sql(),
        }
    }
}

/// Apply `plan` and insert `audit` in a single `BEGIN IMMEDIATE`
/// transaction.
///
/// With `reject_stale` the update only matches the row while its revision
/// still equals `plan.expected_revision`.
///
/// # Errors
///
/// - [`UpdateError::NotFound`] if the row vanished after it was loaded.
/// - [`UpdateError::Conflict`] if `reject_stale` is set and another writer
///   bumped the revision.
/// - [`UpdateError::Storage`] for any SQLite failure.
///
/// Every error path leaves the store untouched: the transaction is dropped
/// without commit and rolls back.
pub fn commit(
    conn: &mut Connection,
    plan: &MutationPlan,
    audit: &AuditEntry,
    reject_stale: bool,
) -> Result<CommitReceipt, UpdateError> {
    let item = plan.item;
    let sql = update_sql(plan, reject_stale);

    let mut values: Vec<&dyn ToSql> = plan
        .assignments
        .iter()
        .map(|assignment| &assignment.value as &dyn ToSql)
        .collect();
    values.push(&item.id);
    if reject_stale {
        values.push(&plan.expected_revision);
    }

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .storage("begin update transaction")?;

    let updated = tx
        .execute(&sql, values.as_slice())
        .storage("apply item update")?;
    if updated == 0 {
        let exists = item_exists(&tx, item).storage("check item after empty update")?;
        return Err(if exists {
            UpdateError::Conflict {
                item,
                expected: plan.expected_revision,
            }
        } else {
            UpdateError::not_found(item)
        });
    }

    tx.execute(
        "INSERT INTO comments (item_kind, item_id, author_id, body, is_system, created_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            item.kind.as_str(),
            item.id,
            audit.author_id,
            audit.body,
            i64::from(audit.author_id.is_none()),
            audit.created_at_us,
        ],
    )
    .storage("insert audit comment")?;
    let comment_id = tx.last_insert_rowid();

    let revision: i64 = tx
        .query_row(
            &format!("SELECT revision FROM {} WHERE id = ?1", item.kind.table()),
            params![item.id],
            |row| row.get(0),
        )
        .storage("read revision")?;

    tx.commit().storage("commit update transaction")?;

    Ok(CommitReceipt {
        comment_id,
        revision,
    })
}

fn update_sql(plan: &MutationPlan, reject_stale: bool) -> String {
    let kind = plan.item.kind;
    let mut sql = format!("UPDATE {} SET ", kind.table());
    for (idx, assignment) in plan.assignments.iter().enumerate() {
        let _ = write!(sql, "{} = ?{}, ", assignment.column.sql_name(kind), idx + 1);
    }
    sql.push_str("revision = revision + 1");

    let next = plan.assignments.len() + 1;
    let _ = write!(sql, " WHERE id = ?{next}");
    if reject_stale {
        let _ = write!(sql, " AND revision = ?{}", next + 1);
    }
    sql
}

fn item_exists(conn: &Connection, item: ItemRef) -> rusqlite::Result<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?1", item.kind.table());
    conn.query_row(&sql, params![item.id], |_| Ok(()))
        .optional()
        .map(|row| row.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::intake::{self, NewTicket};
    use crate::db::{migrations, query};
    use crate::engine::planner::{Assignment, Column};

    fn migrated_with_ticket() -> (Connection, ItemRef) {
        let mut conn = Connection::open_in_memory().expect("open");
        conn.pragma_update(None, "foreign_keys", "ON").expect("fk");
        migrations::migrate(&mut conn).expect("migrate");
        let created = intake::create_ticket(
            &mut conn,
            &NewTicket {
                title: "Projector bulb".into(),
                description: None,
                submitter_name: None,
                submitter_email: None,
                created_by: None,
            },
            1,
        )
        .expect("ticket");
        (conn, created.item)
    }

    fn close_plan(item: ItemRef, expected_revision: i64) -> MutationPlan {
        MutationPlan {
            item,
            expected_revision,
            assignments: vec![
                Assignment {
                    column: Column::ResolutionNotes,
                    value: FieldValue::Text(Some("Replaced bulb".into())),
                },
                Assignment {
                    column: Column::Status,
                    value: FieldValue::Text(Some("closed".into())),
                },
                Assignment {
                    column: Column::ClosedAt,
                    value: FieldValue::Integer(Some(50)),
                },
                Assignment {
                    column: Column::UpdatedAt,
                    value: FieldValue::Integer(Some(50)),
                },
            ],
        }
    }

    fn audit() -> AuditEntry {
        AuditEntry {
            author_id: None,
            body: "Status changed from Open to Closed".into(),
            created_at_us: 50,
        }
    }

    fn status_of(conn: &Connection, item: ItemRef) -> (String, Option<i64>, i64) {
        conn.query_row(
            "SELECT status, closed_at_us, revision FROM tickets WHERE id = ?1",
            params![item.id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .expect("row")
    }

    #[test]
    fn update_sql_is_parameterized() {
        let plan = close_plan(ItemRef::ticket(1), 0);
        assert_eq!(
            update_sql(&plan, false),
            "UPDATE tickets SET resolution_notes = ?1, status = ?2, closed_at_us = ?3, \
             updated_at_us = ?4, revision = revision + 1 WHERE id = ?5"
        );
        assert!(update_sql(&plan, true).ends_with("WHERE id = ?5 AND revision = ?6"));
    }

    #[test]
    fn commit_writes_row_and_one_system_comment() {
        let (mut conn, item) = migrated_with_ticket();
        let receipt = commit(&mut conn, &close_plan(item, 0), &audit(), false).expect("commit");

        assert_eq!(receipt.revision, 1);
        assert_eq!(status_of(&conn, item), ("closed".into(), Some(50), 1));

        let comments = query::comments_for(&conn, item).expect("comments");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, receipt.comment_id);
        assert!(comments[0].is_system);
        assert_eq!(comments[0].author_id, None);
    }

    #[test]
    fn failed_audit_insert_rolls_back_row_update() {
        let (mut conn, item) = migrated_with_ticket();
        conn.execute_batch(
            "CREATE TRIGGER reject_comments BEFORE INSERT ON comments
             BEGIN SELECT RAISE(ABORT, 'audit store offline'); END;",
        )
        .expect("trigger");

        let err = commit(&mut conn, &close_plan(item, 0), &audit(), false).expect_err("fail");
        assert!(matches!(err, UpdateError::Storage(_)));
        assert_eq!(status_of(&conn, item), ("open".into(), None, 0));
    }

    #[test]
    fn stale_revision_is_a_conflict_when_guarded() {
        let (mut conn, item) = migrated_with_ticket();
        conn.execute(
            "UPDATE tickets SET revision = 4 WHERE id = ?1",
            params![item.id],
        )
        .expect("bump");

        let err = commit(&mut conn, &close_plan(item, 0), &audit(), true).expect_err("stale");
        assert!(matches!(err, UpdateError::Conflict { expected: 0, .. }));
        assert_eq!(status_of(&conn, item), ("open".into(), None, 4));
        assert!(query::comments_for(&conn, item).expect("comments").is_empty());

        let receipt = commit(&mut conn, &close_plan(item, 0), &audit(), false).expect("lww");
        assert_eq!(receipt.revision, 5);
    }

    #[test]
    fn vanished_row_is_not_found() {
        let (mut conn, _) = migrated_with_ticket();
        let err = commit(&mut conn, &close_plan(ItemRef::ticket(99), 0), &audit(), false)
            .expect_err("missing");
        assert!(matches!(err, UpdateError::NotFound { id: 99, .. }));
    }

    #[test]
    fn user_authored_comment_is_not_system() {
        let (mut conn, item) = migrated_with_ticket();
        let author = intake::create_user(
            &conn,
            &intake::NewUser {
                name: "Grace Hopper".into(),
                email: "grace@example.com".into(),
                role: crate::model::Role::Staff,
            },
            1,
        )
        .expect("user");
        let entry = AuditEntry {
            author_id: Some(author.id),
            ..audit()
        };
        commit(&mut conn, &close_plan(item, 0), &entry, false).expect("commit");
        let comments = query::comments_for(&conn, item).expect("comments");
        assert_eq!(comments[0].author_id, Some(author.id));
        assert!(!comments[0].is_system);
    }
}
