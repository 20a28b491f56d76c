#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use deskwork_core::clock::FixedClock;
use deskwork_core::db::intake::{self, NewTask, NewTicket, NewUser};
use deskwork_core::db::{Store, query};
use deskwork_core::engine::{EngineOptions, UpdateEngine};
use deskwork_core::model::{AuditComment, ItemRef, Role, User};
use deskwork_core::notify::{Notification, NotificationQueue};
use rusqlite::params;

pub const T0: i64 = 1_700_000_000_000_000;
pub const SUBMITTER_EMAIL: &str = "linus@example.com";

/// Queue that keeps every submitted notification in memory.
#[derive(Default)]
pub struct RecordingQueue {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingQueue {
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.sent.lock().expect("queue lock"))
    }
}

impl NotificationQueue for RecordingQueue {
    fn submit(&self, notification: Notification) {
        self.sent.lock().expect("queue lock").push(notification);
    }
}

/// Row state as stored, bypassing the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub status: String,
    pub closed_at_us: Option<i64>,
    pub assignee_id: Option<i64>,
    pub resolution_notes: Option<String>,
    pub revision: i64,
    pub updated_at_us: i64,
}

/// An in-memory helpdesk with three users and a recording queue.
pub struct Desk {
    pub engine: UpdateEngine,
    pub queue: Arc<RecordingQueue>,
    pub clock: Arc<FixedClock>,
    pub admin: User,
    pub staff: User,
    pub other: User,
}

impl Desk {
    pub fn new() -> Self {
        Self::with_store(
            Store::open_in_memory().expect("open store"),
            EngineOptions::default(),
        )
    }

    pub fn with_store(store: Store, options: EngineOptions) -> Self {
        let (admin, staff, other) = {
            let conn = store.checkout().expect("checkout");
            let mk = |name: &str, email: &str, role| {
                intake::create_user(
                    &conn,
                    &NewUser {
                        name: name.into(),
                        email: email.into(),
                        role,
                    },
                    T0 - 10,
                )
                .expect("create user")
            };
            (
                mk("Ada Lovelace", "ada@example.com", Role::Admin),
                mk("Grace Hopper", "grace@example.com", Role::Staff),
                mk("Alan Turing", "alan@example.com", Role::Staff),
            )
        };

        let queue = Arc::new(RecordingQueue::default());
        let clock = Arc::new(FixedClock::new(T0));
        let engine = UpdateEngine::new(store, queue.clone(), clock.clone()).with_options(options);
        Self {
            engine,
            queue,
            clock,
            admin,
            staff,
            other,
        }
    }

    pub fn ticket(&self, title: &str) -> ItemRef {
        let mut conn = self.engine.store().checkout().expect("checkout");
        intake::create_ticket(
            &mut conn,
            &NewTicket {
                title: title.into(),
                description: None,
                submitter_name: Some("Linus".into()),
                submitter_email: Some(SUBMITTER_EMAIL.into()),
                created_by: None,
            },
            T0 - 5,
        )
        .expect("create ticket")
        .item
    }

    pub fn task(&self, title: &str, creator: &User) -> ItemRef {
        let mut conn = self.engine.store().checkout().expect("checkout");
        intake::create_task(
            &mut conn,
            &NewTask {
                title: title.into(),
                description: None,
                creator_id: creator.id,
                due_at_us: None,
                recurrence_rule: None,
            },
            T0 - 5,
        )
        .expect("create task")
        .item
    }

    /// Put an item into a given state directly, as if earlier updates had
    /// happened.
    pub fn force(&self, item: ItemRef, set_clause: &str) {
        let conn = self.engine.store().checkout().expect("checkout");
        let sql = format!("UPDATE {} SET {set_clause} WHERE id = ?1", item.kind.table());
        conn.execute(&sql, params![item.id]).expect("force state");
    }

    pub fn exec(&self, sql: &str) {
        let conn = self.engine.store().checkout().expect("checkout");
        conn.execute_batch(sql).expect("exec");
    }

    pub fn comments(&self, item: ItemRef) -> Vec<AuditComment> {
        let conn = self.engine.store().checkout().expect("checkout");
        query::comments_for(&conn, item).expect("comments")
    }

    pub fn row(&self, item: ItemRef) -> Row {
        let conn = self.engine.store().checkout().expect("checkout");
        let sql = format!(
            "SELECT status, {}, assignee_id, resolution_notes, revision, updated_at_us
             FROM {} WHERE id = ?1",
            item.kind.closing_column(),
            item.kind.table()
        );
        conn.query_row(&sql, params![item.id], |row| {
            Ok(Row {
                status: row.get(0)?,
                closed_at_us: row.get(1)?,
                assignee_id: row.get(2)?,
                resolution_notes: row.get(3)?,
                revision: row.get(4)?,
                updated_at_us: row.get(5)?,
            })
        })
        .expect("row")
    }
}
