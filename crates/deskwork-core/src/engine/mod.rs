//! Update/transition engine.
//!
//! [`UpdateEngine::apply_update`] runs the pipeline for one request:
//!
//! 1. load the current snapshot
//! 2. authorize the actor against it
//! 3. plan the diff (no-op requests stop here and touch nothing)
//! 4. commit the row update and one audit comment atomically
//! 5. hand notifications for the committed transition to the queue
//! 6. reload the item with its relations for the caller; once committed,
//!    a failed reload degrades to the planned state with a warning
//!
//! Steps 1-3 are read-only. Concurrent requests each check out their own
//! connection; writers serialize on SQLite's write lock. Without
//! `reject_stale_writes` the last committed write wins.

pub mod assembler;
pub mod committer;
pub mod guard;
pub mod loader;
pub mod payload;
pub mod planner;

use std::sync::Arc;

use crate::clock::Clock;
use crate::db::Store;
use crate::error::{StorageResultExt, UpdateError};
use crate::model::ItemRef;
use crate::notify::{self, NotificationQueue};

pub use assembler::{Assembled, PartialEnrichment, Relation, WorkItemView};
pub use committer::{AuditEntry, CommitReceipt};
pub use guard::{Access, Actor, Requester};
pub use loader::{Snapshot, Submitter, UserRef};
pub use payload::{UpdatePayload, UpdateRequest, parse_due};
pub use planner::{ChangeSet, Field, FieldChange, Plan};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Fail with [`UpdateError::Conflict`] instead of overwriting a row that
    /// changed between load and commit.
    pub reject_stale_writes: bool,
}

/// Result of a successful [`UpdateEngine::apply_update`].
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub item: Assembled,
    /// False for a no-op request.
    pub changed: bool,
    pub changes: ChangeSet,
    /// Notifications handed to the queue.
    pub scheduled: usize,
}

/// Applies partial updates to work items.
pub struct UpdateEngine {
    store: Store,
    queue: Arc<dyn NotificationQueue>,
    clock: Arc<dyn Clock>,
    options: EngineOptions,
}

impl UpdateEngine {
    #[must_use]
    pub fn new(store: Store, queue: Arc<dyn NotificationQueue>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            queue,
            clock,
            options: EngineOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub const fn options(&self) -> EngineOptions {
        self.options
    }

    /// Parse `payload` and apply it to `item` on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Validation`] for a malformed payload or an invalid
    ///   value for this item.
    /// - [`UpdateError::NotFound`] / [`UpdateError::Forbidden`] before any
    ///   write.
    /// - [`UpdateError::Conflict`] when stale writes are rejected and the
    ///   item changed underneath the request.
    /// - [`UpdateError::Storage`] if the store fails; nothing is written.
    pub fn apply_update(
        &self,
        item: ItemRef,
        payload: &UpdatePayload,
        actor: &Actor,
    ) -> Result<UpdateOutcome, UpdateError> {
        let request = UpdateRequest::from_payload(payload)?;
        self.apply_request(item, &request, actor)
    }

    /// Apply an already-typed request.
    ///
    /// # Errors
    ///
    /// Same as [`Self::apply_update`].
    pub fn apply_request(
        &self,
        item: ItemRef,
        request: &UpdateRequest,
        actor: &Actor,
    ) -> Result<UpdateOutcome, UpdateError> {
        let (before, new_assignee) = {
            let conn = self.store.checkout().storage("check out connection")?;
            let before = loader::load_snapshot(&conn, item)?;
            let access = guard::authorize(&before, actor)?;
            tracing::debug!(item = %item, actor = %actor, access = access.as_str(), "access granted");

            let new_assignee = match request.assigned_to {
                Some(Some(id)) => loader::load_user_ref(&conn, id)?,
                _ => None,
            };
            (before, new_assignee)
        };

        let now_us = self.clock.now_us();
        let planned = match planner::plan(&before, request, new_assignee.as_ref(), now_us)? {
            Plan::NoOp => {
                tracing::debug!(item = %item, "no field differs; nothing written");
                let assembled = self.reload(item)?;
                return Ok(UpdateOutcome {
                    item: assembled,
                    changed: false,
                    changes: ChangeSet::default(),
                    scheduled: 0,
                });
            }
            Plan::Apply(planned) => *planned,
        };

        let audit = AuditEntry {
            author_id: actor.author_id(),
            body: planned.changes.audit_text(),
            created_at_us: now_us,
        };
        let receipt = {
            let mut conn = self.store.checkout().storage("check out connection")?;
            committer::commit(
                &mut conn,
                &planned.mutation,
                &audit,
                self.options.reject_stale_writes,
            )?
        };
        tracing::info!(
            item = %item,
            actor = %actor,
            revision = receipt.revision,
            fields = planned.changes.changes.len(),
            auto_closed = planned.changes.auto_closed,
            reopened = planned.changes.reopened,
            "update committed"
        );

        let notifications = notify::plan_notifications(&before, &planned.after);
        let scheduled = notifications.len();
        for notification in notifications {
            tracing::debug!(
                item = %item,
                recipient = %notification.recipient,
                template = %notification.template,
                "notification scheduled"
            );
            self.queue.submit(notification);
        }

        let assembled = self
            .reload(item)
            .unwrap_or_else(|err| assembler::committed_view(&planned.after, err.to_string()));
        Ok(UpdateOutcome {
            item: assembled,
            changed: true,
            changes: planned.changes,
            scheduled,
        })
    }

    /// Load an item with relations, outside any update.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::NotFound`] or [`UpdateError::Storage`].
    pub fn reload(&self, item: ItemRef) -> Result<Assembled, UpdateError> {
        let conn = self.store.checkout().storage("check out connection")?;
        assembler::assemble(&conn, item)
    }
}
