//! Update planner: diff a typed request against a snapshot.
//!
//! The planner is pure. It decides which columns change, derives the
//! dependent fields (closing timestamp, forced closure on resolution,
//! `updated_at`), and describes the change for the audit trail. It never
//! emits SQL; the committer turns the [`MutationPlan`] into a statement.
//!
//! Field comparison is by value. A request that resends current values
//! plans to [`Plan::NoOp`].

use std::fmt::Write as _;

use super::loader::{Snapshot, UserRef};
use super::payload::UpdateRequest;
use crate::clock::format_us;
use crate::error::UpdateError;
use crate::model::{ItemKind, ItemRef};

const DISPLAY_LIMIT: usize = 60;
const NONE_DISPLAY: &str = "(none)";
const UNASSIGNED_DISPLAY: &str = "Unassigned";

/// Mutable column of a work item table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Status,
    AssigneeId,
    Title,
    Description,
    ResolutionNotes,
    DueAt,
    RecurrenceRule,
    ClosedAt,
    UpdatedAt,
}

impl Column {
    /// Column name in the table backing `kind`.
    #[must_use]
    pub const fn sql_name(self, kind: ItemKind) -> &'static str {
        match self {
            Self::Status => "status",
            Self::AssigneeId => "assignee_id",
            Self::Title => "title",
            Self::Description => "description",
            Self::ResolutionNotes => "resolution_notes",
            Self::DueAt => "due_at_us",
            Self::RecurrenceRule => "recurrence_rule",
            Self::ClosedAt => kind.closing_column(),
            Self::UpdatedAt => "updated_at_us",
        }
    }
}

/// New value for one column. `None` writes NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(Option<String>),
    Integer(Option<i64>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub column: Column,
    pub value: FieldValue,
}

impl Assignment {
    const fn integer(column: Column, value: Option<i64>) -> Self {
        Self {
            column,
            value: FieldValue::Integer(value),
        }
    }

    const fn text(column: Column, value: Option<String>) -> Self {
        Self {
            column,
            value: FieldValue::Text(value),
        }
    }
}

/// Structured column writes for one item, applied as a single statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationPlan {
    pub item: ItemRef,
    /// Revision the plan was computed against.
    pub expected_revision: i64,
    pub assignments: Vec<Assignment>,
}

impl MutationPlan {
    #[must_use]
    pub fn value_of(&self, column: Column) -> Option<&FieldValue> {
        self.assignments
            .iter()
            .find(|a| a.column == column)
            .map(|a| &a.value)
    }
}

/// Caller-visible field named in the change description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Description,
    Assignee,
    ResolutionNotes,
    DueDate,
    Recurrence,
    Status,
}

impl Field {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Description => "Description",
            Self::Assignee => "Assignee",
            Self::ResolutionNotes => "Resolution notes",
            Self::DueDate => "Due date",
            Self::Recurrence => "Recurrence",
            Self::Status => "Status",
        }
    }
}

/// One changed field with display values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: Field,
    pub old: String,
    pub new: String,
}

/// Human-readable description of an update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub changes: Vec<FieldChange>,
    /// Status was forced terminal because resolution notes were recorded.
    pub auto_closed: bool,
    /// Status left the terminal state and the closing timestamp was cleared.
    pub reopened: bool,
    /// Terminal status label, used to word the auto-close note.
    terminal_label: &'static str,
}

impl ChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    #[must_use]
    pub fn touches(&self, field: Field) -> bool {
        self.changes.iter().any(|c| c.field == field)
    }

    /// Audit comment body, one clause per changed field.
    ///
    /// e.g. `Assignee changed from Unassigned to Grace Hopper`.
    #[must_use]
    pub fn audit_text(&self) -> String {
        let mut text = String::new();
        for (idx, change) in self.changes.iter().enumerate() {
            if idx > 0 {
                text.push_str("; ");
            }
            let _ = write!(
                text,
                "{} changed from {} to {}",
                change.field.label(),
                change.old,
                change.new
            );
            if change.field == Field::Status {
                if self.auto_closed {
                    let _ = write!(
                        text,
                        " ({} automatically on resolution)",
                        self.terminal_label.to_ascii_lowercase()
                    );
                } else if self.reopened {
                    text.push_str(" (reopened)");
                }
            }
        }
        text
    }
}

/// A planned update: column writes, its description, and the state the
/// item will be in once committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpdate {
    pub mutation: MutationPlan,
    pub changes: ChangeSet,
    pub after: Snapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Nothing differs from the current state.
    NoOp,
    Apply(Box<PlannedUpdate>),
}

/// Diff `request` against `before`.
///
/// `new_assignee` is the user named by `request.assigned_to`, resolved by the
/// caller; `None` when the id did not resolve or no assignee was requested.
///
/// # Errors
///
/// Returns [`UpdateError::Validation`] when the request names a status the
/// kind does not have, sets a recurrence rule on a ticket, blanks the title,
/// or assigns a user that does not exist.
pub fn plan(
    before: &Snapshot,
    request: &UpdateRequest,
    new_assignee: Option<&UserRef>,
    now_us: i64,
) -> Result<Plan, UpdateError> {
    validate(before, request, new_assignee)?;

    let kind = before.item.kind;
    let mut after = before.clone();
    let mut diff = Diff::default();

    if let Some(title) = &request.title
        && *title != before.title
    {
        diff.record(
            Field::Title,
            display_text(Some(&before.title)),
            display_text(Some(title)),
            Assignment::text(Column::Title, Some(title.clone())),
        );
        after.title.clone_from(title);
    }

    diff.text(
        Field::Description,
        Column::Description,
        &mut after.description,
        request.description.as_ref(),
    );

    if let Some(requested) = request.assigned_to
        && requested != before.assignee_id()
    {
        let next = requested.and(new_assignee.cloned());
        diff.record(
            Field::Assignee,
            display_assignee(before.assignee.as_ref()),
            display_assignee(next.as_ref()),
            Assignment::integer(Column::AssigneeId, requested),
        );
        after.assignee = next;
    }

    let notes_resolved = diff.text(
        Field::ResolutionNotes,
        Column::ResolutionNotes,
        &mut after.resolution_notes,
        request.resolution_notes.as_ref(),
    ) && after.resolution_notes.is_some();

    if let Some(requested) = request.due_at_us
        && requested != before.due_at_us
    {
        diff.record(
            Field::DueDate,
            display_instant(before.due_at_us),
            display_instant(requested),
            Assignment::integer(Column::DueAt, requested),
        );
        after.due_at_us = requested;
    }

    diff.text(
        Field::Recurrence,
        Column::RecurrenceRule,
        &mut after.recurrence_rule,
        request.recurrence_rule.as_ref(),
    );

    let mut target = request.status.unwrap_or(before.status);
    let mut auto_closed = false;
    if notes_resolved && !target.is_terminal() {
        target = kind.terminal_status();
        auto_closed = !before.status.is_terminal();
    }

    let reopened = before.status.is_terminal() && !target.is_terminal();
    if target != before.status {
        diff.record(
            Field::Status,
            before.status.label().to_string(),
            target.label().to_string(),
            Assignment::text(Column::Status, Some(target.as_str().to_string())),
        );
        // Written with every status change, whatever the row holds at commit.
        let closed_at = target.is_terminal().then_some(now_us);
        diff.assignments
            .push(Assignment::integer(Column::ClosedAt, closed_at));
        after.closed_at_us = closed_at;
        after.status = target;
    }

    if diff.changes.is_empty() {
        return Ok(Plan::NoOp);
    }

    diff.assignments
        .push(Assignment::integer(Column::UpdatedAt, Some(now_us)));
    after.updated_at_us = now_us;
    after.revision = before.revision + 1;

    Ok(Plan::Apply(Box::new(PlannedUpdate {
        mutation: MutationPlan {
            item: before.item,
            expected_revision: before.revision,
            assignments: diff.assignments,
        },
        changes: ChangeSet {
            changes: diff.changes,
            auto_closed,
            reopened,
            terminal_label: kind.terminal_status().label(),
        },
        after,
    })))
}

fn validate(
    before: &Snapshot,
    request: &UpdateRequest,
    new_assignee: Option<&UserRef>,
) -> Result<(), UpdateError> {
    let kind = before.item.kind;

    if let Some(status) = request.status
        && !kind.allows(status)
    {
        return Err(UpdateError::invalid(format!(
            "status '{status}' is not valid for a {kind}"
        )));
    }

    if let Some(Some(_)) = request.recurrence_rule
        && !kind.supports_recurrence()
    {
        return Err(UpdateError::invalid("recurrence rules apply to tasks only"));
    }

    if let Some(title) = &request.title
        && title.trim().is_empty()
    {
        return Err(UpdateError::invalid("title must not be empty"));
    }

    if let Some(Some(id)) = request.assigned_to
        && new_assignee.map(|user| user.id) != Some(id)
    {
        return Err(UpdateError::invalid(format!("user {id} does not exist")));
    }

    Ok(())
}

#[derive(Default)]
struct Diff {
    changes: Vec<FieldChange>,
    assignments: Vec<Assignment>,
}

impl Diff {
    fn record(&mut self, field: Field, old: String, new: String, assignment: Assignment) {
        self.changes.push(FieldChange { field, old, new });
        self.assignments.push(assignment);
    }

    /// Diff a nullable text field. Returns true when it changed.
    fn text(
        &mut self,
        field: Field,
        column: Column,
        slot: &mut Option<String>,
        requested: Option<&Option<String>>,
    ) -> bool {
        let Some(next) = requested else {
            return false;
        };
        if *next == *slot {
            return false;
        }
        self.record(
            field,
            display_text(slot.as_deref()),
            display_text(next.as_deref()),
            Assignment::text(column, next.clone()),
        );
        slot.clone_from(next);
        true
    }
}

fn display_text(value: Option<&str>) -> String {
    let Some(value) = value else {
        return NONE_DISPLAY.to_string();
    };
    let single_line = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= DISPLAY_LIMIT {
        return single_line;
    }
    let mut cut: String = single_line.chars().take(DISPLAY_LIMIT - 1).collect();
    cut.push('…');
    cut
}

fn display_assignee(user: Option<&UserRef>) -> String {
    user.map_or_else(|| UNASSIGNED_DISPLAY.to_string(), |u| u.name.clone())
}

fn display_instant(value: Option<i64>) -> String {
    value.map_or_else(|| NONE_DISPLAY.to_string(), format_us)
}
