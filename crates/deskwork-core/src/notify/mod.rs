//! Post-commit notifications.
//!
//! [`plan_notifications`] turns a committed before/after transition into
//! zero or more [`Notification`]s. The engine hands them to a
//! [`NotificationQueue`]; delivery happens on a background worker and its
//! outcome never reaches the caller.

pub mod dispatcher;
pub mod transport;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::engine::loader::Snapshot;
use crate::model::Status;

pub use dispatcher::{DisabledQueue, DispatchStats, Dispatcher, NotificationQueue};
pub use transport::{DeliveryError, LogTransport, NotificationTransport, SpoolTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    ItemClosed,
    ItemInProgress,
    ItemAssigned,
}

impl Template {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::ItemClosed => "item_closed",
            Self::ItemInProgress => "item_in_progress",
            Self::ItemAssigned => "item_assigned",
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One message for the transport: address, template key, and parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub template: Template,
    pub params: BTreeMap<String, String>,
}

/// Evaluate the transition predicates independently.
///
/// - became terminal → closure notice to the submitter
/// - became in progress → progress notice to the submitter
/// - assignee changed to a user → assignment notice to that user only
///
/// Predicates whose recipient has no address are skipped.
#[must_use]
pub fn plan_notifications(before: &Snapshot, after: &Snapshot) -> Vec<Notification> {
    let mut out = Vec::new();

    if after.status.is_terminal() && !before.status.is_terminal() {
        push_to_submitter(&mut out, after, Template::ItemClosed);
    }

    if after.status == Status::InProgress && before.status != Status::InProgress {
        push_to_submitter(&mut out, after, Template::ItemInProgress);
    }

    if let Some(assignee) = &after.assignee
        && after.assignee_id() != before.assignee_id()
    {
        let mut params = base_params(after);
        params.insert("assignee_name".into(), assignee.name.clone());
        out.push(Notification {
            recipient: assignee.email.clone(),
            template: Template::ItemAssigned,
            params,
        });
    }

    out
}

fn push_to_submitter(out: &mut Vec<Notification>, after: &Snapshot, template: Template) {
    let Some(email) = after.submitter.email() else {
        tracing::debug!(
            item = %after.item,
            template = %template,
            "no submitter address; notification skipped"
        );
        return;
    };

    let mut params = base_params(after);
    if let Some(name) = after.submitter.name() {
        params.insert("submitter_name".into(), name.to_string());
    }
    if template == Template::ItemClosed
        && let Some(notes) = &after.resolution_notes
    {
        params.insert("resolution_notes".into(), notes.clone());
    }
    out.push(Notification {
        recipient: email.to_string(),
        template,
        params,
    });
}

fn base_params(after: &Snapshot) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("reference".to_string(), after.seq_ref().to_string()),
        ("kind".to_string(), after.item.kind.as_str().to_string()),
        ("title".to_string(), after.title.clone()),
        ("status".to_string(), after.status.label().to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::loader::{Submitter, UserRef};
    use crate::model::ItemRef;

    fn user(id: i64) -> UserRef {
        UserRef {
            id,
            name: format!("User {id}"),
            email: format!("u{id}@example.com"),
        }
    }

    fn snapshot(status: Status, assignee: Option<i64>) -> Snapshot {
        Snapshot {
            item: ItemRef::ticket(3),
            seq: 12,
            title: "Wifi drops in room 2".into(),
            description: None,
            status,
            assignee: assignee.map(user),
            creator_id: None,
            submitter: Submitter::Contact {
                name: Some("Linus".into()),
                email: Some("linus@example.com".into()),
            },
            resolution_notes: None,
            due_at_us: None,
            recurrence_rule: None,
            closed_at_us: status.is_terminal().then_some(1),
            revision: 0,
            created_at_us: 0,
            updated_at_us: 0,
        }
    }

    fn templates(list: &[Notification]) -> Vec<(Template, &str)> {
        list.iter()
            .map(|n| (n.template, n.recipient.as_str()))
            .collect()
    }

    #[test]
    fn closing_notifies_submitter_once() {
        let before = snapshot(Status::Assigned, Some(1));
        let mut after = snapshot(Status::Closed, Some(1));
        after.resolution_notes = Some("Fixed cable".into());

        let out = plan_notifications(&before, &after);
        assert_eq!(
            templates(&out),
            vec![(Template::ItemClosed, "linus@example.com")]
        );
        assert_eq!(out[0].params["reference"], "TKT-12");
        assert_eq!(out[0].params["resolution_notes"], "Fixed cable");
    }

    #[test]
    fn reassignment_notifies_only_new_assignee() {
        let before = snapshot(Status::Assigned, Some(1));
        let after = snapshot(Status::Assigned, Some(2));
        let out = plan_notifications(&before, &after);
        assert_eq!(
            templates(&out),
            vec![(Template::ItemAssigned, "u2@example.com")]
        );
    }

    #[test]
    fn unassigning_notifies_nobody() {
        let before = snapshot(Status::Assigned, Some(1));
        let after = snapshot(Status::Assigned, None);
        assert!(plan_notifications(&before, &after).is_empty());
    }

    #[test]
    fn predicates_are_independent() {
        let before = snapshot(Status::Open, None);
        let after = snapshot(Status::InProgress, Some(4));
        let out = plan_notifications(&before, &after);
        assert_eq!(
            templates(&out),
            vec![
                (Template::ItemInProgress, "linus@example.com"),
                (Template::ItemAssigned, "u4@example.com"),
            ]
        );
    }

    #[test]
    fn staying_terminal_does_not_renotify() {
        let before = snapshot(Status::Closed, None);
        let after = snapshot(Status::Closed, None);
        assert!(plan_notifications(&before, &after).is_empty());
    }

    #[test]
    fn missing_submitter_address_is_skipped() {
        let before = snapshot(Status::Open, None);
        let mut after = snapshot(Status::Closed, None);
        after.submitter = Submitter::Contact {
            name: Some("Walk-in".into()),
            email: None,
        };
        assert!(plan_notifications(&before, &after).is_empty());
    }

    #[test]
    fn template_keys_are_stable() {
        assert_eq!(Template::ItemClosed.key(), "item_closed");
        assert_eq!(
            serde_json::to_string(&Template::ItemInProgress).expect("json"),
            "\"item_in_progress\""
        );
    }
}
