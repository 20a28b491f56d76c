use proptest::prelude::*;

use deskwork_core::engine::{Actor, UpdateRequest};
use deskwork_core::model::{ItemKind, ItemRef, Status};

#[path = "support.rs"]
mod support;
use support::*;

fn arb_status(kind: ItemKind) -> impl Strategy<Value = Status> {
    prop::sample::select(kind.statuses().to_vec())
}

fn arb_notes() -> impl Strategy<Value = Option<Option<String>>> {
    prop_oneof![
        3 => Just(None),
        1 => Just(Some(None)),
        2 => prop::sample::select(vec!["Fixed cable", "Replaced toner", "Rebooted switch"])
            .prop_map(|s| Some(Some(s.to_string()))),
    ]
}

/// Requests over status, assignee and resolution notes. Assignee ids 1..=3
/// are the seeded users.
fn arb_request(kind: ItemKind) -> impl Strategy<Value = UpdateRequest> {
    (
        prop::option::of(arb_status(kind)),
        prop::option::of(prop::option::of(1_i64..=3)),
        arb_notes(),
        prop::option::of(prop::sample::select(vec!["Printer jam", "Jammed printer"])),
    )
        .prop_map(|(status, assigned_to, resolution_notes, title)| UpdateRequest {
            status,
            assigned_to,
            resolution_notes,
            title: title.map(str::to_string),
            ..UpdateRequest::default()
        })
}

fn arb_kind() -> impl Strategy<Value = ItemKind> {
    prop::sample::select(ItemKind::ALL.to_vec())
}

fn arb_history() -> impl Strategy<Value = (ItemKind, Vec<UpdateRequest>)> {
    arb_kind().prop_flat_map(|kind| (Just(kind), prop::collection::vec(arb_request(kind), 1..8)))
}

fn create(desk: &Desk, kind: ItemKind) -> ItemRef {
    match kind {
        ItemKind::Ticket => desk.ticket("Printer jam"),
        ItemKind::Task => desk.task("Printer jam", &desk.staff),
    }
}

fn is_terminal(status: &str) -> bool {
    status == "closed" || status == "completed"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn closing_timestamp_tracks_terminal_status((kind, history) in arb_history()) {
        let desk = Desk::new();
        let item = create(&desk, kind);

        for request in &history {
            desk.clock.advance(1_000);
            let comments_before = desk.comments(item).len();
            let outcome = desk.engine.apply_request(item, request, &Actor::System)
                .expect("system update");

            let row = desk.row(item);
            prop_assert_eq!(is_terminal(&row.status), row.closed_at_us.is_some());
            prop_assert_eq!(
                outcome.item.item.status.is_terminal(),
                outcome.item.item.closed_at_us.is_some()
            );

            let expected_comments = comments_before + usize::from(outcome.changed);
            prop_assert_eq!(desk.comments(item).len(), expected_comments);
        }
    }

    #[test]
    fn replaying_a_request_is_a_noop((kind, history) in arb_history()) {
        let desk = Desk::new();
        let item = create(&desk, kind);
        let last = history.last().cloned().unwrap_or_default();
        // Notes forcing closure over an explicit open status reopen on replay.
        prop_assume!(!(
            matches!(last.resolution_notes, Some(Some(_)))
                && last.status.is_some_and(|status| !status.is_terminal())
        ));

        for request in &history {
            desk.engine.apply_request(item, request, &Actor::System).expect("update");
        }
        let row = desk.row(item);
        let comments = desk.comments(item).len();
        desk.queue.take();

        desk.clock.advance(1_000);
        let again = desk.engine.apply_request(item, &last, &Actor::System).expect("replay");

        prop_assert!(!again.changed);
        prop_assert_eq!(desk.row(item), row);
        prop_assert_eq!(desk.comments(item).len(), comments);
        prop_assert!(desk.queue.take().is_empty());
    }

    #[test]
    fn new_resolution_notes_always_end_terminal(
        kind in arb_kind(),
        start in 0_usize..3,
        explicit in prop::option::of(0_usize..3),
    ) {
        let desk = Desk::new();
        let item = create(&desk, kind);
        let statuses = kind.statuses();
        let start = statuses[start % statuses.len()];
        if start.is_terminal() {
            desk.force(item, &format!("status = '{}', {} = 1", start.as_str(), kind.closing_column()));
        } else {
            desk.force(item, &format!("status = '{}'", start.as_str()));
        }

        let explicit = explicit
            .map(|idx| statuses[idx % statuses.len()])
            .filter(|status| !status.is_terminal());
        let request = UpdateRequest {
            status: explicit,
            resolution_notes: Some(Some("Fixed cable".to_string())),
            ..UpdateRequest::default()
        };
        let outcome = desk.engine.apply_request(item, &request, &Actor::System).expect("update");

        prop_assert_eq!(outcome.item.item.status, kind.terminal_status());
        prop_assert!(outcome.item.item.closed_at_us.is_some());
        prop_assert_eq!(outcome.changes.auto_closed, !start.is_terminal());
    }

    #[test]
    fn reopening_clears_closing_timestamp(kind in arb_kind(), target in 0_usize..3) {
        let desk = Desk::new();
        let item = create(&desk, kind);
        desk.force(
            item,
            &format!("status = '{}', {} = 99", kind.terminal_status().as_str(), kind.closing_column()),
        );

        let open: Vec<Status> = kind.statuses().iter().copied().filter(|s| !s.is_terminal()).collect();
        let target = open[target % open.len()];
        let request = UpdateRequest { status: Some(target), ..UpdateRequest::default() };
        let outcome = desk.engine.apply_request(item, &request, &Actor::System).expect("reopen");

        prop_assert!(outcome.changes.reopened);
        let row = desk.row(item);
        prop_assert_eq!(row.status.as_str(), target.as_str());
        prop_assert_eq!(row.closed_at_us, None);
    }
}
