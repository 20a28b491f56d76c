use serde::{Deserialize, Serialize};

use super::item::ItemRef;

/// An append-only note on a work item.
///
/// `author_id` is `None` for system-originated entries, in which case
/// `is_system` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditComment {
    pub id: i64,
    pub item: ItemRef,
    pub author_id: Option<i64>,
    pub body: String,
    pub is_system: bool,
    pub created_at_us: i64,
}
