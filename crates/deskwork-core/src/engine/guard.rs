//! Access guard.
//!
//! Admins and the system actor may change anything. Staff may change an
//! item they created or are assigned to, and may claim an item nobody is
//! assigned to.

use std::fmt;

use super::loader::Snapshot;
use crate::error::UpdateError;
use crate::model::Role;

/// An authenticated user making a request. Trusted as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub id: i64,
    pub role: Role,
}

/// Who is applying an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    User(Requester),
    /// Automated changes; audit comments carry no author.
    System,
}

impl Actor {
    #[must_use]
    pub const fn user(id: i64, role: Role) -> Self {
        Self::User(Requester { id, role })
    }

    /// Author recorded on the audit comment.
    #[must_use]
    pub const fn author_id(&self) -> Option<i64> {
        match self {
            Self::User(requester) => Some(requester.id),
            Self::System => None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(requester) => write!(f, "user:{}({})", requester.id, requester.role),
            Self::System => f.write_str("system"),
        }
    }
}

/// The rule that granted access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Admin,
    System,
    Creator,
    Assignee,
    /// Unassigned item picked up by a staff member.
    Claim,
}

impl Access {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::System => "system",
            Self::Creator => "creator",
            Self::Assignee => "assignee",
            Self::Claim => "claim",
        }
    }
}

/// Decide whether `actor` may modify the item in `snapshot`.
///
/// # Errors
///
/// Returns [`UpdateError::Forbidden`] when no rule grants access.
pub fn authorize(snapshot: &Snapshot, actor: &Actor) -> Result<Access, UpdateError> {
    let requester = match actor {
        Actor::System => return Ok(Access::System),
        Actor::User(requester) => requester,
    };

    if requester.role == Role::Admin {
        return Ok(Access::Admin);
    }
    if snapshot.creator_id == Some(requester.id) {
        return Ok(Access::Creator);
    }
    match snapshot.assignee_id() {
        Some(assignee) if assignee == requester.id => Ok(Access::Assignee),
        None => Ok(Access::Claim),
        Some(_) => Err(UpdateError::Forbidden {
            item: snapshot.item,
            requester: requester.id,
        }),
    }
}
