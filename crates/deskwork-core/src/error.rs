use std::fmt;

use crate::model::item::{ItemKind, ItemRef};

/// Machine-readable error codes for callers that branch on failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    ItemNotFound,
    Forbidden,
    InvalidPayload,
    InvalidEnumValue,
    StaleWrite,
    StorageFailure,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::ItemNotFound => "E2001",
            Self::Forbidden => "E2002",
            Self::InvalidPayload => "E2003",
            Self::InvalidEnumValue => "E2004",
            Self::StaleWrite => "E2005",
            Self::StorageFailure => "E5001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Workspace not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::ItemNotFound => "Item not found",
            Self::Forbidden => "Not allowed to modify this item",
            Self::InvalidPayload => "Invalid update payload",
            Self::InvalidEnumValue => "Invalid status/role value",
            Self::StaleWrite => "Item changed since it was read",
            Self::StorageFailure => "Storage operation failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `dw init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .deskwork/deskwork.toml and retry."),
            Self::ItemNotFound => None,
            Self::Forbidden => {
                Some("Only admins, the item's creator, or its assignee may change it.")
            }
            Self::InvalidPayload => None,
            Self::InvalidEnumValue => Some("Use one of the documented status or role values."),
            Self::StaleWrite => Some("Reload the item and retry the update."),
            Self::StorageFailure => Some("Check disk space and database file permissions."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failures surfaced by [`crate::engine::UpdateEngine::apply_update`].
///
/// `NotFound`, `Forbidden` and `Validation` are raised before any write.
/// `Storage` covers begin/exec/commit failures; the transaction is rolled
/// back before it is returned.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("{kind} {id} not found")]
    NotFound { kind: ItemKind, id: i64 },

    #[error("user {requester} may not modify {item}")]
    Forbidden { item: ItemRef, requester: i64 },

    #[error("invalid update: {0}")]
    Validation(String),

    #[error("{item} was modified concurrently (expected revision {expected})")]
    Conflict { item: ItemRef, expected: i64 },

    #[error("storage failure: {0:#}")]
    Storage(#[source] anyhow::Error),
}

impl UpdateError {
    pub(crate) const fn not_found(item: ItemRef) -> Self {
        Self::NotFound {
            kind: item.kind,
            id: item.id,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::ItemNotFound,
            Self::Forbidden { .. } => ErrorCode::Forbidden,
            Self::Validation(_) => ErrorCode::InvalidPayload,
            Self::Conflict { .. } => ErrorCode::StaleWrite,
            Self::Storage(_) => ErrorCode::StorageFailure,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

/// Lift store-level failures into [`UpdateError::Storage`] with context.
pub(crate) trait StorageResultExt<T> {
    fn storage(self, context: &'static str) -> Result<T, UpdateError>;
}

impl<T, E> StorageResultExt<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn storage(self, context: &'static str) -> Result<T, UpdateError> {
        self.map_err(|err| UpdateError::Storage(err.into().context(context)))
    }
}
