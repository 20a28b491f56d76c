use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The two kinds of work item. Each kind lives in its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Ticket,
    Task,
}

impl ItemKind {
    pub const ALL: [Self; 2] = [Self::Ticket, Self::Task];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ticket => "ticket",
            Self::Task => "task",
        }
    }

    /// Backing table for rows of this kind.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Ticket => "tickets",
            Self::Task => "tasks",
        }
    }

    /// Tag edge table for rows of this kind.
    #[must_use]
    pub const fn tag_table(self) -> &'static str {
        match self {
            Self::Ticket => "ticket_tags",
            Self::Task => "task_tags",
        }
    }

    /// Column holding the closing timestamp (`closed_at` / `completed_at`).
    #[must_use]
    pub const fn closing_column(self) -> &'static str {
        match self {
            Self::Ticket => "closed_at_us",
            Self::Task => "completed_at_us",
        }
    }

    /// Prefix used for human-facing references such as `TKT-42`.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Ticket => "TKT",
            Self::Task => "TSK",
        }
    }

    /// The single terminal status of this kind.
    #[must_use]
    pub const fn terminal_status(self) -> Status {
        match self {
            Self::Ticket => Status::Closed,
            Self::Task => Status::Completed,
        }
    }

    /// Statuses a row of this kind may hold, in lifecycle order.
    #[must_use]
    pub const fn statuses(self) -> &'static [Status] {
        match self {
            Self::Ticket => &[
                Status::Open,
                Status::Assigned,
                Status::InProgress,
                Status::Closed,
            ],
            Self::Task => &[Status::Open, Status::InProgress, Status::Completed],
        }
    }

    #[must_use]
    pub fn allows(self, status: Status) -> bool {
        self.statuses().contains(&status)
    }

    /// Only tasks carry a recurrence rule.
    #[must_use]
    pub const fn supports_recurrence(self) -> bool {
        matches!(self, Self::Task)
    }
}

/// Work item status across both kinds.
///
/// Every status of a kind may move to any other status of the same kind,
/// reopening included. Only the closing-timestamp bookkeeping depends on the
/// direction of the move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Open,
    Assigned,
    InProgress,
    Closed,
    Completed,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Closed => "closed",
            Self::Completed => "completed",
        }
    }

    /// Label used in audit text and notifications.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Assigned => "Assigned",
            Self::InProgress => "In Progress",
            Self::Closed => "Closed",
            Self::Completed => "Completed",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Completed)
    }
}

/// Identity of a work item row: kind plus primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub kind: ItemKind,
    pub id: i64,
}

impl ItemRef {
    #[must_use]
    pub const fn new(kind: ItemKind, id: i64) -> Self {
        Self { kind, id }
    }

    #[must_use]
    pub const fn ticket(id: i64) -> Self {
        Self::new(ItemKind::Ticket, id)
    }

    #[must_use]
    pub const fn task(id: i64) -> Self {
        Self::new(ItemKind::Task, id)
    }
}

/// Human-facing reference by sequence number, e.g. `TKT-42` or `tsk-7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeqRef {
    pub kind: ItemKind,
    pub seq: i64,
}

/// Error returned when parsing an enum value or reference from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl fmt::Display for SeqRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind.prefix(), self.seq)
    }
}

fn normalize(input: &str) -> String {
    input
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

impl FromStr for ItemKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "ticket" | "tkt" => Ok(Self::Ticket),
            "task" | "tsk" => Ok(Self::Task),
            _ => Err(ParseEnumError {
                expected: "kind",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "open" => Ok(Self::Open),
            "assigned" => Ok(Self::Assigned),
            "in_progress" | "inprogress" => Ok(Self::InProgress),
            "closed" => Ok(Self::Closed),
            "completed" => Ok(Self::Completed),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for SeqRef {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseEnumError {
            expected: "item reference (TKT-n or TSK-n)",
            got: s.to_string(),
        };

        let (prefix, number) = s.trim().split_once('-').ok_or_else(invalid)?;
        let kind = prefix.parse::<ItemKind>().map_err(|_| invalid())?;
        let seq = number.parse::<i64>().map_err(|_| invalid())?;
        if seq <= 0 {
            return Err(invalid());
        }
        Ok(Self { kind, seq })
    }
}
