//! Canonical SQLite schema for deskwork.
//!
//! - `users` holds staff identities and roles
//! - `tickets` and `tasks` hold one row per work item, one table per kind
//! - `ticket_tags` / `task_tags` model the multi-valued tag relation
//! - `comments` is the append-only audit and discussion stream for both kinds
//!
//! The closing timestamp of each kind is tied to its terminal status by a
//! CHECK constraint, so a row can never hold one without the other.

/// Migration v1: core tables.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    email TEXT NOT NULL UNIQUE CHECK (length(trim(email)) > 0),
    role TEXT NOT NULL CHECK (role IN ('admin', 'staff')),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tickets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    seq INTEGER NOT NULL UNIQUE CHECK (seq > 0),
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT,
    status TEXT NOT NULL DEFAULT 'open'
        CHECK (status IN ('open', 'assigned', 'in_progress', 'closed')),
    assignee_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
    created_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
    submitter_name TEXT,
    submitter_email TEXT,
    resolution_notes TEXT,
    due_at_us INTEGER,
    closed_at_us INTEGER,
    revision INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK ((status = 'closed') = (closed_at_us IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    seq INTEGER NOT NULL UNIQUE CHECK (seq > 0),
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT,
    status TEXT NOT NULL DEFAULT 'open'
        CHECK (status IN ('open', 'in_progress', 'completed')),
    assignee_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
    creator_id INTEGER NOT NULL REFERENCES users(id),
    resolution_notes TEXT,
    due_at_us INTEGER,
    recurrence_rule TEXT,
    completed_at_us INTEGER,
    revision INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK ((status = 'completed') = (completed_at_us IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS ticket_tags (
    ticket_id INTEGER NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
    tag TEXT NOT NULL CHECK (length(trim(tag)) > 0),
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (ticket_id, tag)
);

CREATE TABLE IF NOT EXISTS task_tags (
    task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    tag TEXT NOT NULL CHECK (length(trim(tag)) > 0),
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (task_id, tag)
);

CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_kind TEXT NOT NULL CHECK (item_kind IN ('ticket', 'task')),
    item_id INTEGER NOT NULL,
    author_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
    body TEXT NOT NULL,
    is_system INTEGER NOT NULL DEFAULT 0 CHECK (is_system IN (0, 1)),
    created_at_us INTEGER NOT NULL
);
";

/// Migration v2: read-path indexes and the append-only guard on comments.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_tickets_status_updated
    ON tickets(status, updated_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_tickets_assignee
    ON tickets(assignee_id);

CREATE INDEX IF NOT EXISTS idx_tasks_status_updated
    ON tasks(status, updated_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_tasks_assignee
    ON tasks(assignee_id);

CREATE INDEX IF NOT EXISTS idx_comments_item_created
    ON comments(item_kind, item_id, created_at_us, id);

CREATE TRIGGER IF NOT EXISTS comments_append_only
BEFORE UPDATE OF item_kind, item_id, author_id, body, is_system, created_at_us ON comments
BEGIN
    SELECT RAISE(ABORT, 'comments are append-only');
END;
";

/// Indexes expected by the read paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_tickets_status_updated",
    "idx_tickets_assignee",
    "idx_tasks_status_updated",
    "idx_tasks_assignee",
    "idx_comments_item_created",
];
