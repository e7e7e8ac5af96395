//! SQL schema for the Retiro SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! the `PRAGMA user_version` number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id        TEXT PRIMARY KEY,
    institution_id TEXT NOT NULL,
    role           TEXT NOT NULL,   -- 'guardian' | 'teacher' | 'auxiliary' | 'admin'
    full_name      TEXT NOT NULL,
    email          TEXT
);

CREATE TABLE IF NOT EXISTS students (
    student_id     TEXT PRIMARY KEY,
    institution_id TEXT NOT NULL,
    section_id     TEXT NOT NULL,
    full_name      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS guardian_links (
    user_id    TEXT NOT NULL REFERENCES users(user_id),
    student_id TEXT NOT NULL REFERENCES students(student_id),
    titular    INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, student_id)
);

CREATE TABLE IF NOT EXISTS section_teachers (
    user_id    TEXT NOT NULL REFERENCES users(user_id),
    section_id TEXT NOT NULL,
    PRIMARY KEY (user_id, section_id)
);

-- Reference table; rows are upserted by unique name, never deleted.
CREATE TABLE IF NOT EXISTS withdrawal_categories (
    category_id TEXT PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS withdrawals (
    withdrawal_id       TEXT PRIMARY KEY,
    student_id          TEXT NOT NULL REFERENCES students(student_id),
    institution_id      TEXT NOT NULL,
    section_id          TEXT NOT NULL,
    date                TEXT NOT NULL,   -- ISO calendar date
    time                TEXT NOT NULL,   -- HH:MM:SS wall clock
    category_id         TEXT NOT NULL REFERENCES withdrawal_categories(category_id),
    origin              TEXT NOT NULL,
    state               TEXT NOT NULL DEFAULT 'pending',
    contact_medium      TEXT,
    guardian_contacted  TEXT,
    guardian_authorized TEXT,
    verified_by         TEXT,
    rejection_reason    TEXT,
    notes               TEXT,
    created_by          TEXT NOT NULL,
    created_at          TEXT NOT NULL    -- ISO 8601 UTC; server-assigned
);

-- At most one record per (student, calendar date); the withdrawal
-- reconciler and the regular attendance path both upsert against this key.
CREATE TABLE IF NOT EXISTS attendance (
    attendance_id TEXT PRIMARY KEY,
    student_id    TEXT NOT NULL REFERENCES students(student_id),
    date          TEXT NOT NULL,
    status        TEXT NOT NULL,
    observation   TEXT NOT NULL,
    recorded_by   TEXT NOT NULL,
    recorded_at   TEXT NOT NULL,
    UNIQUE (student_id, date)
);

-- Append-only; only the read flag is ever updated, and not from here.
CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    recipient_id    TEXT NOT NULL,
    title           TEXT NOT NULL,
    body            TEXT NOT NULL,
    category        TEXT NOT NULL,
    read            INTEGER NOT NULL DEFAULT 0,
    link            TEXT,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS withdrawals_student_idx   ON withdrawals(student_id);
CREATE INDEX IF NOT EXISTS withdrawals_state_idx     ON withdrawals(state);
CREATE INDEX IF NOT EXISTS notifications_recip_idx   ON notifications(recipient_id);

PRAGMA user_version = 1;
";
