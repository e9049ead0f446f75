//! SQL schema for the Codeprac SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.
//!
//! Parent references are plain foreign keys with no `ON DELETE` action, so
//! the database itself refuses to remove a record that still has children.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS colleges (
    college_id    TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    email         TEXT,
    external_ref  TEXT,
    state         TEXT NOT NULL DEFAULT 'active'
                  CHECK (state IN ('active', 'disabled')),
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS departments (
    department_id TEXT PRIMARY KEY,
    college_id    TEXT NOT NULL REFERENCES colleges(college_id),
    name          TEXT NOT NULL,
    email         TEXT,
    external_ref  TEXT,
    state         TEXT NOT NULL DEFAULT 'active'
                  CHECK (state IN ('active', 'disabled')),
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS batches (
    batch_id      TEXT PRIMARY KEY,
    department_id TEXT NOT NULL REFERENCES departments(department_id),
    college_id    TEXT NOT NULL REFERENCES colleges(college_id),
    name          TEXT NOT NULL,
    email         TEXT,
    external_ref  TEXT,
    state         TEXT NOT NULL DEFAULT 'active'
                  CHECK (state IN ('active', 'disabled')),
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS students (
    student_id              TEXT PRIMARY KEY,
    batch_id                TEXT NOT NULL REFERENCES batches(batch_id),
    department_id           TEXT NOT NULL REFERENCES departments(department_id),
    college_id              TEXT NOT NULL REFERENCES colleges(college_id),
    username                TEXT NOT NULL UNIQUE,
    email                   TEXT NOT NULL UNIQUE,
    external_ref            TEXT,
    state                   TEXT NOT NULL DEFAULT 'active'
                            CHECK (state IN ('active', 'disabled')),
    password_reset_required INTEGER NOT NULL DEFAULT 0,
    created_at              TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS topics (
    topic_id      TEXT PRIMARY KEY,
    department_id TEXT NOT NULL REFERENCES departments(department_id),
    name          TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS questions (
    question_id   TEXT PRIMARY KEY,
    topic_id      TEXT NOT NULL REFERENCES topics(topic_id),
    department_id TEXT NOT NULL REFERENCES departments(department_id),
    college_id    TEXT NOT NULL REFERENCES colleges(college_id),
    batch_id      TEXT REFERENCES batches(batch_id),   -- NULL = whole department
    title         TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notes (
    note_id       TEXT PRIMARY KEY,
    topic_id      TEXT NOT NULL REFERENCES topics(topic_id),
    department_id TEXT NOT NULL REFERENCES departments(department_id),
    title         TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS performance (
    performance_id TEXT PRIMARY KEY,
    student_id     TEXT NOT NULL REFERENCES students(student_id),
    question_id    TEXT NOT NULL REFERENCES questions(question_id),
    batch_id       TEXT NOT NULL,
    department_id  TEXT NOT NULL,
    college_id     TEXT NOT NULL,
    outcome        TEXT NOT NULL,   -- 'passed' | 'failed' | 'attempted'
    recorded_at    TEXT NOT NULL
);

-- Strictly append-only. No UPDATE or DELETE is ever issued against it.
CREATE TABLE IF NOT EXISTS audit_log (
    audit_id     TEXT PRIMARY KEY,
    actor_id     TEXT NOT NULL,
    action       TEXT NOT NULL,
    target_kind  TEXT NOT NULL,
    target_id    TEXT NOT NULL,
    details      TEXT NOT NULL DEFAULT '{}',
    recorded_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS departments_college_idx ON departments(college_id);
CREATE INDEX IF NOT EXISTS batches_department_idx  ON batches(department_id);
CREATE INDEX IF NOT EXISTS students_batch_idx      ON students(batch_id);
CREATE INDEX IF NOT EXISTS topics_department_idx   ON topics(department_id);
CREATE INDEX IF NOT EXISTS questions_topic_idx     ON questions(topic_id);
CREATE INDEX IF NOT EXISTS questions_batch_idx     ON questions(batch_id);
CREATE INDEX IF NOT EXISTS notes_topic_idx         ON notes(topic_id);
CREATE INDEX IF NOT EXISTS performance_student_idx ON performance(student_id);
CREATE INDEX IF NOT EXISTS performance_question_idx ON performance(question_id);
CREATE INDEX IF NOT EXISTS audit_target_idx        ON audit_log(target_kind, target_id);

PRAGMA user_version = 1;
";
