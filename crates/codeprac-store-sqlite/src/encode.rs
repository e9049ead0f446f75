//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Audit details are stored as compact JSON.

use chrono::{DateTime, Utc};
use codeprac_core::{
  audit::AuditEntry,
  entity::{
    Batch, College, Department, Entity, EntityKind, EntityRef, ExternalId,
    Note, Outcome, PerformanceRecord, Question, Student, Topic,
  },
  lifecycle::LifecycleState,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("bad timestamp {s:?}: {e}")))
}

// ─── Enumerations ─────────────────────────────────────────────────────────────

pub fn encode_state(state: LifecycleState) -> Result<&'static str> {
  match state {
    LifecycleState::Active | LifecycleState::Disabled => Ok(state.as_str()),
    LifecycleState::Deleted => Err(Error::UnstorableState(state)),
  }
}

pub fn decode_state(s: &str) -> Result<LifecycleState> {
  match s {
    "active" => Ok(LifecycleState::Active),
    "disabled" => Ok(LifecycleState::Disabled),
    other => Err(Error::Decode(format!("unknown state: {other:?}"))),
  }
}

pub fn decode_outcome(s: &str) -> Result<Outcome> {
  s.parse().map_err(|_| Error::Decode(format!("unknown outcome: {s:?}")))
}

pub fn decode_kind(s: &str) -> Result<EntityKind> {
  s.parse().map_err(|_| Error::Decode(format!("unknown entity kind: {s:?}")))
}

fn decode_external(s: Option<String>) -> Option<ExternalId> { s.map(ExternalId) }

// ─── Table layout ─────────────────────────────────────────────────────────────

/// Table name, primary-key column and `SELECT` column list for each kind.
///
/// The column order here is the order the `Raw*` readers below expect.
pub struct Table {
  pub name:    &'static str,
  pub id:      &'static str,
  pub columns: &'static [&'static str],
}

impl Table {
  pub fn select_list(&self) -> String { self.columns.join(", ") }

  pub fn has_column(&self, column: &str) -> bool { self.columns.contains(&column) }
}

pub fn table(kind: EntityKind) -> Table {
  match kind {
    EntityKind::College => Table {
      name:    "colleges",
      id:      "college_id",
      columns: &[
        "college_id", "name", "email", "external_ref", "state", "created_at",
      ],
    },
    EntityKind::Department => Table {
      name:    "departments",
      id:      "department_id",
      columns: &[
        "department_id", "college_id", "name", "email", "external_ref",
        "state", "created_at",
      ],
    },
    EntityKind::Batch => Table {
      name:    "batches",
      id:      "batch_id",
      columns: &[
        "batch_id", "department_id", "college_id", "name", "email",
        "external_ref", "state", "created_at",
      ],
    },
    EntityKind::Student => Table {
      name:    "students",
      id:      "student_id",
      columns: &[
        "student_id", "batch_id", "department_id", "college_id", "username",
        "email", "external_ref", "state", "password_reset_required",
        "created_at",
      ],
    },
    EntityKind::Topic => Table {
      name:    "topics",
      id:      "topic_id",
      columns: &["topic_id", "department_id", "name", "created_at"],
    },
    EntityKind::Question => Table {
      name:    "questions",
      id:      "question_id",
      columns: &[
        "question_id", "topic_id", "department_id", "college_id", "batch_id",
        "title", "created_at",
      ],
    },
    EntityKind::Note => Table {
      name:    "notes",
      id:      "note_id",
      columns: &["note_id", "topic_id", "department_id", "title", "created_at"],
    },
    EntityKind::Performance => Table {
      name:    "performance",
      id:      "performance_id",
      columns: &[
        "performance_id", "student_id", "question_id", "batch_id",
        "department_id", "college_id", "outcome", "recorded_at",
      ],
    },
  }
}

// ─── Raw row types ────────────────────────────────────────────────────────────

/// A row as read from SQLite, before any parsing. One variant per table.
pub enum RawEntity {
  College {
    college_id:   String,
    name:         String,
    email:        Option<String>,
    external_ref: Option<String>,
    state:        String,
    created_at:   String,
  },
  Department {
    department_id: String,
    college_id:    String,
    name:          String,
    email:         Option<String>,
    external_ref:  Option<String>,
    state:         String,
    created_at:    String,
  },
  Batch {
    batch_id:      String,
    department_id: String,
    college_id:    String,
    name:          String,
    email:         Option<String>,
    external_ref:  Option<String>,
    state:         String,
    created_at:    String,
  },
  Student {
    student_id:              String,
    batch_id:                String,
    department_id:           String,
    college_id:              String,
    username:                String,
    email:                   String,
    external_ref:            Option<String>,
    state:                   String,
    password_reset_required: bool,
    created_at:              String,
  },
  Topic {
    topic_id:      String,
    department_id: String,
    name:          String,
    created_at:    String,
  },
  Question {
    question_id:   String,
    topic_id:      String,
    department_id: String,
    college_id:    String,
    batch_id:      Option<String>,
    title:         String,
    created_at:    String,
  },
  Note {
    note_id:       String,
    topic_id:      String,
    department_id: String,
    title:         String,
    created_at:    String,
  },
  Performance {
    performance_id: String,
    student_id:     String,
    question_id:    String,
    batch_id:       String,
    department_id:  String,
    college_id:     String,
    outcome:        String,
    recorded_at:    String,
  },
}

impl RawEntity {
  /// Read a row selected with [`Table::select_list`] for `kind`.
  pub fn read(kind: EntityKind, row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(match kind {
      EntityKind::College => Self::College {
        college_id:   row.get(0)?,
        name:         row.get(1)?,
        email:        row.get(2)?,
        external_ref: row.get(3)?,
        state:        row.get(4)?,
        created_at:   row.get(5)?,
      },
      EntityKind::Department => Self::Department {
        department_id: row.get(0)?,
        college_id:    row.get(1)?,
        name:          row.get(2)?,
        email:         row.get(3)?,
        external_ref:  row.get(4)?,
        state:         row.get(5)?,
        created_at:    row.get(6)?,
      },
      EntityKind::Batch => Self::Batch {
        batch_id:      row.get(0)?,
        department_id: row.get(1)?,
        college_id:    row.get(2)?,
        name:          row.get(3)?,
        email:         row.get(4)?,
        external_ref:  row.get(5)?,
        state:         row.get(6)?,
        created_at:    row.get(7)?,
      },
      EntityKind::Student => Self::Student {
        student_id:              row.get(0)?,
        batch_id:                row.get(1)?,
        department_id:           row.get(2)?,
        college_id:              row.get(3)?,
        username:                row.get(4)?,
        email:                   row.get(5)?,
        external_ref:            row.get(6)?,
        state:                   row.get(7)?,
        password_reset_required: row.get(8)?,
        created_at:              row.get(9)?,
      },
      EntityKind::Topic => Self::Topic {
        topic_id:      row.get(0)?,
        department_id: row.get(1)?,
        name:          row.get(2)?,
        created_at:    row.get(3)?,
      },
      EntityKind::Question => Self::Question {
        question_id:   row.get(0)?,
        topic_id:      row.get(1)?,
        department_id: row.get(2)?,
        college_id:    row.get(3)?,
        batch_id:      row.get(4)?,
        title:         row.get(5)?,
        created_at:    row.get(6)?,
      },
      EntityKind::Note => Self::Note {
        note_id:       row.get(0)?,
        topic_id:      row.get(1)?,
        department_id: row.get(2)?,
        title:         row.get(3)?,
        created_at:    row.get(4)?,
      },
      EntityKind::Performance => Self::Performance {
        performance_id: row.get(0)?,
        student_id:     row.get(1)?,
        question_id:    row.get(2)?,
        batch_id:       row.get(3)?,
        department_id:  row.get(4)?,
        college_id:     row.get(5)?,
        outcome:        row.get(6)?,
        recorded_at:    row.get(7)?,
      },
    })
  }

  pub fn into_entity(self) -> Result<Entity> {
    Ok(match self {
      Self::College { college_id, name, email, external_ref, state, created_at } => {
        Entity::College(College {
          college_id: decode_uuid(&college_id)?,
          name,
          email,
          external_ref: decode_external(external_ref),
          state: decode_state(&state)?,
          created_at: decode_dt(&created_at)?,
        })
      }
      Self::Department {
        department_id,
        college_id,
        name,
        email,
        external_ref,
        state,
        created_at,
      } => Entity::Department(Department {
        department_id: decode_uuid(&department_id)?,
        college_id: decode_uuid(&college_id)?,
        name,
        email,
        external_ref: decode_external(external_ref),
        state: decode_state(&state)?,
        created_at: decode_dt(&created_at)?,
      }),
      Self::Batch {
        batch_id,
        department_id,
        college_id,
        name,
        email,
        external_ref,
        state,
        created_at,
      } => Entity::Batch(Batch {
        batch_id: decode_uuid(&batch_id)?,
        department_id: decode_uuid(&department_id)?,
        college_id: decode_uuid(&college_id)?,
        name,
        email,
        external_ref: decode_external(external_ref),
        state: decode_state(&state)?,
        created_at: decode_dt(&created_at)?,
      }),
      Self::Student {
        student_id,
        batch_id,
        department_id,
        college_id,
        username,
        email,
        external_ref,
        state,
        password_reset_required,
        created_at,
      } => Entity::Student(Student {
        student_id: decode_uuid(&student_id)?,
        batch_id: decode_uuid(&batch_id)?,
        department_id: decode_uuid(&department_id)?,
        college_id: decode_uuid(&college_id)?,
        username,
        email,
        external_ref: decode_external(external_ref),
        state: decode_state(&state)?,
        password_reset_required,
        created_at: decode_dt(&created_at)?,
      }),
      Self::Topic { topic_id, department_id, name, created_at } => {
        Entity::Topic(Topic {
          topic_id: decode_uuid(&topic_id)?,
          department_id: decode_uuid(&department_id)?,
          name,
          created_at: decode_dt(&created_at)?,
        })
      }
      Self::Question {
        question_id,
        topic_id,
        department_id,
        college_id,
        batch_id,
        title,
        created_at,
      } => Entity::Question(Question {
        question_id: decode_uuid(&question_id)?,
        topic_id: decode_uuid(&topic_id)?,
        department_id: decode_uuid(&department_id)?,
        college_id: decode_uuid(&college_id)?,
        batch_id: decode_opt_uuid(batch_id.as_deref())?,
        title,
        created_at: decode_dt(&created_at)?,
      }),
      Self::Note { note_id, topic_id, department_id, title, created_at } => {
        Entity::Note(Note {
          note_id: decode_uuid(&note_id)?,
          topic_id: decode_uuid(&topic_id)?,
          department_id: decode_uuid(&department_id)?,
          title,
          created_at: decode_dt(&created_at)?,
        })
      }
      Self::Performance {
        performance_id,
        student_id,
        question_id,
        batch_id,
        department_id,
        college_id,
        outcome,
        recorded_at,
      } => Entity::Performance(PerformanceRecord {
        performance_id: decode_uuid(&performance_id)?,
        student_id: decode_uuid(&student_id)?,
        question_id: decode_uuid(&question_id)?,
        batch_id: decode_uuid(&batch_id)?,
        department_id: decode_uuid(&department_id)?,
        college_id: decode_uuid(&college_id)?,
        outcome: decode_outcome(&outcome)?,
        recorded_at: decode_dt(&recorded_at)?,
      }),
    })
  }
}

/// Audit row as read from SQLite.
pub struct RawAuditEntry {
  pub audit_id:    String,
  pub actor_id:    String,
  pub action:      String,
  pub target_kind: String,
  pub target_id:   String,
  pub details:     String,
  pub recorded_at: String,
}

impl RawAuditEntry {
  pub fn into_entry(self) -> Result<AuditEntry> {
    Ok(AuditEntry {
      audit_id:    decode_uuid(&self.audit_id)?,
      actor_id:    self.actor_id,
      action:      self.action,
      target:      EntityRef::new(
        decode_kind(&self.target_kind)?,
        decode_uuid(&self.target_id)?,
      ),
      details:     serde_json::from_str(&self.details)?,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}
