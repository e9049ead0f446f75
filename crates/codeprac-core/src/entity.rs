//! Entity types: the records held by the entity store.
//!
//! The hierarchy is strictly four levels deep:
//!
//! ```text
//! College → Department → Batch → Student
//! ```
//!
//! Content records (topics, questions, notes, performance records) hang off
//! that hierarchy through their parent references but carry no lifecycle of
//! their own. Ancestor ids on deeper records are denormalised by the store at
//! creation time and never change afterwards.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, lifecycle::LifecycleState};

// ─── Kinds ───────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
  College,
  Department,
  Batch,
  Student,
  Topic,
  Question,
  Note,
  Performance,
}

impl EntityKind {
  pub const ALL: [EntityKind; 8] = [
    Self::College,
    Self::Department,
    Self::Batch,
    Self::Student,
    Self::Topic,
    Self::Question,
    Self::Note,
    Self::Performance,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::College => "college",
      Self::Department => "department",
      Self::Batch => "batch",
      Self::Student => "student",
      Self::Topic => "topic",
      Self::Question => "question",
      Self::Note => "note",
      Self::Performance => "performance",
    }
  }

  /// Collection name, used as the key in per-kind counters.
  pub fn plural(self) -> &'static str {
    match self {
      Self::College => "colleges",
      Self::Department => "departments",
      Self::Batch => "batches",
      Self::Student => "students",
      Self::Topic => "topics",
      Self::Question => "questions",
      Self::Note => "notes",
      Self::Performance => "performance",
    }
  }

  /// Whether records of this kind carry a [`LifecycleState`].
  pub fn has_lifecycle(self) -> bool {
    matches!(
      self,
      Self::College | Self::Department | Self::Batch | Self::Student
    )
  }

  /// Depth in the hierarchy, `None` for content records.
  pub fn depth(self) -> Option<u8> {
    match self {
      Self::College => Some(0),
      Self::Department => Some(1),
      Self::Batch => Some(2),
      Self::Student => Some(3),
      _ => None,
    }
  }

  /// Position in a leaf-first removal order. Lower ranks go first.
  pub fn removal_rank(self) -> u8 {
    match self {
      Self::Performance => 0,
      Self::Question => 1,
      Self::Note => 2,
      Self::Topic => 3,
      Self::Student => 4,
      Self::Batch => 5,
      Self::Department => 6,
      Self::College => 7,
    }
  }
}

impl fmt::Display for EntityKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for EntityKind {
  type Err = Error;

  /// Accepts both the singular and the collection name, case-insensitively.
  fn from_str(s: &str) -> Result<Self> {
    let needle = s.trim().to_ascii_lowercase();
    Self::ALL
      .into_iter()
      .find(|k| k.as_str() == needle || k.plural() == needle)
      .ok_or_else(|| Error::UnknownKind(s.to_owned()))
  }
}

/// A typed pointer to a single record.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EntityRef {
  pub kind: EntityKind,
  pub id:   Uuid,
}

impl EntityRef {
  pub fn new(kind: EntityKind, id: Uuid) -> Self { Self { kind, id } }

  pub fn college(id: Uuid) -> Self { Self::new(EntityKind::College, id) }

  pub fn department(id: Uuid) -> Self { Self::new(EntityKind::Department, id) }

  pub fn batch(id: Uuid) -> Self { Self::new(EntityKind::Batch, id) }

  pub fn student(id: Uuid) -> Self { Self::new(EntityKind::Student, id) }

  pub fn topic(id: Uuid) -> Self { Self::new(EntityKind::Topic, id) }

  pub fn question(id: Uuid) -> Self { Self::new(EntityKind::Question, id) }

  pub fn note(id: Uuid) -> Self { Self::new(EntityKind::Note, id) }

  pub fn performance(id: Uuid) -> Self { Self::new(EntityKind::Performance, id) }
}

impl fmt::Display for EntityRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.kind, self.id)
  }
}

/// Opaque identifier of a user record held by the external identity service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(pub String);

impl ExternalId {
  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ExternalId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Hierarchy nodes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct College {
  pub college_id:   Uuid,
  pub name:         String,
  pub email:        Option<String>,
  pub external_ref: Option<ExternalId>,
  pub state:        LifecycleState,
  pub created_at:   DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
  pub department_id: Uuid,
  pub college_id:    Uuid,
  pub name:          String,
  pub email:         Option<String>,
  pub external_ref:  Option<ExternalId>,
  pub state:         LifecycleState,
  pub created_at:    DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
  pub batch_id:      Uuid,
  pub department_id: Uuid,
  pub college_id:    Uuid,
  pub name:          String,
  pub email:         Option<String>,
  pub external_ref:  Option<ExternalId>,
  pub state:         LifecycleState,
  pub created_at:    DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
  pub student_id:              Uuid,
  pub batch_id:                Uuid,
  pub department_id:           Uuid,
  pub college_id:              Uuid,
  pub username:                String,
  pub email:                   String,
  pub external_ref:            Option<ExternalId>,
  pub state:                   LifecycleState,
  /// Set when the account was provisioned with a generated password.
  pub password_reset_required: bool,
  pub created_at:              DateTime<Utc>,
}

// ─── Content ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
  pub topic_id:      Uuid,
  pub department_id: Uuid,
  pub name:          String,
  pub created_at:    DateTime<Utc>,
}

/// A practice question. `batch_id` is set when the question is assigned to a
/// single batch rather than the whole department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
  pub question_id:   Uuid,
  pub topic_id:      Uuid,
  pub department_id: Uuid,
  pub college_id:    Uuid,
  pub batch_id:      Option<Uuid>,
  pub title:         String,
  pub created_at:    DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
  pub note_id:       Uuid,
  pub topic_id:      Uuid,
  pub department_id: Uuid,
  pub title:         String,
  pub created_at:    DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
  Passed,
  Failed,
  Attempted,
}

impl Outcome {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Passed => "passed",
      Self::Failed => "failed",
      Self::Attempted => "attempted",
    }
  }
}

impl FromStr for Outcome {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "passed" => Ok(Self::Passed),
      "failed" => Ok(Self::Failed),
      "attempted" => Ok(Self::Attempted),
      _ => Err(Error::UnknownOutcome(s.to_owned())),
    }
  }
}

/// One student's result on one question. Owned by the student; removed with
/// the student or with the question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
  pub performance_id: Uuid,
  pub student_id:     Uuid,
  pub question_id:    Uuid,
  pub batch_id:       Uuid,
  pub department_id:  Uuid,
  pub college_id:     Uuid,
  pub outcome:        Outcome,
  pub recorded_at:    DateTime<Utc>,
}

// ─── Any entity ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entity {
  College(College),
  Department(Department),
  Batch(Batch),
  Student(Student),
  Topic(Topic),
  Question(Question),
  Note(Note),
  Performance(PerformanceRecord),
}

impl Entity {
  pub fn kind(&self) -> EntityKind {
    match self {
      Self::College(_) => EntityKind::College,
      Self::Department(_) => EntityKind::Department,
      Self::Batch(_) => EntityKind::Batch,
      Self::Student(_) => EntityKind::Student,
      Self::Topic(_) => EntityKind::Topic,
      Self::Question(_) => EntityKind::Question,
      Self::Note(_) => EntityKind::Note,
      Self::Performance(_) => EntityKind::Performance,
    }
  }

  pub fn id(&self) -> Uuid {
    match self {
      Self::College(c) => c.college_id,
      Self::Department(d) => d.department_id,
      Self::Batch(b) => b.batch_id,
      Self::Student(s) => s.student_id,
      Self::Topic(t) => t.topic_id,
      Self::Question(q) => q.question_id,
      Self::Note(n) => n.note_id,
      Self::Performance(p) => p.performance_id,
    }
  }

  pub fn reference(&self) -> EntityRef { EntityRef::new(self.kind(), self.id()) }

  /// Lifecycle state, `None` for content records.
  pub fn state(&self) -> Option<LifecycleState> {
    match self {
      Self::College(c) => Some(c.state),
      Self::Department(d) => Some(d.state),
      Self::Batch(b) => Some(b.state),
      Self::Student(s) => Some(s.state),
      _ => None,
    }
  }

  pub fn external_ref(&self) -> Option<&ExternalId> {
    match self {
      Self::College(c) => c.external_ref.as_ref(),
      Self::Department(d) => d.external_ref.as_ref(),
      Self::Batch(b) => b.external_ref.as_ref(),
      Self::Student(s) => s.external_ref.as_ref(),
      _ => None,
    }
  }

  /// The immediate hierarchy parent, if any.
  pub fn parent(&self) -> Option<EntityRef> {
    match self {
      Self::College(_) => None,
      Self::Department(d) => Some(EntityRef::college(d.college_id)),
      Self::Batch(b) => Some(EntityRef::department(b.department_id)),
      Self::Student(s) => Some(EntityRef::batch(s.batch_id)),
      Self::Topic(t) => Some(EntityRef::department(t.department_id)),
      Self::Question(q) => Some(EntityRef::topic(q.topic_id)),
      Self::Note(n) => Some(EntityRef::topic(n.topic_id)),
      Self::Performance(p) => Some(EntityRef::student(p.student_id)),
    }
  }
}

// ─── Creation inputs ─────────────────────────────────────────────────────────

/// Input for [`EntityStore::create_college`](crate::store::EntityStore::create_college).
#[derive(Debug, Clone)]
pub struct NewCollege {
  pub name:         String,
  pub email:        Option<String>,
  pub external_ref: Option<ExternalId>,
}

#[derive(Debug, Clone)]
pub struct NewDepartment {
  pub college_id:   Uuid,
  pub name:         String,
  pub email:        Option<String>,
  pub external_ref: Option<ExternalId>,
}

#[derive(Debug, Clone)]
pub struct NewBatch {
  pub department_id: Uuid,
  pub name:          String,
  pub email:         Option<String>,
  pub external_ref:  Option<ExternalId>,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
  pub batch_id:                Uuid,
  pub username:                String,
  pub email:                   String,
  pub external_ref:            Option<ExternalId>,
  pub password_reset_required: bool,
}

#[derive(Debug, Clone)]
pub struct NewTopic {
  pub department_id: Uuid,
  pub name:          String,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
  pub topic_id: Uuid,
  pub batch_id: Option<Uuid>,
  pub title:    String,
}

#[derive(Debug, Clone)]
pub struct NewNote {
  pub topic_id: Uuid,
  pub title:    String,
}

#[derive(Debug, Clone)]
pub struct NewPerformance {
  pub student_id:  Uuid,
  pub question_id: Uuid,
  pub outcome:     Outcome,
}

/// Mutable profile fields of a hierarchy node. Parent linkage is deliberately
/// absent: it cannot change after creation.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
  /// Display name for colleges, departments and batches; username for
  /// students.
  pub name:                    Option<String>,
  pub email:                   Option<String>,
  /// Students only; ignored for other kinds.
  pub password_reset_required: Option<bool>,
}

impl ProfileUpdate {
  pub fn is_empty(&self) -> bool {
    self.name.is_none() && self.email.is_none() && self.password_reset_required.is_none()
  }
}
