//! The `EntityStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `codeprac-store-sqlite`). The cascade engine depends on this abstraction,
//! injected at construction, never on a concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  entity::{
    Batch, College, Department, Entity, EntityKind, EntityRef, NewBatch,
    NewCollege, NewDepartment, NewNote, NewPerformance, NewQuestion,
    NewStudent, NewTopic, Note, PerformanceRecord, ProfileUpdate, Question,
    Student, Topic,
  },
  lifecycle::LifecycleState,
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`EntityStore::query`].
///
/// Every set field is an equality filter; all filters are ANDed. Filtering a
/// kind on a column it does not have is a backend error.
#[derive(Debug, Clone)]
pub struct EntityQuery {
  pub kind:          EntityKind,
  pub college_id:    Option<Uuid>,
  pub department_id: Option<Uuid>,
  pub batch_id:      Option<Uuid>,
  pub student_id:    Option<Uuid>,
  pub topic_id:      Option<Uuid>,
  pub question_id:   Option<Uuid>,
  pub state:         Option<LifecycleState>,
  /// Student username (exact match).
  pub username:      Option<String>,
  pub email:         Option<String>,
}

impl EntityQuery {
  pub fn new(kind: EntityKind) -> Self {
    Self {
      kind,
      college_id: None,
      department_id: None,
      batch_id: None,
      student_id: None,
      topic_id: None,
      question_id: None,
      state: None,
      username: None,
      email: None,
    }
  }

  pub fn college(mut self, id: Uuid) -> Self {
    self.college_id = Some(id);
    self
  }

  pub fn department(mut self, id: Uuid) -> Self {
    self.department_id = Some(id);
    self
  }

  pub fn batch(mut self, id: Uuid) -> Self {
    self.batch_id = Some(id);
    self
  }

  pub fn student(mut self, id: Uuid) -> Self {
    self.student_id = Some(id);
    self
  }

  pub fn topic(mut self, id: Uuid) -> Self {
    self.topic_id = Some(id);
    self
  }

  pub fn question(mut self, id: Uuid) -> Self {
    self.question_id = Some(id);
    self
  }

  pub fn state(mut self, state: LifecycleState) -> Self {
    self.state = Some(state);
    self
  }

  pub fn username(mut self, username: impl Into<String>) -> Self {
    self.username = Some(username.into());
    self
  }

  pub fn email(mut self, email: impl Into<String>) -> Self {
    self.email = Some(email.into());
    self
  }

  /// Restrict the query to whichever ancestor column matches `node`'s kind.
  /// `None` if nothing can sit beneath a record of that kind.
  pub fn under(self, node: EntityRef) -> Option<Self> {
    Some(match node.kind {
      EntityKind::College => self.college(node.id),
      EntityKind::Department => self.department(node.id),
      EntityKind::Batch => self.batch(node.id),
      EntityKind::Student => self.student(node.id),
      EntityKind::Topic => self.topic(node.id),
      EntityKind::Question => self.question(node.id),
      EntityKind::Note | EntityKind::Performance => return None,
    })
  }
}

/// What a single-record write actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
  Changed,
  /// The record exists and was already in the requested shape.
  Unchanged,
  /// No such record.
  Missing,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Codeprac entity store backend.
///
/// Creation methods resolve the parent reference, copy its ancestor ids onto
/// the new record and fail if the parent does not exist. A hierarchy node
/// created under a disabled parent starts out disabled.
///
/// Removal is a hard delete and must refuse to remove a record that still
/// has children referencing it.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait EntityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Creation ──────────────────────────────────────────────────────────

  fn create_college(
    &self,
    input: NewCollege,
  ) -> impl Future<Output = Result<College, Self::Error>> + Send + '_;

  fn create_department(
    &self,
    input: NewDepartment,
  ) -> impl Future<Output = Result<Department, Self::Error>> + Send + '_;

  fn create_batch(
    &self,
    input: NewBatch,
  ) -> impl Future<Output = Result<Batch, Self::Error>> + Send + '_;

  fn create_student(
    &self,
    input: NewStudent,
  ) -> impl Future<Output = Result<Student, Self::Error>> + Send + '_;

  fn create_topic(
    &self,
    input: NewTopic,
  ) -> impl Future<Output = Result<Topic, Self::Error>> + Send + '_;

  /// The question inherits department and college from its topic. If a
  /// batch is given it must belong to the same department.
  fn create_question(
    &self,
    input: NewQuestion,
  ) -> impl Future<Output = Result<Question, Self::Error>> + Send + '_;

  fn create_note(
    &self,
    input: NewNote,
  ) -> impl Future<Output = Result<Note, Self::Error>> + Send + '_;

  /// Performance records inherit their hierarchy ids from the student.
  fn record_performance(
    &self,
    input: NewPerformance,
  ) -> impl Future<Output = Result<PerformanceRecord, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Retrieve a record. Returns `None` if not found.
  fn get(
    &self,
    entity: EntityRef,
  ) -> impl Future<Output = Result<Option<Entity>, Self::Error>> + Send + '_;

  /// All records of `query.kind` matching every set filter, oldest first.
  fn query<'a>(
    &'a self,
    query: &'a EntityQuery,
  ) -> impl Future<Output = Result<Vec<Entity>, Self::Error>> + Send + 'a;

  // ── Mutations ─────────────────────────────────────────────────────────

  /// Set the lifecycle state of a hierarchy node. `Deleted` is not a
  /// storable state; use [`delete`](Self::delete).
  fn set_state(
    &self,
    entity: EntityRef,
    state: LifecycleState,
  ) -> impl Future<Output = Result<Applied, Self::Error>> + Send + '_;

  /// Update the profile fields of a hierarchy node and return the stored
  /// record, or `None` if it does not exist.
  fn update_profile(
    &self,
    entity: EntityRef,
    update: ProfileUpdate,
  ) -> impl Future<Output = Result<Option<Entity>, Self::Error>> + Send + '_;

  /// Permanently remove a record.
  fn delete(
    &self,
    entity: EntityRef,
  ) -> impl Future<Output = Result<Applied, Self::Error>> + Send + '_;
}
