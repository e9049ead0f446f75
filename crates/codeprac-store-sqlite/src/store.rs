//! [`SqliteStore`]: the SQLite implementation of [`EntityStore`] and
//! [`AuditRecorder`].

use std::path::Path;

use chrono::Utc;
use codeprac_core::{
  audit::{AuditEntry, AuditRecorder, NewAuditEntry},
  entity::{
    Batch, College, Department, Entity, EntityKind, EntityRef, ExternalId,
    NewBatch, NewCollege, NewDepartment, NewNote, NewPerformance, NewQuestion,
    NewStudent, NewTopic, Note, PerformanceRecord, ProfileUpdate, Question,
    Student, Topic,
  },
  lifecycle::LifecycleState,
  store::{Applied, EntityQuery, EntityStore},
};
use rusqlite::{OptionalExtension as _, types::Value};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RawAuditEntry, RawEntity, encode_dt, encode_state, encode_uuid, table,
  },
  schema::SCHEMA,
};

// ─── Value helpers ───────────────────────────────────────────────────────────

fn text(s: impl Into<String>) -> Value { Value::Text(s.into()) }

fn opt_text(s: Option<String>) -> Value { s.map_or(Value::Null, Value::Text) }

fn uuid(id: Uuid) -> Value { Value::Text(encode_uuid(id)) }

fn external(r: Option<ExternalId>) -> Value { opt_text(r.map(|e| e.0)) }

/// A child created under a disabled node starts out disabled, so no active
/// record ever sits beneath a disabled ancestor.
fn inherited(parent: LifecycleState) -> LifecycleState {
  match parent {
    LifecycleState::Disabled => LifecycleState::Disabled,
    _ => LifecycleState::Active,
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Codeprac entity store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    tracing::debug!("sqlite schema initialised");
    Ok(())
  }

  /// Run a single parameterised write and return the affected row count.
  async fn execute(&self, sql: String, values: Vec<Value>) -> Result<usize> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?)
      })
      .await?;
    Ok(changed)
  }

  async fn fetch(&self, entity: EntityRef) -> Result<Option<Entity>> {
    let kind   = entity.kind;
    let t      = table(kind);
    let sql    = format!(
      "SELECT {} FROM {} WHERE {} = ?1",
      t.select_list(),
      t.name,
      t.id
    );
    let id_str = encode_uuid(entity.id);

    let raw: Option<RawEntity> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(&sql, rusqlite::params![id_str], |row| {
            RawEntity::read(kind, row)
          })
          .optional()?)
      })
      .await?;

    raw.map(RawEntity::into_entity).transpose()
  }

  async fn college(&self, id: Uuid) -> Result<College> {
    match self.fetch(EntityRef::college(id)).await? {
      Some(Entity::College(c)) => Ok(c),
      _ => Err(Error::ParentNotFound(EntityRef::college(id))),
    }
  }

  async fn department(&self, id: Uuid) -> Result<Department> {
    match self.fetch(EntityRef::department(id)).await? {
      Some(Entity::Department(d)) => Ok(d),
      _ => Err(Error::ParentNotFound(EntityRef::department(id))),
    }
  }

  async fn batch(&self, id: Uuid) -> Result<Batch> {
    match self.fetch(EntityRef::batch(id)).await? {
      Some(Entity::Batch(b)) => Ok(b),
      _ => Err(Error::ParentNotFound(EntityRef::batch(id))),
    }
  }

  async fn student(&self, id: Uuid) -> Result<Student> {
    match self.fetch(EntityRef::student(id)).await? {
      Some(Entity::Student(s)) => Ok(s),
      _ => Err(Error::ParentNotFound(EntityRef::student(id))),
    }
  }

  async fn topic(&self, id: Uuid) -> Result<Topic> {
    match self.fetch(EntityRef::topic(id)).await? {
      Some(Entity::Topic(t)) => Ok(t),
      _ => Err(Error::ParentNotFound(EntityRef::topic(id))),
    }
  }

  async fn question(&self, id: Uuid) -> Result<Question> {
    match self.fetch(EntityRef::question(id)).await? {
      Some(Entity::Question(q)) => Ok(q),
      _ => Err(Error::ParentNotFound(EntityRef::question(id))),
    }
  }

  /// Audit entries, newest first, optionally restricted to one target.
  pub async fn audit_entries(
    &self,
    target: Option<EntityRef>,
  ) -> Result<Vec<AuditEntry>> {
    let filter = target.map(|t| (t.kind.as_str().to_owned(), encode_uuid(t.id)));

    let raws: Vec<RawAuditEntry> = self
      .conn
      .call(move |conn| {
        let read = |row: &rusqlite::Row<'_>| {
          Ok(RawAuditEntry {
            audit_id:    row.get(0)?,
            actor_id:    row.get(1)?,
            action:      row.get(2)?,
            target_kind: row.get(3)?,
            target_id:   row.get(4)?,
            details:     row.get(5)?,
            recorded_at: row.get(6)?,
          })
        };
        let rows = if let Some((kind, id)) = filter {
          let mut stmt = conn.prepare(
            "SELECT audit_id, actor_id, action, target_kind, target_id, details, recorded_at
             FROM audit_log
             WHERE target_kind = ?1 AND target_id = ?2
             ORDER BY rowid DESC",
          )?;
          stmt
            .query_map(rusqlite::params![kind, id], read)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(
            "SELECT audit_id, actor_id, action, target_kind, target_id, details, recorded_at
             FROM audit_log
             ORDER BY rowid DESC",
          )?;
          stmt
            .query_map([], read)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAuditEntry::into_entry).collect()
  }
}

// ─── EntityStore impl ────────────────────────────────────────────────────────

impl EntityStore for SqliteStore {
  type Error = Error;

  // ── Creation ──────────────────────────────────────────────────────────────

  async fn create_college(&self, input: NewCollege) -> Result<College> {
    let college = College {
      college_id:   Uuid::new_v4(),
      name:         input.name,
      email:        input.email,
      external_ref: input.external_ref,
      state:        LifecycleState::Active,
      created_at:   Utc::now(),
    };

    self
      .execute(
        "INSERT INTO colleges (college_id, name, email, external_ref, state, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
          .to_owned(),
        vec![
          uuid(college.college_id),
          text(college.name.clone()),
          opt_text(college.email.clone()),
          external(college.external_ref.clone()),
          text(encode_state(college.state)?),
          text(encode_dt(college.created_at)),
        ],
      )
      .await?;

    Ok(college)
  }

  async fn create_department(&self, input: NewDepartment) -> Result<Department> {
    let college = self.college(input.college_id).await?;

    let department = Department {
      department_id: Uuid::new_v4(),
      college_id:    college.college_id,
      name:          input.name,
      email:         input.email,
      external_ref:  input.external_ref,
      state:         inherited(college.state),
      created_at:    Utc::now(),
    };

    self
      .execute(
        "INSERT INTO departments (
           department_id, college_id, name, email, external_ref, state, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
          .to_owned(),
        vec![
          uuid(department.department_id),
          uuid(department.college_id),
          text(department.name.clone()),
          opt_text(department.email.clone()),
          external(department.external_ref.clone()),
          text(encode_state(department.state)?),
          text(encode_dt(department.created_at)),
        ],
      )
      .await?;

    Ok(department)
  }

  async fn create_batch(&self, input: NewBatch) -> Result<Batch> {
    let department = self.department(input.department_id).await?;

    let batch = Batch {
      batch_id:      Uuid::new_v4(),
      department_id: department.department_id,
      college_id:    department.college_id,
      name:          input.name,
      email:         input.email,
      external_ref:  input.external_ref,
      state:         inherited(department.state),
      created_at:    Utc::now(),
    };

    self
      .execute(
        "INSERT INTO batches (
           batch_id, department_id, college_id, name, email, external_ref, state, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
          .to_owned(),
        vec![
          uuid(batch.batch_id),
          uuid(batch.department_id),
          uuid(batch.college_id),
          text(batch.name.clone()),
          opt_text(batch.email.clone()),
          external(batch.external_ref.clone()),
          text(encode_state(batch.state)?),
          text(encode_dt(batch.created_at)),
        ],
      )
      .await?;

    Ok(batch)
  }

  async fn create_student(&self, input: NewStudent) -> Result<Student> {
    let batch = self.batch(input.batch_id).await?;

    let student = Student {
      student_id:              Uuid::new_v4(),
      batch_id:                batch.batch_id,
      department_id:           batch.department_id,
      college_id:              batch.college_id,
      username:                input.username,
      email:                   input.email,
      external_ref:            input.external_ref,
      state:                   inherited(batch.state),
      password_reset_required: input.password_reset_required,
      created_at:              Utc::now(),
    };

    self
      .execute(
        "INSERT INTO students (
           student_id, batch_id, department_id, college_id, username, email,
           external_ref, state, password_reset_required, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
          .to_owned(),
        vec![
          uuid(student.student_id),
          uuid(student.batch_id),
          uuid(student.department_id),
          uuid(student.college_id),
          text(student.username.clone()),
          text(student.email.clone()),
          external(student.external_ref.clone()),
          text(encode_state(student.state)?),
          Value::Integer(i64::from(student.password_reset_required)),
          text(encode_dt(student.created_at)),
        ],
      )
      .await?;

    Ok(student)
  }

  async fn create_topic(&self, input: NewTopic) -> Result<Topic> {
    let department = self.department(input.department_id).await?;

    let topic = Topic {
      topic_id:      Uuid::new_v4(),
      department_id: department.department_id,
      name:          input.name,
      created_at:    Utc::now(),
    };

    self
      .execute(
        "INSERT INTO topics (topic_id, department_id, name, created_at)
         VALUES (?1, ?2, ?3, ?4)"
          .to_owned(),
        vec![
          uuid(topic.topic_id),
          uuid(topic.department_id),
          text(topic.name.clone()),
          text(encode_dt(topic.created_at)),
        ],
      )
      .await?;

    Ok(topic)
  }

  async fn create_question(&self, input: NewQuestion) -> Result<Question> {
    let topic      = self.topic(input.topic_id).await?;
    let department = self.department(topic.department_id).await?;

    if let Some(batch_id) = input.batch_id {
      let batch = self.batch(batch_id).await?;
      if batch.department_id != topic.department_id {
        return Err(Error::ScopeMismatch {
          child:  EntityRef::batch(batch_id),
          parent: EntityRef::department(topic.department_id),
        });
      }
    }

    let question = Question {
      question_id:   Uuid::new_v4(),
      topic_id:      topic.topic_id,
      department_id: department.department_id,
      college_id:    department.college_id,
      batch_id:      input.batch_id,
      title:         input.title,
      created_at:    Utc::now(),
    };

    self
      .execute(
        "INSERT INTO questions (
           question_id, topic_id, department_id, college_id, batch_id, title, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
          .to_owned(),
        vec![
          uuid(question.question_id),
          uuid(question.topic_id),
          uuid(question.department_id),
          uuid(question.college_id),
          question.batch_id.map_or(Value::Null, uuid),
          text(question.title.clone()),
          text(encode_dt(question.created_at)),
        ],
      )
      .await?;

    Ok(question)
  }

  async fn create_note(&self, input: NewNote) -> Result<Note> {
    let topic = self.topic(input.topic_id).await?;

    let note = Note {
      note_id:       Uuid::new_v4(),
      topic_id:      topic.topic_id,
      department_id: topic.department_id,
      title:         input.title,
      created_at:    Utc::now(),
    };

    self
      .execute(
        "INSERT INTO notes (note_id, topic_id, department_id, title, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)"
          .to_owned(),
        vec![
          uuid(note.note_id),
          uuid(note.topic_id),
          uuid(note.department_id),
          text(note.title.clone()),
          text(encode_dt(note.created_at)),
        ],
      )
      .await?;

    Ok(note)
  }

  async fn record_performance(
    &self,
    input: NewPerformance,
  ) -> Result<PerformanceRecord> {
    let student  = self.student(input.student_id).await?;
    let question = self.question(input.question_id).await?;

    if question.college_id != student.college_id {
      return Err(Error::ScopeMismatch {
        child:  EntityRef::question(question.question_id),
        parent: EntityRef::college(student.college_id),
      });
    }

    let record = PerformanceRecord {
      performance_id: Uuid::new_v4(),
      student_id:     student.student_id,
      question_id:    question.question_id,
      batch_id:       student.batch_id,
      department_id:  student.department_id,
      college_id:     student.college_id,
      outcome:        input.outcome,
      recorded_at:    Utc::now(),
    };

    self
      .execute(
        "INSERT INTO performance (
           performance_id, student_id, question_id, batch_id, department_id,
           college_id, outcome, recorded_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
          .to_owned(),
        vec![
          uuid(record.performance_id),
          uuid(record.student_id),
          uuid(record.question_id),
          uuid(record.batch_id),
          uuid(record.department_id),
          uuid(record.college_id),
          text(record.outcome.as_str()),
          text(encode_dt(record.recorded_at)),
        ],
      )
      .await?;

    Ok(record)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get(&self, entity: EntityRef) -> Result<Option<Entity>> {
    self.fetch(entity).await
  }

  async fn query(&self, query: &EntityQuery) -> Result<Vec<Entity>> {
    let kind = query.kind;
    let t    = table(kind);

    let state_str = query.state.map(encode_state).transpose()?;
    let filters: [(&'static str, Option<String>); 9] = [
      ("college_id", query.college_id.map(encode_uuid)),
      ("department_id", query.department_id.map(encode_uuid)),
      ("batch_id", query.batch_id.map(encode_uuid)),
      ("student_id", query.student_id.map(encode_uuid)),
      ("topic_id", query.topic_id.map(encode_uuid)),
      ("question_id", query.question_id.map(encode_uuid)),
      ("state", state_str.map(str::to_owned)),
      ("username", query.username.clone()),
      ("email", query.email.clone()),
    ];

    // Build WHERE clause dynamically.
    let mut conds: Vec<String> = vec![];
    let mut values: Vec<Value> = vec![];
    for (column, value) in filters {
      let Some(value) = value else { continue };
      if !t.has_column(column) {
        return Err(Error::UnsupportedFilter { kind, column });
      }
      values.push(Value::Text(value));
      conds.push(format!("{column} = ?{}", values.len()));
    }

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };

    let sql = format!(
      "SELECT {} FROM {} {where_clause} ORDER BY rowid",
      t.select_list(),
      t.name
    );

    let raws: Vec<RawEntity> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(values.iter()), |row| {
            RawEntity::read(kind, row)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntity::into_entity).collect()
  }

  // ── Mutations ─────────────────────────────────────────────────────────────

  async fn set_state(&self, entity: EntityRef, state: LifecycleState) -> Result<Applied> {
    if !entity.kind.has_lifecycle() {
      return Err(Error::NoLifecycle(entity.kind));
    }
    let state_str = encode_state(state)?;
    let t         = table(entity.kind);
    let update    = format!(
      "UPDATE {} SET state = ?1 WHERE {} = ?2 AND state != ?1",
      t.name, t.id
    );
    let exists    = format!("SELECT 1 FROM {} WHERE {} = ?1", t.name, t.id);
    let id_str    = encode_uuid(entity.id);

    let applied = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(&update, rusqlite::params![state_str, id_str])?;
        if changed > 0 {
          return Ok(Applied::Changed);
        }
        let found = conn
          .query_row(&exists, rusqlite::params![id_str], |_| Ok(true))
          .optional()?
          .unwrap_or(false);
        Ok(if found { Applied::Unchanged } else { Applied::Missing })
      })
      .await?;

    tracing::debug!(%entity, %state, ?applied, "set lifecycle state");
    Ok(applied)
  }

  async fn update_profile(
    &self,
    entity: EntityRef,
    update: ProfileUpdate,
  ) -> Result<Option<Entity>> {
    if !entity.kind.has_lifecycle() {
      return Err(Error::NoLifecycle(entity.kind));
    }
    if update.is_empty() {
      return self.fetch(entity).await;
    }

    let t        = table(entity.kind);
    let student  = entity.kind == EntityKind::Student;
    let name_col = if student { "username" } else { "name" };
    let reset    = if student {
      ", password_reset_required = COALESCE(?4, password_reset_required)"
    } else {
      ""
    };
    let sql      = format!(
      "UPDATE {table} SET {name_col} = COALESCE(?1, {name_col}), email = COALESCE(?2, email){reset}
       WHERE {id} = ?3",
      table = t.name,
      id = t.id,
    );

    let mut params = vec![opt_text(update.name), opt_text(update.email), uuid(entity.id)];
    if student {
      params.push(
        update
          .password_reset_required
          .map_or(Value::Null, |flag| Value::Integer(i64::from(flag))),
      );
    }
    let changed = self.execute(sql, params).await?;

    if changed == 0 {
      return Ok(None);
    }
    self.fetch(entity).await
  }

  async fn delete(&self, entity: EntityRef) -> Result<Applied> {
    let t   = table(entity.kind);
    let sql = format!("DELETE FROM {} WHERE {} = ?1", t.name, t.id);

    let removed = self.execute(sql, vec![uuid(entity.id)]).await?;

    tracing::debug!(%entity, removed, "delete record");
    Ok(if removed > 0 { Applied::Changed } else { Applied::Missing })
  }
}

// ─── AuditRecorder impl ──────────────────────────────────────────────────────

impl AuditRecorder for SqliteStore {
  type Error = Error;

  async fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry> {
    let entry = AuditEntry {
      audit_id:    Uuid::new_v4(),
      actor_id:    entry.actor_id,
      action:      entry.action,
      target:      entry.target,
      details:     entry.details,
      recorded_at: Utc::now(),
    };

    let details_str = serde_json::to_string(&entry.details)?;

    self
      .execute(
        "INSERT INTO audit_log (
           audit_id, actor_id, action, target_kind, target_id, details, recorded_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
          .to_owned(),
        vec![
          uuid(entry.audit_id),
          text(entry.actor_id.clone()),
          text(entry.action.clone()),
          text(entry.target.kind.as_str()),
          uuid(entry.target.id),
          text(details_str),
          text(encode_dt(entry.recorded_at)),
        ],
      )
      .await?;

    Ok(entry)
  }
}
