//! Creating hierarchy nodes and content, and editing profiles.
//!
//! Account-bearing nodes (colleges, departments, batches, students) are
//! registered with the identity gateway *before* the local record is
//! written. If registration fails nothing is stored; if the local write then
//! fails, the freshly-registered account is disabled again on a best-effort
//! basis.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use codeprac_core::{
  audit::{AuditRecorder, NewAuditEntry},
  entity::{
    Batch, College, Department, Entity, EntityKind, EntityRef, ExternalId,
    NewBatch, NewCollege, NewDepartment, NewNote, NewPerformance, NewQuestion,
    NewStudent, NewTopic, Note, Outcome, PerformanceRecord, ProfileUpdate,
    Question, Student, Topic,
  },
  identity::{Credential, CredentialUpdate, IdentityGateway, Profile, Role},
  lifecycle::LifecycleState,
  store::{EntityQuery, EntityStore},
};
use rand_core::{OsRng, RngCore};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
  Engine, Error, Result,
  error::store_err,
  sync::{self, SyncWarning, WarningSource},
  validate,
};

const TEMPORARY_PASSWORD_BYTES: usize = 12;

// ─── Requests ────────────────────────────────────────────────────────────────

/// Login details for an account-bearing node.
#[derive(Debug, Clone)]
pub struct Account {
  pub email:    String,
  pub password: Credential,
}

#[derive(Debug, Clone)]
pub struct CollegeRequest {
  pub name:    String,
  pub account: Account,
}

#[derive(Debug, Clone)]
pub struct DepartmentRequest {
  pub college_id: Uuid,
  pub name:       String,
  pub account:    Account,
}

#[derive(Debug, Clone)]
pub struct BatchRequest {
  pub department_id: Uuid,
  pub name:          String,
  pub account:       Account,
}

/// A student account. Without a password a temporary one is generated and
/// the student must reset it at first login.
#[derive(Debug, Clone)]
pub struct StudentRequest {
  pub batch_id: Uuid,
  pub username: String,
  pub email:    String,
  pub password: Option<Credential>,
}

/// Profile edits. Parent linkage is not editable.
#[derive(Debug, Clone, Default)]
pub struct ProfileChange {
  /// Display name, or username for students.
  pub name:     Option<String>,
  pub email:    Option<String>,
  /// Only ever sent to the identity gateway.
  pub password: Option<Credential>,
}

// ─── Responses ───────────────────────────────────────────────────────────────

/// A freshly created record plus anything that failed to mirror.
#[derive(Debug, Clone, Serialize)]
pub struct Provisioned<T> {
  pub record:   T,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub warnings: Vec<SyncWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedStudent {
  pub student:            Student,
  /// Set when the caller supplied no password. Shown once, never stored.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub temporary_password: Option<Credential>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub warnings:           Vec<SyncWarning>,
}

/// A bulk-upload row that was not created.
#[derive(Debug, Clone, Serialize)]
pub struct RowFailure {
  /// Zero-based position in the uploaded list.
  pub row:      usize,
  pub username: String,
  pub email:    String,
  pub code:     &'static str,
  pub message:  String,
}

/// Outcome of [`Engine::create_students`]. Rows are independent: a failed
/// row never undoes or blocks another.
#[derive(Debug, Clone, Serialize)]
pub struct BulkProvisioned {
  pub created: Vec<ProvisionedStudent>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub failed:  Vec<RowFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdated {
  pub entity:   Entity,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub warnings: Vec<SyncWarning>,
}

fn temporary_password() -> Credential {
  let mut bytes = [0u8; TEMPORARY_PASSWORD_BYTES];
  OsRng.fill_bytes(&mut bytes);
  Credential::new(URL_SAFE_NO_PAD.encode(bytes))
}

// ─── Operations ──────────────────────────────────────────────────────────────

impl<S, G, A> Engine<S, G, A>
where
  S: EntityStore,
  G: IdentityGateway,
  A: AuditRecorder,
{
  pub async fn create_college(
    &self,
    request: CollegeRequest,
    actor: &str,
  ) -> Result<Provisioned<College>> {
    let name = validate::name("college name", &request.name)?;
    let (email, password) = checked_account(&request.account)?;

    let profile = Profile {
      display_name:  name.clone(),
      role:          Role::College,
      college_id:    None,
      department_id: None,
      batch_id:      None,
    };
    let external = self.register(&email, &password, &profile).await?;

    let created = self
      .store
      .create_college(NewCollege {
        name,
        email: Some(email),
        external_ref: Some(external.clone()),
      })
      .await;
    let college = self.settle(created, &external).await?;

    let mut warnings = Vec::new();
    self
      .audit_created(
        actor,
        EntityRef::college(college.college_id),
        json!({ "name": college.name, "email": college.email }),
        &mut warnings,
      )
      .await;

    Ok(Provisioned { record: college, warnings })
  }

  pub async fn create_department(
    &self,
    request: DepartmentRequest,
    actor: &str,
  ) -> Result<Provisioned<Department>> {
    let name = validate::name("department name", &request.name)?;
    let (email, password) = checked_account(&request.account)?;
    self.require(EntityRef::college(request.college_id)).await?;

    let profile = Profile {
      display_name:  name.clone(),
      role:          Role::Department,
      college_id:    Some(request.college_id),
      department_id: None,
      batch_id:      None,
    };
    let external = self.register(&email, &password, &profile).await?;

    let created = self
      .store
      .create_department(NewDepartment {
        college_id: request.college_id,
        name,
        email: Some(email),
        external_ref: Some(external.clone()),
      })
      .await;
    let department = self.settle(created, &external).await?;
    let reference = EntityRef::department(department.department_id);

    let mut warnings = Vec::new();
    self
      .follow_parent_state(reference, department.state, &external, &mut warnings)
      .await;
    self
      .audit_created(
        actor,
        reference,
        json!({ "name": department.name, "college_id": department.college_id }),
        &mut warnings,
      )
      .await;

    Ok(Provisioned { record: department, warnings })
  }

  pub async fn create_batch(
    &self,
    request: BatchRequest,
    actor: &str,
  ) -> Result<Provisioned<Batch>> {
    let name = validate::name("batch name", &request.name)?;
    let (email, password) = checked_account(&request.account)?;
    let Entity::Department(parent) =
      self.require(EntityRef::department(request.department_id)).await?
    else {
      return Err(Error::NotFound(EntityRef::department(request.department_id)));
    };

    let profile = Profile {
      display_name:  name.clone(),
      role:          Role::Batch,
      college_id:    Some(parent.college_id),
      department_id: Some(parent.department_id),
      batch_id:      None,
    };
    let external = self.register(&email, &password, &profile).await?;

    let created = self
      .store
      .create_batch(NewBatch {
        department_id: request.department_id,
        name,
        email: Some(email),
        external_ref: Some(external.clone()),
      })
      .await;
    let batch = self.settle(created, &external).await?;
    let reference = EntityRef::batch(batch.batch_id);

    let mut warnings = Vec::new();
    self
      .follow_parent_state(reference, batch.state, &external, &mut warnings)
      .await;
    self
      .audit_created(
        actor,
        reference,
        json!({ "name": batch.name, "department_id": batch.department_id }),
        &mut warnings,
      )
      .await;

    Ok(Provisioned { record: batch, warnings })
  }

  pub async fn create_student(
    &self,
    request: StudentRequest,
    actor: &str,
  ) -> Result<ProvisionedStudent> {
    let username = validate::username(&request.username)?;
    let email = validate::email(&request.email)?;
    if let Some(password) = &request.password {
      validate::password(password)?;
    }
    let Entity::Batch(parent) =
      self.require(EntityRef::batch(request.batch_id)).await?
    else {
      return Err(Error::NotFound(EntityRef::batch(request.batch_id)));
    };
    self
      .ensure_unique_student(Some(&username), Some(&email), None)
      .await?;

    let (password, temporary_password) = match request.password {
      Some(password) => (password, None),
      None => {
        let generated = temporary_password();
        (generated.clone(), Some(generated))
      }
    };

    let profile = Profile {
      display_name:  username.clone(),
      role:          Role::Student,
      college_id:    Some(parent.college_id),
      department_id: Some(parent.department_id),
      batch_id:      Some(parent.batch_id),
    };
    let external = self.register(&email, &password, &profile).await?;

    let created = self
      .store
      .create_student(NewStudent {
        batch_id: request.batch_id,
        username,
        email,
        external_ref: Some(external.clone()),
        password_reset_required: temporary_password.is_some(),
      })
      .await;
    let student = self.settle(created, &external).await?;
    let reference = EntityRef::student(student.student_id);

    let mut warnings = Vec::new();
    self
      .follow_parent_state(reference, student.state, &external, &mut warnings)
      .await;
    self
      .audit_created(
        actor,
        reference,
        json!({
          "username": student.username,
          "email": student.email,
          "batch_id": student.batch_id,
          "password_reset_required": student.password_reset_required,
        }),
        &mut warnings,
      )
      .await;

    Ok(ProvisionedStudent { student, temporary_password, warnings })
  }

  /// Create every row of `rows` in batch `batch_id`, each exactly as
  /// [`create_student`](Self::create_student) would, so each created student
  /// gets its own `create_student` audit entry. The rows' own `batch_id` is
  /// ignored. A row that fails validation, clashes with an existing (or
  /// earlier) student or is refused by the directory is reported in
  /// [`BulkProvisioned::failed`] and the remaining rows still run.
  pub async fn create_students(
    &self,
    batch_id: Uuid,
    rows: Vec<StudentRequest>,
    actor: &str,
  ) -> Result<BulkProvisioned> {
    if rows.is_empty() {
      return Err(Error::Validation("no students provided".into()));
    }
    self.require(EntityRef::batch(batch_id)).await?;

    let total = rows.len();
    let mut created = Vec::new();
    let mut failed = Vec::new();
    for (row, request) in rows.into_iter().enumerate() {
      let (username, email) = (request.username.clone(), request.email.clone());
      match self
        .create_student(StudentRequest { batch_id, ..request }, actor)
        .await
      {
        Ok(student) => created.push(student),
        Err(e) => {
          tracing::warn!(row, %username, code = e.code(), error = %e, "student row skipped");
          failed.push(RowFailure {
            row,
            username,
            email,
            code: e.code(),
            message: e.to_string(),
          });
        }
      }
    }

    tracing::info!(
      %batch_id,
      total,
      created = created.len(),
      failed = failed.len(),
      "bulk student upload finished"
    );
    Ok(BulkProvisioned { created, failed })
  }

  pub async fn create_topic(
    &self,
    department_id: Uuid,
    name: &str,
    actor: &str,
  ) -> Result<Provisioned<Topic>> {
    let name = validate::name("topic name", name)?;
    self.require(EntityRef::department(department_id)).await?;

    let topic = self
      .store
      .create_topic(NewTopic { department_id, name })
      .await
      .map_err(store_err)?;

    let mut warnings = Vec::new();
    self
      .audit_created(
        actor,
        EntityRef::topic(topic.topic_id),
        json!({ "name": topic.name, "department_id": department_id }),
        &mut warnings,
      )
      .await;
    Ok(Provisioned { record: topic, warnings })
  }

  /// A question under `topic_id`, optionally restricted to one batch of the
  /// topic's department.
  pub async fn create_question(
    &self,
    topic_id: Uuid,
    batch_id: Option<Uuid>,
    title: &str,
    actor: &str,
  ) -> Result<Provisioned<Question>> {
    let title = validate::name("question title", title)?;
    let Entity::Topic(topic) = self.require(EntityRef::topic(topic_id)).await?
    else {
      return Err(Error::NotFound(EntityRef::topic(topic_id)));
    };
    if let Some(batch_id) = batch_id
      && let Entity::Batch(batch) = self.require(EntityRef::batch(batch_id)).await?
      && batch.department_id != topic.department_id
    {
      return Err(Error::Validation(format!(
        "batch {batch_id} does not belong to the topic's department"
      )));
    }

    let question = self
      .store
      .create_question(NewQuestion { topic_id, batch_id, title })
      .await
      .map_err(store_err)?;

    let mut warnings = Vec::new();
    self
      .audit_created(
        actor,
        EntityRef::question(question.question_id),
        json!({ "title": question.title, "topic_id": topic_id, "batch_id": batch_id }),
        &mut warnings,
      )
      .await;
    Ok(Provisioned { record: question, warnings })
  }

  pub async fn create_note(
    &self,
    topic_id: Uuid,
    title: &str,
    actor: &str,
  ) -> Result<Provisioned<Note>> {
    let title = validate::name("note title", title)?;
    self.require(EntityRef::topic(topic_id)).await?;

    let note = self
      .store
      .create_note(NewNote { topic_id, title })
      .await
      .map_err(store_err)?;

    let mut warnings = Vec::new();
    self
      .audit_created(
        actor,
        EntityRef::note(note.note_id),
        json!({ "title": note.title, "topic_id": topic_id }),
        &mut warnings,
      )
      .await;
    Ok(Provisioned { record: note, warnings })
  }

  pub async fn record_performance(
    &self,
    student_id: Uuid,
    question_id: Uuid,
    outcome: Outcome,
    actor: &str,
  ) -> Result<Provisioned<PerformanceRecord>> {
    let Entity::Student(student) =
      self.require(EntityRef::student(student_id)).await?
    else {
      return Err(Error::NotFound(EntityRef::student(student_id)));
    };
    let Entity::Question(question) =
      self.require(EntityRef::question(question_id)).await?
    else {
      return Err(Error::NotFound(EntityRef::question(question_id)));
    };
    if question.college_id != student.college_id {
      return Err(Error::Validation(format!(
        "question {question_id} belongs to another college"
      )));
    }

    let record = self
      .store
      .record_performance(NewPerformance { student_id, question_id, outcome })
      .await
      .map_err(store_err)?;

    let mut warnings = Vec::new();
    self
      .audit_created(
        actor,
        EntityRef::performance(record.performance_id),
        json!({
          "student_id": student_id,
          "question_id": question_id,
          "outcome": outcome,
        }),
        &mut warnings,
      )
      .await;
    Ok(Provisioned { record, warnings })
  }

  /// Edit the profile of a hierarchy node. The local record is updated
  /// first; the identity mirror is best effort.
  pub async fn update_profile(
    &self,
    target: EntityRef,
    change: ProfileChange,
    actor: &str,
  ) -> Result<ProfileUpdated> {
    if !target.kind.has_lifecycle() {
      return Err(Error::Validation(format!("{} records have no profile", target.kind)));
    }

    let name = match &change.name {
      Some(name) if target.kind == EntityKind::Student => Some(validate::username(name)?),
      Some(name) => Some(validate::name("name", name)?),
      None => None,
    };
    let email = change.email.as_deref().map(validate::email).transpose()?;
    if let Some(password) = &change.password {
      validate::password(password)?;
    }

    self.require(target).await?;
    if target.kind == EntityKind::Student {
      self
        .ensure_unique_student(name.as_deref(), email.as_deref(), Some(target.id))
        .await?;
    }

    // A chosen password replaces any temporary one.
    let chose_password = target.kind == EntityKind::Student && change.password.is_some();
    let password_reset_required = chose_password.then_some(false);
    let entity = self
      .store
      .update_profile(target, ProfileUpdate {
        name: name.clone(),
        email: email.clone(),
        password_reset_required,
      })
      .await
      .map_err(store_err)?
      .ok_or(Error::NotFound(target))?;

    let mut warnings = Vec::new();
    let update = CredentialUpdate {
      email,
      display_name: name,
      password: change.password,
    };
    if !update.is_empty()
      && let Some(external) = entity.external_ref()
      && let Err(warning) = sync::guarded(
        target,
        WarningSource::Identity,
        self.config.identity_timeout(),
        self.gateway.update_credentials(external, &update),
      )
      .await
    {
      warnings.push(warning);
    }

    let entry = NewAuditEntry {
      actor_id: actor.to_owned(),
      action:   format!("update_{}_profile", target.kind),
      target,
      details:  json!({
        "name": update.display_name,
        "email": update.email,
        "password_changed": update.password.is_some(),
      }),
    };
    warnings.extend(sync::record(self.audit.as_ref(), entry).await);

    tracing::info!(%target, %actor, "profile updated");
    Ok(ProfileUpdated { entity, warnings })
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  /// Fetch `entity` or fail with [`Error::NotFound`].
  async fn require(&self, entity: EntityRef) -> Result<Entity> {
    self
      .store
      .get(entity)
      .await
      .map_err(store_err)?
      .ok_or(Error::NotFound(entity))
  }

  async fn register(
    &self,
    email: &str,
    password: &Credential,
    profile: &Profile,
  ) -> Result<ExternalId> {
    let limit = self.config.identity_timeout();
    match tokio::time::timeout(limit, self.gateway.register(email, password, profile)).await
    {
      Ok(Ok(id)) => {
        tracing::debug!(%email, external = %id, "registered identity");
        Ok(id)
      }
      Ok(Err(e)) => Err(Error::Auth(Box::new(e))),
      Err(elapsed) => Err(Error::Auth(Box::new(elapsed))),
    }
  }

  /// Resolve a store write that follows a successful registration. On
  /// failure the orphaned account is disabled before the error is returned.
  async fn settle<T, E>(
    &self,
    created: std::result::Result<T, E>,
    external: &ExternalId,
  ) -> Result<T>
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    match created {
      Ok(record) => Ok(record),
      Err(e) => {
        tracing::warn!(external = %external, error = %e, "store write failed after registration");
        let limit = self.config.identity_timeout();
        if !matches!(
          tokio::time::timeout(limit, self.gateway.disable(external)).await,
          Ok(Ok(()))
        ) {
          tracing::warn!(external = %external, "could not disable orphaned identity");
        }
        Err(store_err(e))
      }
    }
  }

  /// A node created beneath a disabled parent starts disabled; so must its
  /// directory account.
  async fn follow_parent_state(
    &self,
    entity: EntityRef,
    state: LifecycleState,
    external: &ExternalId,
    warnings: &mut Vec<SyncWarning>,
  ) {
    if state != LifecycleState::Disabled {
      return;
    }
    if let Err(warning) = sync::guarded(
      entity,
      WarningSource::Identity,
      self.config.identity_timeout(),
      self.gateway.disable(external),
    )
    .await
    {
      warnings.push(warning);
    }
  }

  /// Fail with [`Error::Conflict`] if another student already holds
  /// `username` or `email`. `except` is the student being edited, if any.
  async fn ensure_unique_student(
    &self,
    username: Option<&str>,
    email: Option<&str>,
    except: Option<Uuid>,
  ) -> Result<()> {
    let taken = |found: Vec<Entity>| found.iter().any(|e| Some(e.id()) != except);

    if let Some(username) = username {
      let query = EntityQuery::new(EntityKind::Student).username(username);
      if taken(self.store.query(&query).await.map_err(store_err)?) {
        return Err(Error::Conflict(format!("username {username:?} is already taken")));
      }
    }
    if let Some(email) = email {
      let query = EntityQuery::new(EntityKind::Student).email(email);
      if taken(self.store.query(&query).await.map_err(store_err)?) {
        return Err(Error::Conflict(format!("email {email:?} is already registered")));
      }
    }
    Ok(())
  }

  async fn audit_created(
    &self,
    actor: &str,
    target: EntityRef,
    details: serde_json::Value,
    warnings: &mut Vec<SyncWarning>,
  ) {
    let entry = NewAuditEntry {
      actor_id: actor.to_owned(),
      action: format!("create_{}", target.kind),
      target,
      details,
    };
    warnings.extend(sync::record(self.audit.as_ref(), entry).await);
    tracing::info!(%target, %actor, "created");
  }
}

fn checked_account(account: &Account) -> Result<(String, Credential)> {
  let email = validate::email(&account.email)?;
  validate::password(&account.password)?;
  Ok((email, account.password.clone()))
}
