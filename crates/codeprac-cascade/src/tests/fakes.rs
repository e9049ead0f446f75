//! Scripted collaborators: a recording identity gateway, a store wrapper
//! that fails on demand, and an audit recorder that always fails.

use std::{
  collections::HashSet,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::Duration,
};

use codeprac_core::{
  audit::{AuditEntry, AuditRecorder, NewAuditEntry},
  entity::{
    Batch, College, Department, Entity, EntityRef, ExternalId, NewBatch,
    NewCollege, NewDepartment, NewNote, NewPerformance, NewQuestion,
    NewStudent, NewTopic, Note, PerformanceRecord, ProfileUpdate, Question,
    Student, Topic,
  },
  identity::{Credential, CredentialUpdate, IdentityGateway, Profile},
  lifecycle::LifecycleState,
  store::{Applied, EntityQuery, EntityStore},
};
use codeprac_store_sqlite::SqliteStore;

use crate::{Engine, EngineConfig};

// ─── Identity gateway ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
  Register(String),
  Update(ExternalId, CredentialUpdateSummary),
  Disable(ExternalId),
  Enable(ExternalId),
}

/// The non-secret parts of a [`CredentialUpdate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialUpdateSummary {
  pub email:            Option<String>,
  pub display_name:     Option<String>,
  pub password_changed: bool,
}

#[derive(Debug, thiserror::Error)]
#[error("directory unavailable: {0}")]
pub struct GatewayDown(pub String);

#[derive(Default)]
pub struct RecordingGateway {
  calls:               Mutex<Vec<Call>>,
  failing:             Mutex<HashSet<String>>,
  stalled:             Mutex<HashSet<String>>,
  reject_registration: AtomicBool,
  minted:              AtomicUsize,
}

impl RecordingGateway {
  /// Every later call touching `id` fails. An email address fails its
  /// registration.
  pub fn fail_on(&self, id: &str) {
    self.failing.lock().unwrap().insert(id.to_owned());
  }

  /// Every later call touching `id` hangs far longer than any test timeout.
  pub fn stall_on(&self, id: &str) {
    self.stalled.lock().unwrap().insert(id.to_owned());
  }

  pub fn reject_registrations(&self) {
    self.reject_registration.store(true, Ordering::SeqCst);
  }

  pub fn calls(&self) -> Vec<Call> { self.calls.lock().unwrap().clone() }

  pub fn disabled(&self) -> Vec<String> {
    self
      .calls()
      .into_iter()
      .filter_map(|c| match c {
        Call::Disable(id) => Some(id.0),
        _ => None,
      })
      .collect()
  }

  pub fn enabled(&self) -> Vec<String> {
    self
      .calls()
      .into_iter()
      .filter_map(|c| match c {
        Call::Enable(id) => Some(id.0),
        _ => None,
      })
      .collect()
  }

  pub fn registrations(&self) -> usize {
    self
      .calls()
      .iter()
      .filter(|c| matches!(c, Call::Register(_)))
      .count()
  }

  async fn answer(&self, call: Call, id: &ExternalId) -> Result<(), GatewayDown> {
    self.calls.lock().unwrap().push(call);
    let stalled = self.stalled.lock().unwrap().contains(id.as_str());
    if stalled {
      tokio::time::sleep(Duration::from_secs(30)).await;
    }
    if self.failing.lock().unwrap().contains(id.as_str()) {
      return Err(GatewayDown(id.0.clone()));
    }
    Ok(())
  }
}

impl IdentityGateway for RecordingGateway {
  type Error = GatewayDown;

  async fn register(
    &self,
    email: &str,
    _credential: &Credential,
    _profile: &Profile,
  ) -> Result<ExternalId, GatewayDown> {
    self.calls.lock().unwrap().push(Call::Register(email.to_owned()));
    if self.reject_registration.load(Ordering::SeqCst)
      || self.failing.lock().unwrap().contains(email)
    {
      return Err(GatewayDown(format!("registration refused for {email}")));
    }
    let n = self.minted.fetch_add(1, Ordering::SeqCst);
    Ok(ExternalId(format!("ext-{n}")))
  }

  async fn update_credentials(
    &self,
    id: &ExternalId,
    update: &CredentialUpdate,
  ) -> Result<(), GatewayDown> {
    let summary = CredentialUpdateSummary {
      email:            update.email.clone(),
      display_name:     update.display_name.clone(),
      password_changed: update.password.is_some(),
    };
    self.answer(Call::Update(id.clone(), summary), id).await
  }

  async fn disable(&self, id: &ExternalId) -> Result<(), GatewayDown> {
    self.answer(Call::Disable(id.clone()), id).await
  }

  async fn enable(&self, id: &ExternalId) -> Result<(), GatewayDown> {
    self.answer(Call::Enable(id.clone()), id).await
  }
}

// ─── Store with injected faults ──────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum FlakyError {
  #[error(transparent)]
  Store(#[from] codeprac_store_sqlite::Error),

  #[error("injected write failure on {0}")]
  Injected(EntityRef),
}

/// Delegates to a [`SqliteStore`], except that writes to the entity set with
/// [`FlakyStore::break_writes_to`] fail.
pub struct FlakyStore {
  pub inner: SqliteStore,
  broken:    Mutex<Option<EntityRef>>,
}

impl FlakyStore {
  pub async fn new() -> Self {
    Self {
      inner:  SqliteStore::open_in_memory().await.expect("in-memory store"),
      broken: Mutex::new(None),
    }
  }

  pub fn break_writes_to(&self, entity: EntityRef) {
    *self.broken.lock().unwrap() = Some(entity);
  }

  pub fn repair(&self) { *self.broken.lock().unwrap() = None; }

  fn check(&self, entity: EntityRef) -> Result<(), FlakyError> {
    match *self.broken.lock().unwrap() {
      Some(broken) if broken == entity => Err(FlakyError::Injected(entity)),
      _ => Ok(()),
    }
  }
}

impl EntityStore for FlakyStore {
  type Error = FlakyError;

  async fn create_college(&self, input: NewCollege) -> Result<College, FlakyError> {
    Ok(self.inner.create_college(input).await?)
  }

  async fn create_department(
    &self,
    input: NewDepartment,
  ) -> Result<Department, FlakyError> {
    Ok(self.inner.create_department(input).await?)
  }

  async fn create_batch(&self, input: NewBatch) -> Result<Batch, FlakyError> {
    Ok(self.inner.create_batch(input).await?)
  }

  async fn create_student(&self, input: NewStudent) -> Result<Student, FlakyError> {
    Ok(self.inner.create_student(input).await?)
  }

  async fn create_topic(&self, input: NewTopic) -> Result<Topic, FlakyError> {
    Ok(self.inner.create_topic(input).await?)
  }

  async fn create_question(&self, input: NewQuestion) -> Result<Question, FlakyError> {
    Ok(self.inner.create_question(input).await?)
  }

  async fn create_note(&self, input: NewNote) -> Result<Note, FlakyError> {
    Ok(self.inner.create_note(input).await?)
  }

  async fn record_performance(
    &self,
    input: NewPerformance,
  ) -> Result<PerformanceRecord, FlakyError> {
    Ok(self.inner.record_performance(input).await?)
  }

  async fn get(&self, entity: EntityRef) -> Result<Option<Entity>, FlakyError> {
    Ok(self.inner.get(entity).await?)
  }

  async fn query(&self, query: &EntityQuery) -> Result<Vec<Entity>, FlakyError> {
    Ok(self.inner.query(query).await?)
  }

  async fn set_state(
    &self,
    entity: EntityRef,
    state: LifecycleState,
  ) -> Result<Applied, FlakyError> {
    self.check(entity)?;
    Ok(self.inner.set_state(entity, state).await?)
  }

  async fn update_profile(
    &self,
    entity: EntityRef,
    update: ProfileUpdate,
  ) -> Result<Option<Entity>, FlakyError> {
    self.check(entity)?;
    Ok(self.inner.update_profile(entity, update).await?)
  }

  async fn delete(&self, entity: EntityRef) -> Result<Applied, FlakyError> {
    self.check(entity)?;
    Ok(self.inner.delete(entity).await?)
  }
}

impl AuditRecorder for FlakyStore {
  type Error = FlakyError;

  async fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry, FlakyError> {
    Ok(self.inner.append(entry).await?)
  }
}

// ─── Audit recorder that is always down ──────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("audit log is read-only")]
pub struct AuditDown;

pub struct BrokenAudit;

impl AuditRecorder for BrokenAudit {
  type Error = AuditDown;

  async fn append(&self, _entry: NewAuditEntry) -> Result<AuditEntry, AuditDown> {
    Err(AuditDown)
  }
}

// ─── Wiring ──────────────────────────────────────────────────────────────────

pub type TestEngine = Engine<FlakyStore, RecordingGateway, FlakyStore>;

pub struct Harness {
  pub engine:  TestEngine,
  pub store:   Arc<FlakyStore>,
  pub gateway: Arc<RecordingGateway>,
}

pub fn test_config() -> EngineConfig { EngineConfig { identity_timeout_ms: 50 } }

pub async fn harness() -> Harness {
  let store = Arc::new(FlakyStore::new().await);
  let gateway = Arc::new(RecordingGateway::default());
  let engine = Engine::new(
    Arc::clone(&store),
    Arc::clone(&gateway),
    Arc::clone(&store),
    test_config(),
  );
  Harness { engine, store, gateway }
}
