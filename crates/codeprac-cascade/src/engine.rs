//! The public entry points: `disable_node`, `enable_node`, `delete_node`.

use std::sync::Arc;

use codeprac_core::{
  audit::AuditRecorder,
  entity::{EntityKind, EntityRef},
  identity::IdentityGateway,
  lifecycle::{LifecycleState, Operation},
  store::EntityStore,
};
use uuid::Uuid;

use crate::{
  Error, Result,
  config::EngineConfig,
  error::store_err,
  execute::{CascadeResult, Executor},
  plan::plan,
};

/// Plans and executes cascades against an injected store, identity gateway
/// and audit recorder.
///
/// The store and the recorder are frequently the same object; pass the same
/// `Arc` twice.
pub struct Engine<S, G, A> {
  pub(crate) store:   Arc<S>,
  pub(crate) gateway: Arc<G>,
  pub(crate) audit:   Arc<A>,
  pub(crate) config:  EngineConfig,
}

impl<S, G, A> Clone for Engine<S, G, A> {
  fn clone(&self) -> Self {
    Self {
      store:   Arc::clone(&self.store),
      gateway: Arc::clone(&self.gateway),
      audit:   Arc::clone(&self.audit),
      config:  self.config.clone(),
    }
  }
}

impl<S, G, A> Engine<S, G, A>
where
  S: EntityStore,
  G: IdentityGateway,
  A: AuditRecorder,
{
  pub fn new(
    store: Arc<S>,
    gateway: Arc<G>,
    audit: Arc<A>,
    config: EngineConfig,
  ) -> Self {
    Self { store, gateway, audit, config }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn gateway(&self) -> &G { &self.gateway }

  pub fn config(&self) -> &EngineConfig { &self.config }

  pub async fn disable_node(
    &self,
    kind: EntityKind,
    id: Uuid,
    actor: &str,
  ) -> Result<CascadeResult> {
    self.cascade(EntityRef::new(kind, id), Operation::Disable, actor).await
  }

  /// Re-activate a node and everything beneath it. Fails with
  /// [`Error::AncestorDisabled`] if any ancestor is still disabled.
  pub async fn enable_node(
    &self,
    kind: EntityKind,
    id: Uuid,
    actor: &str,
  ) -> Result<CascadeResult> {
    self.cascade(EntityRef::new(kind, id), Operation::Enable, actor).await
  }

  pub async fn delete_node(
    &self,
    kind: EntityKind,
    id: Uuid,
    actor: &str,
  ) -> Result<CascadeResult> {
    self.cascade(EntityRef::new(kind, id), Operation::Delete, actor).await
  }

  /// String-typed entry point. Unknown kinds and operations are validation
  /// errors.
  pub async fn run(
    &self,
    kind: &str,
    id: Uuid,
    operation: &str,
    actor: &str,
  ) -> Result<CascadeResult> {
    let kind: EntityKind =
      kind.parse().map_err(|e: codeprac_core::Error| Error::Validation(e.to_string()))?;
    let operation: Operation = operation
      .parse()
      .map_err(|e: codeprac_core::Error| Error::Validation(e.to_string()))?;
    self.cascade(EntityRef::new(kind, id), operation, actor).await
  }

  async fn cascade(
    &self,
    root: EntityRef,
    operation: Operation,
    actor: &str,
  ) -> Result<CascadeResult> {
    let plan = plan(self.store.as_ref(), root, operation).await?;

    if operation == Operation::Enable
      && let Some(ancestor) = self.disabled_ancestor(root).await?
    {
      return Err(Error::AncestorDisabled { target: root, ancestor });
    }

    tracing::info!(%root, %operation, %actor, steps = plan.len(), "cascade started");

    let executor = Executor::new(
      self.store.as_ref(),
      self.gateway.as_ref(),
      self.audit.as_ref(),
      self.config.identity_timeout(),
    );
    let result = executor.execute(&plan, actor).await;

    if !result.success {
      return Err(Error::PartialCascade(Box::new(result)));
    }

    tracing::info!(
      %root,
      %operation,
      total = result.counts.total(),
      warnings = result.warnings.len(),
      "cascade finished"
    );
    Ok(result)
  }

  /// The nearest disabled ancestor of `node`, if any.
  async fn disabled_ancestor(&self, node: EntityRef) -> Result<Option<EntityRef>> {
    let mut cursor = self.store.get(node).await.map_err(store_err)?;
    while let Some(parent) = cursor.as_ref().and_then(|e| e.parent()) {
      let record = self.store.get(parent).await.map_err(store_err)?;
      if let Some(state) = record.as_ref().and_then(|e| e.state())
        && state == LifecycleState::Disabled
      {
        return Ok(Some(parent));
      }
      cursor = record;
    }
    Ok(None)
  }
}
