//! The cascade executor: applies a [`Plan`] entry by entry.
//!
//! The store write for each entry is authoritative and must succeed; if it
//! fails the remaining entries are skipped and the result reports
//! `success = false` together with everything counted so far. Re-running the
//! same cascade afterwards is safe: entries already in the target state are
//! no-ops and entries already removed are skipped.

use std::time::Duration;

use codeprac_core::{
  audit::{AuditRecorder, NewAuditEntry},
  entity::{Entity, EntityRef},
  identity::IdentityGateway,
  lifecycle::{Operation, Transition},
  store::{Applied, EntityStore},
};
use serde::Serialize;
use serde_json::json;

use crate::{
  counts::Counts,
  plan::Plan,
  sync::{self, SyncWarning},
};

/// The local write that stopped a cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
  pub entity: EntityRef,
  pub reason: String,
}

/// Outcome of one cascade invocation.
#[derive(Debug, Clone, Serialize)]
pub struct CascadeResult {
  pub root:      EntityRef,
  pub operation: Operation,
  pub success:   bool,
  /// Records visited per kind, including those already in the target state.
  pub counts:    Counts,
  pub warnings:  Vec<SyncWarning>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error:     Option<StepFailure>,
}

impl CascadeResult {
  fn new(root: EntityRef, operation: Operation) -> Self {
    Self {
      root,
      operation,
      success: true,
      counts: Counts::new(),
      warnings: Vec::new(),
      error: None,
    }
  }

  /// One-line summary used as the error message of a partial cascade.
  pub fn describe(&self) -> String {
    match &self.error {
      Some(failure) => format!(
        "{} of {} stopped at {} after {} record(s): {}",
        self.operation,
        self.root,
        failure.entity,
        self.counts.total(),
        failure.reason
      ),
      None => format!(
        "{} of {} touched {} record(s)",
        self.operation,
        self.root,
        self.counts.total()
      ),
    }
  }

  /// The audit action name, e.g. `delete_college_cascade`.
  pub fn action(&self) -> String {
    format!("{}_{}_cascade", self.operation, self.root.kind)
  }
}

/// What happened to a single plan entry.
enum Step {
  Applied(Entity),
  Skipped,
}

pub struct Executor<'a, S, G, A> {
  store:   &'a S,
  gateway: &'a G,
  audit:   &'a A,
  timeout: Duration,
}

impl<'a, S, G, A> Executor<'a, S, G, A>
where
  S: EntityStore,
  G: IdentityGateway,
  A: AuditRecorder,
{
  pub fn new(store: &'a S, gateway: &'a G, audit: &'a A, timeout: Duration) -> Self {
    Self { store, gateway, audit, timeout }
  }

  /// Run `plan` on behalf of `actor`. Always appends exactly one audit entry.
  pub async fn execute(&self, plan: &Plan, actor: &str) -> CascadeResult {
    let mut result = CascadeResult::new(plan.root, plan.operation);

    for &entity in &plan.steps {
      match self.step(entity, plan.operation).await {
        Ok(Step::Applied(record)) => {
          if let Some(external) = record.external_ref()
            && let Some(warning) = sync::mirror(
              self.gateway,
              entity,
              external,
              plan.operation,
              self.timeout,
            )
            .await
          {
            result.warnings.push(warning);
          }
          result.counts.increment(entity.kind);
        }
        Ok(Step::Skipped) => {
          tracing::debug!(%entity, "vanished before it was reached; skipping");
        }
        Err(reason) => {
          tracing::error!(%entity, operation = %plan.operation, %reason, "cascade halted");
          result.success = false;
          result.error = Some(StepFailure { entity, reason });
          break;
        }
      }
    }

    let entry = NewAuditEntry {
      actor_id: actor.to_owned(),
      action:   result.action(),
      target:   plan.root,
      details:  json!({
        "root":      plan.root,
        "operation": plan.operation,
        "success":   result.success,
        "counts":    result.counts,
        "warnings":  result.warnings.len(),
        "error":     result.error.as_ref().map(|f| format!("{}: {}", f.entity, f.reason)),
      }),
    };
    if let Some(warning) = sync::record(self.audit, entry).await {
      result.warnings.push(warning);
    }

    result
  }

  /// Apply the local write for one entry. `Err` carries the failure reason.
  async fn step(&self, entity: EntityRef, operation: Operation) -> Result<Step, String> {
    let Some(record) = self.store.get(entity).await.map_err(|e| e.to_string())?
    else {
      return Ok(Step::Skipped);
    };

    if let Some(state) = record.state() {
      match state.apply(operation).map_err(|e| e.to_string())? {
        Transition::Unchanged => {
          tracing::trace!(%entity, %state, "already in target state");
        }
        Transition::Changed { from, to } => {
          tracing::trace!(%entity, %from, %to, "transition");
        }
      }
    }

    let applied = if operation.is_destructive() {
      self.store.delete(entity).await
    } else {
      self.store.set_state(entity, operation.target_state()).await
    }
    .map_err(|e| e.to_string())?;

    Ok(match applied {
      Applied::Missing => Step::Skipped,
      Applied::Changed | Applied::Unchanged => Step::Applied(record),
    })
  }
}
