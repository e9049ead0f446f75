//! Best-effort mirroring to the identity gateway and the audit log.
//!
//! Nothing in here returns an error. A failed or timed-out call is logged at
//! `warn` and handed back as a [`SyncWarning`] for the caller to report.

use std::{future::Future, time::Duration};

use codeprac_core::{
  audit::{AuditRecorder, NewAuditEntry},
  entity::{EntityRef, ExternalId},
  identity::IdentityGateway,
  lifecycle::Operation,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningSource {
  Identity,
  Audit,
}

/// A collaborator call that failed after the authoritative local write
/// already succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncWarning {
  pub entity:  EntityRef,
  pub source:  WarningSource,
  pub message: String,
}

/// Await `call`, giving up after `limit`.
pub(crate) async fn guarded<T, E, F>(
  entity: EntityRef,
  source: WarningSource,
  limit: Duration,
  call: F,
) -> Result<T, SyncWarning>
where
  E: std::fmt::Display,
  F: Future<Output = Result<T, E>>,
{
  let message = match tokio::time::timeout(limit, call).await {
    Ok(Ok(value)) => return Ok(value),
    Ok(Err(e)) => e.to_string(),
    Err(_) => format!("timed out after {} ms", limit.as_millis()),
  };
  tracing::warn!(%entity, ?source, %message, "sync failed");
  Err(SyncWarning { entity, source, message })
}

/// Mirror a lifecycle operation onto the identity record of `entity`.
///
/// Deleting a node only disables its directory account.
pub(crate) async fn mirror<G: IdentityGateway>(
  gateway: &G,
  entity: EntityRef,
  external: &ExternalId,
  operation: Operation,
  limit: Duration,
) -> Option<SyncWarning> {
  let outcome = match operation {
    Operation::Disable | Operation::Delete => {
      guarded(entity, WarningSource::Identity, limit, gateway.disable(external))
        .await
    }
    Operation::Enable => {
      guarded(entity, WarningSource::Identity, limit, gateway.enable(external))
        .await
    }
  };
  outcome.err()
}

/// Append `entry`, reporting a failure as a warning.
pub(crate) async fn record<A: AuditRecorder>(
  audit: &A,
  entry: NewAuditEntry,
) -> Option<SyncWarning> {
  let target = entry.target;
  match audit.append(entry).await {
    Ok(stored) => {
      tracing::debug!(audit_id = %stored.audit_id, action = %stored.action, "audit appended");
      None
    }
    Err(e) => {
      let message = e.to_string();
      tracing::warn!(entity = %target, %message, "audit append failed");
      Some(SyncWarning { entity: target, source: WarningSource::Audit, message })
    }
  }
}
