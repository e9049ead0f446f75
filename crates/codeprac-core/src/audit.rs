//! Audit log entries and the `AuditRecorder` trait.
//!
//! The log is append-only. One entry is written per administrative
//! operation; a cascade writes a single entry for the whole invocation with
//! its per-kind counts in `details`.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityRef;

/// An entry as submitted to [`AuditRecorder::append`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditEntry {
  /// Whoever issued the operation (an external user id, or a service name).
  pub actor_id: String,
  /// e.g. `"delete_college_cascade"` or `"create_student"`.
  pub action:   String,
  pub target:   EntityRef,
  pub details:  serde_json::Value,
}

/// A persisted audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
  pub audit_id:    Uuid,
  pub actor_id:    String,
  pub action:      String,
  pub target:      EntityRef,
  pub details:     serde_json::Value,
  pub recorded_at: DateTime<Utc>,
}

/// Append-only sink for audit entries.
pub trait AuditRecorder: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn append(
    &self,
    entry: NewAuditEntry,
  ) -> impl Future<Output = Result<AuditEntry, Self::Error>> + Send + '_;
}
