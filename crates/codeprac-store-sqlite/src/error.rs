//! Error type for `codeprac-store-sqlite`.

use codeprac_core::{
  entity::{EntityKind, EntityRef},
  lifecycle::LifecycleState,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] codeprac_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("decode error: {0}")]
  Decode(String),

  /// The parent named by a creation input does not exist.
  #[error("parent not found: {0}")]
  ParentNotFound(EntityRef),

  /// A creation input names two parents that do not belong together, e.g. a
  /// question whose batch is in another department than its topic.
  #[error("{child} does not belong under {parent}")]
  ScopeMismatch { child: EntityRef, parent: EntityRef },

  #[error("{0} records carry no lifecycle state")]
  NoLifecycle(EntityKind),

  #[error("the {0} state is never stored")]
  UnstorableState(LifecycleState),

  #[error("cannot filter {kind} records by {column}")]
  UnsupportedFilter { kind: EntityKind, column: &'static str },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
