//! Error types for `codeprac-core`.

use thiserror::Error;

use crate::{entity::EntityKind, lifecycle::LifecycleState};

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown entity kind: {0:?}")]
  UnknownKind(String),

  #[error("unknown operation: {0:?}")]
  UnknownOperation(String),

  #[error("unknown lifecycle state: {0:?}")]
  UnknownState(String),

  #[error("unknown outcome: {0:?}")]
  UnknownOutcome(String),

  #[error("{0} records carry no lifecycle state")]
  NoLifecycle(EntityKind),

  #[error("no transition leaves the {0} state")]
  Terminal(LifecycleState),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
