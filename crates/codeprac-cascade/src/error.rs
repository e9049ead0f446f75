//! Error type for `codeprac-cascade`.
//!
//! [`Error::code`] maps every variant onto the caller-facing taxonomy
//! (`NOT_FOUND`, `VALIDATION_ERROR`, `PARTIAL_CASCADE_FAILURE`, ...).
//! Identity and audit failures never appear here; they are reported as
//! [`SyncWarning`](crate::SyncWarning)s instead.

use codeprac_core::entity::EntityRef;
use thiserror::Error;

use crate::execute::CascadeResult;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// The addressed record does not exist (or was already deleted). Raised
  /// before any mutation.
  #[error("{0} not found")]
  NotFound(EntityRef),

  #[error("validation error: {0}")]
  Validation(String),

  #[error(transparent)]
  Core(#[from] codeprac_core::Error),

  /// Enabling a node while one of its ancestors is disabled would leave an
  /// active record beneath a disabled one.
  #[error("cannot enable {target}: ancestor {ancestor} is disabled")]
  AncestorDisabled {
    target:   EntityRef,
    ancestor: EntityRef,
  },

  /// A local store write failed mid-plan. The boxed result carries the counts
  /// accumulated before the failure and the entity that failed.
  #[error("{}", .0.describe())]
  PartialCascade(Box<CascadeResult>),

  #[error("identity service rejected registration: {0}")]
  Auth(#[source] BoxError),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] BoxError),
}

impl Error {
  /// Stable machine-readable code for the error class.
  pub fn code(&self) -> &'static str {
    match self {
      Self::NotFound(_) => "NOT_FOUND",
      Self::Validation(_) | Self::Core(_) | Self::AncestorDisabled { .. } => {
        "VALIDATION_ERROR"
      }
      Self::PartialCascade(_) => "PARTIAL_CASCADE_FAILURE",
      Self::Auth(_) => "AUTH_ERROR",
      Self::Conflict(_) => "CONFLICT",
      Self::Store(_) => "STORE_ERROR",
    }
  }

  /// The partial result of a failed cascade, if this is one.
  pub fn partial(&self) -> Option<&CascadeResult> {
    match self {
      Self::PartialCascade(result) => Some(result),
      _ => None,
    }
  }
}

pub(crate) fn store_err<E>(e: E) -> Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  Error::Store(Box::new(e))
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
