//! The per-entity lifecycle state machine.
//!
//! ```text
//!   ACTIVE ⇄ DISABLED      (enable / disable, idempotent)
//!   ACTIVE | DISABLED → DELETED   (delete, irreversible)
//! ```
//!
//! Only hierarchy nodes (colleges, departments, batches, students) carry a
//! lifecycle state. `Deleted` is never persisted: a deleted record is simply
//! gone from the store.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── States ──────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
  #[default]
  Active,
  Disabled,
  Deleted,
}

impl LifecycleState {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Active => "active",
      Self::Disabled => "disabled",
      Self::Deleted => "deleted",
    }
  }

  pub fn is_active(self) -> bool { matches!(self, Self::Active) }

  /// Apply `op` to a record currently in this state.
  ///
  /// Re-issuing the transition a record is already in yields
  /// [`Transition::Unchanged`] rather than an error.
  pub fn apply(self, op: Operation) -> Result<Transition> {
    let target = op.target_state();
    match self {
      Self::Deleted => Err(Error::Terminal(self)),
      current if current == target => Ok(Transition::Unchanged),
      _ => Ok(Transition::Changed { from: self, to: target }),
    }
  }
}

impl fmt::Display for LifecycleState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for LifecycleState {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "active" => Ok(Self::Active),
      "disabled" => Ok(Self::Disabled),
      "deleted" => Ok(Self::Deleted),
      _ => Err(Error::UnknownState(s.to_owned())),
    }
  }
}

/// The result of applying an [`Operation`] to a [`LifecycleState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  Changed {
    from: LifecycleState,
    to:   LifecycleState,
  },
  /// The record is already in the target state.
  Unchanged,
}

// ─── Operations ──────────────────────────────────────────────────────────────

/// A lifecycle operation that cascades from a hierarchy node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
  Disable,
  Enable,
  Delete,
}

impl Operation {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Disable => "disable",
      Self::Enable => "enable",
      Self::Delete => "delete",
    }
  }

  pub fn target_state(self) -> LifecycleState {
    match self {
      Self::Disable => LifecycleState::Disabled,
      Self::Enable => LifecycleState::Active,
      Self::Delete => LifecycleState::Deleted,
    }
  }

  /// Whether the planner must order the closure leaf-first.
  pub fn is_destructive(self) -> bool { matches!(self, Self::Delete) }
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Operation {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "disable" => Ok(Self::Disable),
      "enable" => Ok(Self::Enable),
      "delete" => Ok(Self::Delete),
      _ => Err(Error::UnknownOperation(s.to_owned())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn disable_then_enable_changes_state() {
    assert_eq!(
      LifecycleState::Active.apply(Operation::Disable).unwrap(),
      Transition::Changed {
        from: LifecycleState::Active,
        to:   LifecycleState::Disabled,
      }
    );
    assert_eq!(
      LifecycleState::Disabled.apply(Operation::Enable).unwrap(),
      Transition::Changed {
        from: LifecycleState::Disabled,
        to:   LifecycleState::Active,
      }
    );
  }

  #[test]
  fn repeated_transition_is_a_noop() {
    assert_eq!(
      LifecycleState::Disabled.apply(Operation::Disable).unwrap(),
      Transition::Unchanged
    );
    assert_eq!(
      LifecycleState::Active.apply(Operation::Enable).unwrap(),
      Transition::Unchanged
    );
  }

  #[test]
  fn delete_is_reachable_from_both_live_states() {
    for state in [LifecycleState::Active, LifecycleState::Disabled] {
      assert!(matches!(
        state.apply(Operation::Delete).unwrap(),
        Transition::Changed { to: LifecycleState::Deleted, .. }
      ));
    }
  }

  #[test]
  fn nothing_leaves_deleted() {
    for op in [Operation::Disable, Operation::Enable, Operation::Delete] {
      assert!(matches!(
        LifecycleState::Deleted.apply(op),
        Err(Error::Terminal(LifecycleState::Deleted))
      ));
    }
  }

  #[test]
  fn operation_parses_case_insensitively() {
    assert_eq!("DISABLE".parse::<Operation>().unwrap(), Operation::Disable);
    assert_eq!(" delete ".parse::<Operation>().unwrap(), Operation::Delete);
    assert!(matches!(
      "archive".parse::<Operation>(),
      Err(Error::UnknownOperation(s)) if s == "archive"
    ));
  }
}
