//! The hierarchical lifecycle & cascade consistency engine.
//!
//! A cascade propagates `disable`, `enable` or `delete` from a hierarchy node
//! to every descendant and to the content scoped beneath it. The entity
//! store is authoritative and must accept every write; the identity gateway
//! and the audit log are mirrored best-effort and only ever produce
//! [`SyncWarning`]s.
//!
//! ```rust,ignore
//! let engine = Engine::new(store.clone(), gateway, store, EngineConfig::default());
//! let result = engine.delete_node(EntityKind::College, college_id, "admin-1").await?;
//! assert!(result.success);
//! ```
//!
//! Concurrent cascades over overlapping subtrees are not serialised against
//! each other; the only ordering guarantee is the plan order within a single
//! invocation.

pub mod config;
pub mod counts;
pub mod engine;
pub mod error;
pub mod execute;
pub mod plan;
pub mod provision;
mod sync;
mod validate;

pub use config::EngineConfig;
pub use counts::Counts;
pub use engine::Engine;
pub use error::{Error, Result};
pub use execute::{CascadeResult, Executor, StepFailure};
pub use plan::{Plan, plan};
pub use sync::{SyncWarning, WarningSource};

#[cfg(test)]
mod tests;
