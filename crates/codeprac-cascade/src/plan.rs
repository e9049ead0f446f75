//! The cascade planner: computes the ordered closure of a lifecycle
//! operation.
//!
//! The hierarchy is walked level by level from the root, so the closure is
//! naturally top-down: every node appears after all of its ancestors. That
//! order is kept for `disable` and `enable`; if execution stops part-way, no
//! descendant is left active beneath a disabled ancestor.
//!
//! For `delete` the closure also gathers the content scoped beneath the
//! visited nodes and is re-sorted leaf-first by [`EntityKind::removal_rank`]:
//!
//! ```text
//! performance → questions → notes → topics → students → batches → departments → colleges
//! ```
//!
//! so an interrupted delete never leaves a surviving record pointing at a
//! removed parent.

use std::collections::HashSet;

use codeprac_core::{
  entity::{Entity, EntityKind, EntityRef},
  lifecycle::Operation,
  store::{EntityQuery, EntityStore},
};
use serde::Serialize;

use crate::{
  Error, Result,
  error::store_err,
};

/// The ordered list of records a cascade will visit.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
  pub root:      EntityRef,
  pub operation: Operation,
  pub steps:     Vec<EntityRef>,
}

impl Plan {
  pub fn len(&self) -> usize { self.steps.len() }

  pub fn is_empty(&self) -> bool { self.steps.is_empty() }

  pub fn position(&self, entity: EntityRef) -> Option<usize> {
    self.steps.iter().position(|s| *s == entity)
  }
}

/// The kind one level below `kind` in the hierarchy.
fn child_kind(kind: EntityKind) -> Option<EntityKind> {
  match kind {
    EntityKind::College => Some(EntityKind::Department),
    EntityKind::Department => Some(EntityKind::Batch),
    EntityKind::Batch => Some(EntityKind::Student),
    _ => None,
  }
}

/// Accumulates steps while dropping duplicates.
#[derive(Default)]
struct Closure {
  steps: Vec<EntityRef>,
  seen:  HashSet<EntityRef>,
}

impl Closure {
  fn push(&mut self, entity: EntityRef) -> bool {
    let fresh = self.seen.insert(entity);
    if fresh {
      self.steps.push(entity);
    }
    fresh
  }

  fn extend(&mut self, entities: impl IntoIterator<Item = Entity>) {
    for e in entities {
      self.push(e.reference());
    }
  }

  fn of_kind(&self, kind: EntityKind) -> Vec<EntityRef> {
    self.steps.iter().copied().filter(|s| s.kind == kind).collect()
  }
}

/// Records of `kind` directly or transitively beneath `parent`.
async fn children<S: EntityStore>(
  store: &S,
  kind: EntityKind,
  parent: EntityRef,
) -> Result<Vec<Entity>> {
  match EntityQuery::new(kind).under(parent) {
    Some(query) => store.query(&query).await.map_err(store_err),
    None => Ok(Vec::new()),
  }
}

/// Compute the closure of `operation` applied at `root`.
///
/// Fails with [`Error::Validation`] if `root` is not a hierarchy node and
/// with [`Error::NotFound`] if it does not exist. Records already in the
/// target state are still included.
pub async fn plan<S: EntityStore>(
  store: &S,
  root: EntityRef,
  operation: Operation,
) -> Result<Plan> {
  if !root.kind.has_lifecycle() {
    return Err(Error::Validation(format!(
      "cascades start at a college, department, batch or student, not a {}",
      root.kind
    )));
  }

  store
    .get(root)
    .await
    .map_err(store_err)?
    .ok_or(Error::NotFound(root))?;

  let mut closure = Closure::default();
  closure.push(root);

  // ── Hierarchy, level by level ─────────────────────────────────────────────
  let mut frontier = vec![root];
  while let Some(kind) = frontier.first().and_then(|n| child_kind(n.kind)) {
    let mut next = Vec::new();
    for node in &frontier {
      for child in children(store, kind, *node).await? {
        let child = child.reference();
        if closure.push(child) {
          next.push(child);
        }
      }
    }
    frontier = next;
  }

  if operation.is_destructive() {
    collect_content(store, root, &mut closure).await?;
    closure.steps.sort_by_key(|s| s.kind.removal_rank());
  }

  tracing::debug!(
    %root,
    %operation,
    steps = closure.steps.len(),
    "planned cascade"
  );

  Ok(Plan { root, operation, steps: closure.steps })
}

/// Topics, notes, questions and performance records beneath the hierarchy
/// nodes already in `closure`.
async fn collect_content<S: EntityStore>(
  store: &S,
  root: EntityRef,
  closure: &mut Closure,
) -> Result<()> {
  // Topics and notes hang off departments.
  for department in closure.of_kind(EntityKind::Department) {
    closure.extend(children(store, EntityKind::Topic, department).await?);
    closure.extend(children(store, EntityKind::Note, department).await?);
  }

  // Questions carry denormalised college/department/batch ids, so one query
  // scoped at the root covers every visited node.
  if root.kind != EntityKind::Student {
    closure.extend(children(store, EntityKind::Question, root).await?);
  }

  // Anything still referencing a collected topic goes with it.
  for topic in closure.of_kind(EntityKind::Topic) {
    closure.extend(children(store, EntityKind::Question, topic).await?);
    closure.extend(children(store, EntityKind::Note, topic).await?);
  }

  // Performance records go with their student, and with their question.
  for student in closure.of_kind(EntityKind::Student) {
    closure.extend(children(store, EntityKind::Performance, student).await?);
  }
  for question in closure.of_kind(EntityKind::Question) {
    closure.extend(children(store, EntityKind::Performance, question).await?);
  }

  Ok(())
}
