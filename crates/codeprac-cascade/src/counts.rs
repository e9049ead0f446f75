//! Per-kind counters reported by a cascade.

use std::collections::BTreeMap;

use codeprac_core::entity::EntityKind;
use serde::{Serialize, Serializer, ser::SerializeMap};

/// How many records of each kind a cascade touched.
///
/// Only kinds with a non-zero count are present. Serialises as a map keyed
/// by collection name, e.g. `{"colleges":1,"students":2}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counts(BTreeMap<EntityKind, usize>);

impl Counts {
  pub fn new() -> Self { Self::default() }

  pub fn increment(&mut self, kind: EntityKind) {
    *self.0.entry(kind).or_insert(0) += 1;
  }

  pub fn get(&self, kind: EntityKind) -> usize {
    self.0.get(&kind).copied().unwrap_or(0)
  }

  pub fn total(&self) -> usize { self.0.values().sum() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = (EntityKind, usize)> + '_ {
    self.0.iter().map(|(k, n)| (*k, *n))
  }
}

impl FromIterator<(EntityKind, usize)> for Counts {
  fn from_iter<I: IntoIterator<Item = (EntityKind, usize)>>(iter: I) -> Self {
    Self(iter.into_iter().filter(|(_, n)| *n > 0).collect())
  }
}

impl Serialize for Counts {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.0.len()))?;
    for (kind, n) in &self.0 {
      map.serialize_entry(kind.plural(), n)?;
    }
    map.end()
  }
}
