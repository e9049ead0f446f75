//! Engine configuration.

use std::time::Duration;

use serde::Deserialize;

fn default_identity_timeout_ms() -> u64 { 5_000 }

/// Runtime settings for [`Engine`](crate::Engine), deserialised from the
/// `[engine]` table of the admin config.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
  /// Upper bound on a single identity gateway call. A call that takes longer
  /// is abandoned and reported as a sync warning.
  #[serde(default = "default_identity_timeout_ms")]
  pub identity_timeout_ms: u64,
}

impl EngineConfig {
  pub fn identity_timeout(&self) -> Duration {
    Duration::from_millis(self.identity_timeout_ms)
  }
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self { identity_timeout_ms: default_identity_timeout_ms() }
  }
}
