//! Layered configuration: a TOML file overlaid by `CODEPRAC_*` variables.
//!
//! Nested keys use a double underscore, e.g.
//! `CODEPRAC_IDENTITY__BASE_URL` or `CODEPRAC_ENGINE__IDENTITY_TIMEOUT_MS`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use codeprac_cascade::EngineConfig;
use codeprac_identity::GatewayConfig;
use serde::Deserialize;

fn default_store_path() -> PathBuf { PathBuf::from("codeprac.db") }

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,

  /// Directory service. Without it every account is local-only.
  #[serde(default)]
  pub identity: Option<GatewayConfig>,

  #[serde(default)]
  pub engine: EngineConfig,
}

impl AdminConfig {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("CODEPRAC").separator("__"))
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise AdminConfig")
  }

  /// `store_path` with a leading `~` expanded.
  pub fn resolved_store_path(&self) -> PathBuf {
    let s = self.store_path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/")
      && let Ok(home) = std::env::var("HOME")
    {
      return PathBuf::from(home).join(rest);
    }
    self.store_path.clone()
  }
}
