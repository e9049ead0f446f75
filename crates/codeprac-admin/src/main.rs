//! `codeprac-admin`: administer the institution hierarchy from the shell.
//!
//! Reads `codeprac.toml` (or the path given with `--config`), opens the
//! SQLite store and runs one command. Results are printed as JSON on stdout;
//! logs go to stderr.
//!
//! ```text
//! codeprac-admin create college --name Northfield --email admin@northfield.edu --password ...
//! codeprac-admin create students --batch 3d9a... --file roster.json
//! codeprac-admin disable department 6f1c...
//! codeprac-admin delete college 0b7e...
//! codeprac-admin audit college 0b7e...
//! ```

mod cli;
mod commands;
mod config;

use std::{process::ExitCode, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use codeprac_cascade::Engine;
use codeprac_core::identity::NullGateway;
use codeprac_identity::HttpGateway;
use codeprac_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{cli::Cli, config::AdminConfig};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = AdminConfig::load(&cli.config)?;

  let store_path = cfg.resolved_store_path();
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  match cfg.identity {
    Some(identity) => {
      tracing::debug!(base_url = %identity.base_url, "using directory service");
      let gateway = HttpGateway::new(identity).context("failed to build identity client")?;
      let engine = Engine::new(Arc::clone(&store), Arc::new(gateway), store, cfg.engine);
      commands::run(&engine, cli.command, &cli.actor).await
    }
    None => {
      tracing::debug!("no directory configured; accounts are local-only");
      let engine = Engine::new(Arc::clone(&store), Arc::new(NullGateway), store, cfg.engine);
      commands::run(&engine, cli.command, &cli.actor).await
    }
  }
}
