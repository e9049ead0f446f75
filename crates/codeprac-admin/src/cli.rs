//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use codeprac_core::{
  entity::{EntityKind, Outcome},
  lifecycle::Operation,
};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "codeprac-admin", version, about = "Administer the Codeprac institution hierarchy")]
pub struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "codeprac.toml")]
  pub config: PathBuf,

  /// Recorded as the actor on every audit entry.
  #[arg(long, env = "CODEPRAC_ACTOR", default_value = "admin-cli")]
  pub actor: String,

  #[command(subcommand)]
  pub command: Command,
}

/// `<kind> <id>` addressing a single record.
#[derive(Args, Debug, Clone)]
pub struct Target {
  /// college, department, batch, student (singular or plural).
  pub kind: String,
  pub id:   Uuid,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Disable a node and everything beneath it.
  Disable(Target),

  /// Re-enable a node and everything beneath it.
  Enable(Target),

  /// Permanently delete a node, its descendants and their content.
  Delete(Target),

  /// Show what a cascade would touch, without changing anything.
  Plan {
    operation: Operation,
    kind:      EntityKind,
    id:        Uuid,
  },

  #[command(subcommand)]
  Create(Create),

  /// Record a student's result on a question.
  RecordPerformance {
    #[arg(long)]
    student:  Uuid,
    #[arg(long)]
    question: Uuid,
    #[arg(long)]
    outcome:  Outcome,
  },

  /// Change the name, email or password of a node.
  UpdateProfile {
    kind:     EntityKind,
    id:       Uuid,
    /// Display name; username for students.
    #[arg(long)]
    name:     Option<String>,
    #[arg(long)]
    email:    Option<String>,
    #[arg(long, env = "CODEPRAC_NEW_PASSWORD", hide_env_values = true)]
    password: Option<String>,
  },

  /// Print a single record.
  Show { kind: EntityKind, id: Uuid },

  /// List audit entries, newest first.
  Audit {
    kind: Option<EntityKind>,
    #[arg(requires = "kind")]
    id:   Option<Uuid>,
  },
}

/// Email and password of an account-bearing node.
#[derive(Args, Debug, Clone)]
pub struct Login {
  #[arg(long)]
  pub email:    String,
  #[arg(long, env = "CODEPRAC_PASSWORD", hide_env_values = true)]
  pub password: String,
}

#[derive(Subcommand, Debug)]
pub enum Create {
  College {
    #[arg(long)]
    name:  String,
    #[command(flatten)]
    login: Login,
  },
  Department {
    #[arg(long)]
    college: Uuid,
    #[arg(long)]
    name:    String,
    #[command(flatten)]
    login:   Login,
  },
  Batch {
    #[arg(long)]
    department: Uuid,
    #[arg(long)]
    name:       String,
    #[command(flatten)]
    login:      Login,
  },
  /// Without --password a temporary password is generated and printed.
  Student {
    #[arg(long)]
    batch:    Uuid,
    #[arg(long)]
    username: String,
    #[arg(long)]
    email:    String,
    #[arg(long, env = "CODEPRAC_PASSWORD", hide_env_values = true)]
    password: Option<String>,
  },
  /// Create many students in one batch from a JSON file holding an array of
  /// `{"username", "email", "password"?}` rows. Failed rows are reported and
  /// skipped.
  Students {
    #[arg(long)]
    batch: Uuid,
    #[arg(long)]
    file:  PathBuf,
  },
  Topic {
    #[arg(long)]
    department: Uuid,
    #[arg(long)]
    name:       String,
  },
  Question {
    #[arg(long)]
    topic: Uuid,
    /// Restrict the question to one batch of the topic's department.
    #[arg(long)]
    batch: Option<Uuid>,
    #[arg(long)]
    title: String,
  },
  Note {
    #[arg(long)]
    topic: Uuid,
    #[arg(long)]
    title: String,
  },
}
