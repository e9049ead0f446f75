//! Executes a parsed [`Command`] against an engine and renders the outcome
//! as JSON on stdout.

use std::process::ExitCode;

use anyhow::Context as _;
use codeprac_cascade::{
  Engine, Error,
  provision::{
    Account, BatchRequest, CollegeRequest, DepartmentRequest, ProfileChange,
    StudentRequest,
  },
};
use codeprac_core::{
  entity::EntityRef,
  identity::{Credential, IdentityGateway},
  lifecycle::Operation,
  store::EntityStore,
};
use codeprac_store_sqlite::SqliteStore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::cli::{Command, Create, Login};

pub type AdminEngine<G> = Engine<SqliteStore, G, SqliteStore>;

fn print(value: &impl Serialize) -> anyhow::Result<()> {
  let out = serde_json::to_string_pretty(value).context("serialising output")?;
  println!("{out}");
  Ok(())
}

fn account(login: Login) -> Account {
  Account { email: login.email, password: Credential::new(login.password) }
}

/// One entry of a bulk student upload file.
#[derive(Debug, Deserialize)]
struct StudentRow {
  username: String,
  email:    String,
  #[serde(default)]
  password: Option<String>,
}

fn student_rows(batch_id: Uuid, json: &str) -> serde_json::Result<Vec<StudentRequest>> {
  let rows: Vec<StudentRow> = serde_json::from_str(json)?;
  Ok(
    rows
      .into_iter()
      .map(|row| StudentRequest {
        batch_id,
        username: row.username,
        email: row.email,
        password: row.password.map(Credential::new),
      })
      .collect(),
  )
}

/// Run `command`. Engine errors are printed as a JSON object and turned into
/// a failing exit code; only I/O problems surface as `Err`.
pub async fn run<G: IdentityGateway>(
  engine: &AdminEngine<G>,
  command: Command,
  actor: &str,
) -> anyhow::Result<ExitCode> {
  match dispatch(engine, command, actor).await {
    Ok(value) => {
      print(&value)?;
      Ok(ExitCode::SUCCESS)
    }
    Err(Failure::Engine(e)) => {
      tracing::error!(code = e.code(), error = %e, "command failed");
      print(&json!({
        "error":   e.code(),
        "message": e.to_string(),
        "partial": e.partial(),
      }))?;
      Ok(ExitCode::FAILURE)
    }
    Err(Failure::Other(e)) => Err(e),
  }
}

#[derive(Debug)]
enum Failure {
  Engine(Error),
  Other(anyhow::Error),
}

impl From<Error> for Failure {
  fn from(e: Error) -> Self { Self::Engine(e) }
}

impl From<serde_json::Error> for Failure {
  fn from(e: serde_json::Error) -> Self { Self::Other(e.into()) }
}

impl From<codeprac_store_sqlite::Error> for Failure {
  fn from(e: codeprac_store_sqlite::Error) -> Self { Self::Other(e.into()) }
}

async fn dispatch<G: IdentityGateway>(
  engine: &AdminEngine<G>,
  command: Command,
  actor: &str,
) -> Result<serde_json::Value, Failure> {
  let value = match command {
    Command::Disable(t) => {
      serde_json::to_value(engine.run(&t.kind, t.id, Operation::Disable.as_str(), actor).await?)?
    }
    Command::Enable(t) => {
      serde_json::to_value(engine.run(&t.kind, t.id, Operation::Enable.as_str(), actor).await?)?
    }
    Command::Delete(t) => {
      serde_json::to_value(engine.run(&t.kind, t.id, Operation::Delete.as_str(), actor).await?)?
    }
    Command::Plan { operation, kind, id } => {
      let plan =
        codeprac_cascade::plan(engine.store(), EntityRef::new(kind, id), operation).await?;
      serde_json::to_value(plan)?
    }
    Command::Create(create) => create_one(engine, create, actor).await?,
    Command::RecordPerformance { student, question, outcome } => serde_json::to_value(
      engine.record_performance(student, question, outcome, actor).await?,
    )?,
    Command::UpdateProfile { kind, id, name, email, password } => {
      let change = ProfileChange { name, email, password: password.map(Credential::new) };
      serde_json::to_value(
        engine.update_profile(EntityRef::new(kind, id), change, actor).await?,
      )?
    }
    Command::Show { kind, id } => {
      let target = EntityRef::new(kind, id);
      let entity = engine
        .store()
        .get(target)
        .await?
        .ok_or(Error::NotFound(target))?;
      serde_json::to_value(entity)?
    }
    Command::Audit { kind, id } => {
      let target = kind.zip(id).map(|(kind, id)| EntityRef::new(kind, id));
      serde_json::to_value(engine.store().audit_entries(target).await?)?
    }
  };
  Ok(value)
}

async fn create_one<G: IdentityGateway>(
  engine: &AdminEngine<G>,
  create: Create,
  actor: &str,
) -> Result<serde_json::Value, Failure> {
  let value = match create {
    Create::College { name, login } => serde_json::to_value(
      engine
        .create_college(CollegeRequest { name, account: account(login) }, actor)
        .await?,
    )?,
    Create::Department { college, name, login } => serde_json::to_value(
      engine
        .create_department(
          DepartmentRequest { college_id: college, name, account: account(login) },
          actor,
        )
        .await?,
    )?,
    Create::Batch { department, name, login } => serde_json::to_value(
      engine
        .create_batch(
          BatchRequest { department_id: department, name, account: account(login) },
          actor,
        )
        .await?,
    )?,
    Create::Student { batch, username, email, password } => serde_json::to_value(
      engine
        .create_student(
          StudentRequest {
            batch_id: batch,
            username,
            email,
            password: password.map(Credential::new),
          },
          actor,
        )
        .await?,
    )?,
    Create::Students { batch, file } => {
      let json = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))
        .map_err(Failure::Other)?;
      let rows = student_rows(batch, &json)
        .with_context(|| format!("{} is not a list of student rows", file.display()))
        .map_err(Failure::Other)?;
      serde_json::to_value(engine.create_students(batch, rows, actor).await?)?
    }
    Create::Topic { department, name } => {
      serde_json::to_value(engine.create_topic(department, &name, actor).await?)?
    }
    Create::Question { topic, batch, title } => {
      serde_json::to_value(engine.create_question(topic, batch, &title, actor).await?)?
    }
    Create::Note { topic, title } => {
      serde_json::to_value(engine.create_note(topic, &title, actor).await?)?
    }
  };
  Ok(value)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use codeprac_cascade::EngineConfig;
  use codeprac_core::identity::NullGateway;

  use super::*;
  use crate::cli::Target;

  async fn engine() -> AdminEngine<NullGateway> {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    Engine::new(Arc::clone(&store), Arc::new(NullGateway), store, EngineConfig::default())
  }

  #[tokio::test]
  async fn create_then_disable_through_commands() {
    let engine = engine().await;
    let created = dispatch(
      &engine,
      Command::Create(Create::College {
        name:  "Northfield".into(),
        login: Login { email: "admin@northfield.edu".into(), password: "hunter22".into() },
      }),
      "tester",
    )
    .await
    .unwrap();
    let id = created["record"]["college_id"].as_str().unwrap().parse().unwrap();

    let result = dispatch(
      &engine,
      Command::Disable(Target { kind: "college".into(), id }),
      "tester",
    )
    .await
    .unwrap();
    assert_eq!(result["success"], true);
    assert_eq!(result["counts"]["colleges"], 1);

    let audit = dispatch(&engine, Command::Audit { kind: None, id: None }, "tester")
      .await
      .unwrap();
    assert_eq!(audit.as_array().unwrap().len(), 2);
  }

  #[test]
  fn upload_rows_take_the_target_batch() {
    let batch = Uuid::new_v4();
    let rows = student_rows(
      batch,
      r#"[
        { "username": "ada_l", "email": "ada@northfield.edu" },
        { "username": "grace_h", "email": "grace@northfield.edu", "password": "hopper42" }
      ]"#,
    )
    .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.batch_id == batch));
    assert!(rows[0].password.is_none());
    assert_eq!(rows[1].password.as_ref().map(Credential::expose), Some("hopper42"));

    assert!(student_rows(batch, r#"{ "username": "ada_l" }"#).is_err());
  }

  #[tokio::test]
  async fn engine_errors_become_failing_exit_codes() {
    let engine = engine().await;
    let code = run(
      &engine,
      Command::Delete(Target { kind: "batch".into(), id: Uuid::new_v4() }),
      "tester",
    )
    .await
    .unwrap();
    assert_eq!(code, ExitCode::FAILURE);
  }
}
