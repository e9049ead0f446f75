//! The `IdentityGateway` trait: the external directory that holds
//! credentials and profile data for every human user.
//!
//! The local store is authoritative for hierarchy and lifecycle. The gateway
//! is mirrored on a best-effort basis: apart from [`register`], a failed call
//! never undoes a local change.
//!
//! [`register`]: IdentityGateway::register

use std::{convert::Infallible, fmt, future::Future};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::ExternalId;

/// A plaintext password on its way to the identity service. Never logged.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
  pub fn new(secret: impl Into<String>) -> Self { Self(secret.into()) }

  pub fn expose(&self) -> &str { &self.0 }

  /// Length in characters.
  pub fn len(&self) -> usize { self.0.chars().count() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl fmt::Debug for Credential {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Credential(***)")
  }
}

/// The role a directory user plays in the institution hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  College,
  Department,
  Batch,
  Student,
}

/// Profile attributes stored alongside the credential record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
  pub display_name:  String,
  pub role:          Role,
  pub college_id:    Option<Uuid>,
  pub department_id: Option<Uuid>,
  pub batch_id:      Option<Uuid>,
}

/// Fields to change on an existing credential record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email:        Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub display_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub password:     Option<Credential>,
}

impl CredentialUpdate {
  pub fn is_empty(&self) -> bool {
    self.email.is_none() && self.display_name.is_none() && self.password.is_none()
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the external identity/directory service.
pub trait IdentityGateway: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Create a credential record and return its external id.
  fn register<'a>(
    &'a self,
    email: &'a str,
    credential: &'a Credential,
    profile: &'a Profile,
  ) -> impl Future<Output = Result<ExternalId, Self::Error>> + Send + 'a;

  fn update_credentials<'a>(
    &'a self,
    id: &'a ExternalId,
    update: &'a CredentialUpdate,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn disable<'a>(
    &'a self,
    id: &'a ExternalId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn enable<'a>(
    &'a self,
    id: &'a ExternalId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// A gateway for deployments without a directory service. Registration
/// hands out locally-minted ids; every other call succeeds without effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullGateway;

impl IdentityGateway for NullGateway {
  type Error = Infallible;

  async fn register(
    &self,
    _email: &str,
    _credential: &Credential,
    _profile: &Profile,
  ) -> Result<ExternalId, Infallible> {
    Ok(ExternalId(format!("local-{}", Uuid::new_v4().simple())))
  }

  async fn update_credentials(
    &self,
    _id: &ExternalId,
    _update: &CredentialUpdate,
  ) -> Result<(), Infallible> {
    Ok(())
  }

  async fn disable(&self, _id: &ExternalId) -> Result<(), Infallible> { Ok(()) }

  async fn enable(&self, _id: &ExternalId) -> Result<(), Infallible> { Ok(()) }
}
