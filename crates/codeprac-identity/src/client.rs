//! Async HTTP client wrapping the directory's JSON API.

use std::time::Duration;

use codeprac_core::{
  entity::ExternalId,
  identity::{Credential, CredentialUpdate, IdentityGateway, Profile},
};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const SECRET_HEADER: &str = "x-service-secret";

fn default_timeout_ms() -> u64 { 5_000 }

/// Connection settings for the directory service.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
  /// e.g. `https://identity.internal/api`
  pub base_url:       String,
  pub service_secret: String,
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms:     u64,
}

#[derive(Serialize)]
struct Registration<'a> {
  email:    &'a str,
  password: &'a str,
  profile:  &'a Profile,
}

#[derive(Deserialize)]
struct Registered {
  id: String,
}

/// [`IdentityGateway`] over HTTP.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpGateway {
  client: Client,
  config: GatewayConfig,
}

impl HttpGateway {
  pub fn new(config: GatewayConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_millis(config.timeout_ms))
      .build()
      .map_err(Error::Client)?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn request(&self, method: Method, path: &str) -> RequestBuilder {
    self
      .client
      .request(method, self.url(path))
      .header(SECRET_HEADER, &self.config.service_secret)
  }

  /// Send `req` and fail on transport errors or non-success statuses.
  async fn send(
    &self,
    method: &'static str,
    path: String,
    req: RequestBuilder,
  ) -> Result<Response> {
    let resp = req.send().await.map_err(|source| Error::Transport {
      method,
      path: path.clone(),
      source,
    })?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      tracing::debug!(%method, %path, %status, "directory rejected request");
      return Err(Error::Status { method, path, status, body });
    }
    Ok(resp)
  }

  async fn post_action(&self, id: &ExternalId, action: &str) -> Result<()> {
    let path = format!("/users/{}/{action}", id.as_str());
    let req = self.request(Method::POST, &path);
    self.send("POST", path, req).await?;
    Ok(())
  }
}

impl IdentityGateway for HttpGateway {
  type Error = Error;

  /// `POST /users`
  async fn register(
    &self,
    email: &str,
    credential: &Credential,
    profile: &Profile,
  ) -> Result<ExternalId> {
    let path = "/users".to_owned();
    let req = self.request(Method::POST, &path).json(&Registration {
      email,
      password: credential.expose(),
      profile,
    });
    let resp = self.send("POST", path.clone(), req).await?;

    let registered: Registered = resp
      .json()
      .await
      .map_err(|source| Error::Decode { path, source })?;
    Ok(ExternalId(registered.id))
  }

  /// `PATCH /users/{id}`
  async fn update_credentials(
    &self,
    id: &ExternalId,
    update: &CredentialUpdate,
  ) -> Result<()> {
    let path = format!("/users/{}", id.as_str());
    let req = self.request(Method::PATCH, &path).json(update);
    self.send("PATCH", path, req).await?;
    Ok(())
  }

  /// `POST /users/{id}/disable`
  async fn disable(&self, id: &ExternalId) -> Result<()> {
    self.post_action(id, "disable").await
  }

  /// `POST /users/{id}/enable`
  async fn enable(&self, id: &ExternalId) -> Result<()> {
    self.post_action(id, "enable").await
  }
}

#[cfg(test)]
mod tests {
  use codeprac_core::identity::Role;

  use super::*;

  fn gateway(base_url: &str) -> HttpGateway {
    HttpGateway::new(GatewayConfig {
      base_url:       base_url.into(),
      service_secret: "s3cret".into(),
      timeout_ms:     500,
    })
    .unwrap()
  }

  #[test]
  fn urls_ignore_trailing_slashes() {
    assert_eq!(
      gateway("http://directory.test/api/").url("/users/abc/disable"),
      "http://directory.test/api/users/abc/disable"
    );
  }

  #[test]
  fn every_request_carries_the_service_secret() {
    let req = gateway("http://directory.test")
      .request(Method::POST, "/users")
      .build()
      .unwrap();
    assert_eq!(req.headers()[SECRET_HEADER], "s3cret");
    assert_eq!(req.url().as_str(), "http://directory.test/users");
  }

  #[test]
  fn registration_payload_shape() {
    let profile = Profile {
      display_name:  "ada_l".into(),
      role:          Role::Student,
      college_id:    None,
      department_id: None,
      batch_id:      None,
    };
    let body = serde_json::to_value(Registration {
      email:    "ada@northfield.edu",
      password: "hunter22",
      profile:  &profile,
    })
    .unwrap();
    assert_eq!(body["email"], "ada@northfield.edu");
    assert_eq!(body["profile"]["role"], "student");
  }

  #[test]
  fn config_timeout_defaults_to_five_seconds() {
    let config: GatewayConfig = serde_json::from_value(serde_json::json!({
      "base_url": "http://directory.test",
      "service_secret": "x",
    }))
    .unwrap();
    assert_eq!(config.timeout_ms, 5_000);
  }

  #[tokio::test]
  async fn unreachable_directory_is_a_transport_error() {
    let err = gateway("http://127.0.0.1:9")
      .disable(&ExternalId("abc".into()))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Transport { method: "POST", .. }), "{err}");
  }
}
