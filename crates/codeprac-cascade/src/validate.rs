//! Input checks applied before anything is registered or stored.

use codeprac_core::identity::Credential;

use crate::{Error, Result};

const MIN_PASSWORD_LEN: usize = 6;
const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=20;

/// Trim `value` and reject it if nothing is left.
pub(crate) fn name(field: &str, value: &str) -> Result<String> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(Error::Validation(format!("{field} must not be empty")));
  }
  Ok(trimmed.to_owned())
}

/// Lowercased, trimmed email with a single `@` and a dotted domain.
pub(crate) fn email(value: &str) -> Result<String> {
  let email = value.trim().to_ascii_lowercase();
  let valid = match email.split_once('@') {
    Some((local, domain)) => {
      !local.is_empty()
        && !domain.contains('@')
        && !email.contains(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|part| !part.is_empty())
    }
    None => false,
  };
  if !valid {
    return Err(Error::Validation(format!("invalid email address: {value:?}")));
  }
  Ok(email)
}

pub(crate) fn username(value: &str) -> Result<String> {
  let username = value.trim();
  if !USERNAME_LEN.contains(&username.chars().count())
    || !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
  {
    return Err(Error::Validation(format!(
      "username must be {}-{} letters, digits or underscores",
      USERNAME_LEN.start(),
      USERNAME_LEN.end()
    )));
  }
  Ok(username.to_owned())
}

pub(crate) fn password(value: &Credential) -> Result<()> {
  if value.len() < MIN_PASSWORD_LEN {
    return Err(Error::Validation(format!(
      "password must be at least {MIN_PASSWORD_LEN} characters"
    )));
  }
  Ok(())
}
