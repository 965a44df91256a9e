//! HTTP Basic auth for the admin routes.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::HeaderMap,
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;

use crate::error::Error;

/// Admin credentials accepted by this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Verify Basic credentials in `headers` against `config`.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<(), Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  if username != config.username {
    return Err(Error::Unauthorized);
  }

  let parsed_hash = PasswordHash::new(&config.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(())
}

/// Middleware rejecting requests without valid admin credentials.
pub async fn require_admin(
  State(auth): State<Arc<AuthConfig>>,
  req: Request,
  next: Next,
) -> Result<Response, Error> {
  if let Err(e) = verify_auth(req.headers(), &auth) {
    tracing::warn!(path = %req.uri().path(), "admin request rejected");
    return Err(e);
  }
  Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::header;

  fn config(password: &str) -> AuthConfig {
    use argon2::{PasswordHasher, password_hash::SaltString};
    use rand_core::OsRng;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    AuthConfig { username: "admin".to_string(), password_hash: hash }
  }

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, value.parse().unwrap());
    h
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  #[test]
  fn correct_credentials() {
    let cfg = config("secret");
    assert!(verify_auth(&headers(&basic("admin", "secret")), &cfg).is_ok());
  }

  #[test]
  fn wrong_password_or_user() {
    let cfg = config("secret");
    assert!(matches!(
      verify_auth(&headers(&basic("admin", "wrong")), &cfg),
      Err(Error::Unauthorized)
    ));
    assert!(matches!(
      verify_auth(&headers(&basic("root", "secret")), &cfg),
      Err(Error::Unauthorized)
    ));
  }

  #[test]
  fn missing_or_malformed_header() {
    let cfg = config("secret");
    assert!(verify_auth(&HeaderMap::new(), &cfg).is_err());
    assert!(verify_auth(&headers("Basic !!!not-base64!!!"), &cfg).is_err());
    assert!(verify_auth(&headers("Bearer token"), &cfg).is_err());
  }
}
