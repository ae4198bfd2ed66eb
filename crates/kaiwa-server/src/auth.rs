//! HTTP Basic auth against stored users.
//!
//! A request without an `Authorization` header passes through as anonymous.
//! A header that is present but malformed, names an unknown user, or carries
//! the wrong password is rejected with 401.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, header},
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use kaiwa_api::CurrentUser;
use kaiwa_core::store::EngagementStore;
use rand_core::OsRng;
use tracing::debug;
use uuid::Uuid;

use crate::{AppState, error::Error};

/// Decoded `Basic` credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
  pub username: String,
  pub password: String,
}

/// `Ok(None)` when no `Authorization` header is present.
pub fn parse_basic(headers: &HeaderMap) -> Result<Option<Credentials>, Error> {
  let Some(value) = headers.get(header::AUTHORIZATION) else {
    return Ok(None);
  };

  let encoded = value
    .to_str()
    .ok()
    .and_then(|v| v.strip_prefix("Basic "))
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;
  Ok(Some(Credentials {
    username: username.to_owned(),
    password: password.to_owned(),
  }))
}

/// Resolve credentials to a user id.
pub async fn verify<S: EngagementStore>(store: &S, creds: &Credentials) -> Result<Uuid, Error> {
  let (user, hash) = store
    .find_credentials(&creds.username)
    .await
    .map_err(|e| Error::Store(Box::new(e)))?
    .ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&hash).map_err(|_| Error::Unauthorized)?;
  Argon2::default()
    .verify_password(creds.password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(user.user_id)
}

/// Middleware: attach [`CurrentUser`] for valid credentials.
pub async fn authenticate<S>(
  State(state): State<AppState<S>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error>
where
  S: EngagementStore + Clone + 'static,
{
  if let Some(creds) = parse_basic(req.headers())? {
    let user_id = verify(state.engagement.store().as_ref(), &creds).await?;
    debug!(%user_id, "authenticated");
    req.extensions_mut().insert(CurrentUser(user_id));
  }
  Ok(next.run(req).await)
}

/// Produce an argon2 PHC string for `password`.
pub fn hash_password(password: &str) -> Result<String, Error> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| Error::PasswordHash(e.to_string()))
}
