//! Users: the actors behind every comment, reaction and feed entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user. Credentials never leave the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:    Uuid,
  pub name:       String,
  pub avatar:     Option<String>,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::EngagementStore::add_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub name:          String,
  pub avatar:        Option<String>,
  /// argon2 PHC string, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Public author details embedded in rendered comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
  pub user_id: Uuid,
  pub name:    String,
  pub avatar:  Option<String>,
}

impl From<&User> for Author {
  fn from(u: &User) -> Self {
    Self {
      user_id: u.user_id,
      name:    u.name.clone(),
      avatar:  u.avatar.clone(),
    }
  }
}
