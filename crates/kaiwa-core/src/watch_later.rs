//! Watch-later: a per-user queue of episodes saved for later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One saved episode. At most one per `(user, episode)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchLaterEntry {
  pub watch_later_id: Uuid,
  pub user_id:        Uuid,
  pub episode_id:     Uuid,
  pub created_at:     DateTime<Utc>,
}
