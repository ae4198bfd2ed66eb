//! Episode-level endpoints that are not about comments.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/episodes/{id}/views` | Record a view; repeat views touch one entry |
//! | `POST` | `/episodes/{id}/announce` | Body: [`AnnounceBody`]; notify each recipient |

use axum::{
  Json,
  extract::{Path, State},
};
use chrono::{DateTime, Utc};
use kaiwa_core::{
  engagement::Engagement, fanout::EpisodeAnnouncement, history::HistoryEntry,
  store::EngagementStore,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{Viewer, error::ApiError};

/// `POST /episodes/{id}/views`
pub async fn record_view<S: EngagementStore>(
  State(svc): State<Engagement<S>>,
  Viewer(viewer): Viewer,
  Path(episode_id): Path<Uuid>,
) -> Result<Json<HistoryEntry>, ApiError> {
  let entry = svc
    .record_view(viewer, episode_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(entry))
}

#[derive(Debug, Deserialize)]
pub struct AnnounceBody {
  pub title:        String,
  pub thumbnail:    Option<String>,
  pub duration:     Option<String>,
  /// Defaults to now.
  pub published_at: Option<DateTime<Utc>>,
  pub recipients:   Vec<Uuid>,
}

/// `POST /episodes/{id}/announce`: responds with how many users were
/// notified.
pub async fn announce<S: EngagementStore>(
  State(svc): State<Engagement<S>>,
  Viewer(viewer): Viewer,
  Path(episode_id): Path<Uuid>,
  Json(body): Json<AnnounceBody>,
) -> Result<Json<Value>, ApiError> {
  if viewer.is_none() {
    return Err(ApiError::from_store(kaiwa_core::Error::Unauthenticated));
  }

  let episode = EpisodeAnnouncement {
    episode_id,
    title: body.title,
    thumbnail: body.thumbnail,
    duration: body.duration,
    published_at: body.published_at.unwrap_or_else(Utc::now),
  };
  let notified = svc.announce_episode(&episode, &body.recipients).await;
  Ok(Json(json!({ "notified": notified })))
}
