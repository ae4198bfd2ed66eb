//! Handlers for the caller's watch-later list.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/watch-later` | Most recently saved first; `?limit&offset` |
//! | `POST`   | `/watch-later` | Body: `{"episode_id":"..."}`; 201 when newly saved, 200 if already saved |
//! | `DELETE` | `/watch-later/{episode_id}` | Succeeds whether or not the episode was saved |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use kaiwa_core::{engagement::Engagement, store::EngagementStore, watch_later::WatchLaterEntry};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{PageParams, Viewer, error::ApiError};

/// `GET /watch-later[?limit=..][&offset=..]`
pub async fn list<S: EngagementStore>(
  State(svc): State<Engagement<S>>,
  Viewer(viewer): Viewer,
  Query(params): Query<PageParams>,
) -> Result<Json<Vec<WatchLaterEntry>>, ApiError> {
  let page = svc.page(params.limit, params.offset);
  let entries = svc.watch_later(viewer, page).await.map_err(ApiError::from_store)?;
  Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct AddBody {
  pub episode_id: Uuid,
}

/// `POST /watch-later`
pub async fn add<S: EngagementStore>(
  State(svc): State<Engagement<S>>,
  Viewer(viewer): Viewer,
  Json(body): Json<AddBody>,
) -> Result<(StatusCode, Json<WatchLaterEntry>), ApiError> {
  let (entry, created) = svc
    .add_to_watch_later(viewer, body.episode_id)
    .await
    .map_err(ApiError::from_store)?;
  let status = if created { StatusCode::CREATED } else { StatusCode::OK };
  Ok((status, Json(entry)))
}

/// `DELETE /watch-later/{episode_id}`
pub async fn remove<S: EngagementStore>(
  State(svc): State<Engagement<S>>,
  Viewer(viewer): Viewer,
  Path(episode_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
  let removed = svc
    .remove_from_watch_later(viewer, episode_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(json!({ "removed": removed })))
}
