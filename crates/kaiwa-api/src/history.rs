//! Handlers for the caller's activity history.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/history` | Most recently touched first; `?limit&offset` |
//! | `DELETE` | `/history` | Clear all |
//! | `POST`   | `/history/activity` | Body: [`ActivityBody`]; coalesced within the window |

use axum::{
  Json,
  extract::{Query, State},
};
use kaiwa_core::{
  engagement::Engagement,
  history::{HistoryEntry, HistoryKind},
  store::EngagementStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{PageParams, Viewer, error::ApiError};

/// `GET /history[?limit=..][&offset=..]`
pub async fn list<S: EngagementStore>(
  State(svc): State<Engagement<S>>,
  Viewer(viewer): Viewer,
  Query(params): Query<PageParams>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
  let page = svc.page(params.limit, params.offset);
  let entries = svc.history(viewer, page).await.map_err(ApiError::from_store)?;
  Ok(Json(entries))
}

/// `DELETE /history`
pub async fn clear<S: EngagementStore>(
  State(svc): State<Engagement<S>>,
  Viewer(viewer): Viewer,
) -> Result<Json<Value>, ApiError> {
  let deleted = svc.clear_history(viewer).await.map_err(ApiError::from_store)?;
  Ok(Json(json!({ "deleted": deleted })))
}

#[derive(Debug, Deserialize)]
pub struct ActivityBody {
  pub episode_id: Uuid,
  /// `watch` (or `view`), `comment`, `reply` or `like`.
  #[serde(rename = "type")]
  pub kind:       HistoryKind,
  pub metadata:   Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ActivityRecorded {
  pub entry:  HistoryEntry,
  /// `true` when an existing entry inside the window was updated instead.
  pub merged: bool,
}

/// `POST /history/activity`
pub async fn record_activity<S: EngagementStore>(
  State(svc): State<Engagement<S>>,
  Viewer(viewer): Viewer,
  Json(body): Json<ActivityBody>,
) -> Result<Json<ActivityRecorded>, ApiError> {
  let (entry, merged) = svc
    .record_activity(viewer, body.episode_id, body.kind, body.metadata)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(ActivityRecorded { entry, merged }))
}
