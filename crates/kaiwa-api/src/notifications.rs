//! Handlers for the caller's notification inbox.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/notifications` | Newest first plus `unread_count`; `?limit&offset` |
//! | `DELETE` | `/notifications` | Clear all |
//! | `POST`   | `/notifications/read` | Mark all as read |
//! | `DELETE` | `/notifications/{id}` | 404 unless it is the caller's |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use kaiwa_core::{
  engagement::Engagement, notification::NotificationFeed, store::EngagementStore,
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{PageParams, Viewer, error::ApiError};

/// `GET /notifications[?limit=..][&offset=..]`
pub async fn list<S: EngagementStore>(
  State(svc): State<Engagement<S>>,
  Viewer(viewer): Viewer,
  Query(params): Query<PageParams>,
) -> Result<Json<NotificationFeed>, ApiError> {
  let page = svc.page(params.limit, params.offset);
  let feed = svc
    .notifications(viewer, page)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(feed))
}

/// `POST /notifications/read`
pub async fn mark_all_read<S: EngagementStore>(
  State(svc): State<Engagement<S>>,
  Viewer(viewer): Viewer,
) -> Result<Json<Value>, ApiError> {
  let updated = svc.mark_all_read(viewer).await.map_err(ApiError::from_store)?;
  Ok(Json(json!({ "updated": updated })))
}

/// `DELETE /notifications/{id}`
pub async fn remove<S: EngagementStore>(
  State(svc): State<Engagement<S>>,
  Viewer(viewer): Viewer,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  svc
    .delete_notification(viewer, id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /notifications`
pub async fn clear<S: EngagementStore>(
  State(svc): State<Engagement<S>>,
  Viewer(viewer): Viewer,
) -> Result<Json<Value>, ApiError> {
  let deleted = svc
    .clear_notifications(viewer)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(json!({ "deleted": deleted })))
}
