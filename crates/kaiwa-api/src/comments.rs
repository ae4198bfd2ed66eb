//! Handlers for comment endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/episodes/{id}/comments` | Comment tree as seen by the caller |
//! | `POST`   | `/episodes/{id}/comments` | Body: [`CreateBody`]; returns 201 |
//! | `GET`    | `/comments/{id}` | Single comment at any depth |
//! | `PATCH`  | `/comments/{id}` | Body: `{"content":"..."}`; author only |
//! | `DELETE` | `/comments/{id}` | Author only; removes the whole subtree |
//! | `POST`   | `/comments/{id}/reaction` | Body: [`ReactBody`] |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use kaiwa_core::{
  comment::Comment,
  engagement::{Engagement, LikeHistory},
  reaction::ReactionResult,
  store::EngagementStore,
  tree::CommentNode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{Viewer, error::ApiError};

// ─── Tree ────────────────────────────────────────────────────────────────────

/// `GET /episodes/{id}/comments`
pub async fn tree<S: EngagementStore>(
  State(svc): State<Engagement<S>>,
  Viewer(viewer): Viewer,
  Path(episode_id): Path<Uuid>,
) -> Result<Json<Vec<CommentNode>>, ApiError> {
  let nodes = svc
    .comment_tree(episode_id, viewer)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(nodes))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub content:   String,
  /// Set to reply to an existing comment of the same episode.
  pub parent_id: Option<Uuid>,
}

/// `POST /episodes/{id}/comments`
pub async fn create<S: EngagementStore>(
  State(svc): State<Engagement<S>>,
  Viewer(viewer): Viewer,
  Path(episode_id): Path<Uuid>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let comment = svc
    .post_comment(viewer, episode_id, body.content, body.parent_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(comment)))
}

// ─── Single comment ──────────────────────────────────────────────────────────

/// `GET /comments/{id}`
pub async fn get_one<S: EngagementStore>(
  State(svc): State<Engagement<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Comment>, ApiError> {
  let comment = svc.get_comment(id).await.map_err(ApiError::from_store)?;
  Ok(Json(comment))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub content: String,
}

/// `PATCH /comments/{id}`
pub async fn update<S: EngagementStore>(
  State(svc): State<Engagement<S>>,
  Viewer(viewer): Viewer,
  Path(id): Path<Uuid>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<Comment>, ApiError> {
  let comment = svc
    .edit_comment(viewer, id, body.content)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(comment))
}

/// `DELETE /comments/{id}`: responds with the number of comments removed.
pub async fn remove<S: EngagementStore>(
  State(svc): State<Engagement<S>>,
  Viewer(viewer): Viewer,
  Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
  let removed = svc
    .delete_comment(viewer, id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(json!({ "removed": removed })))
}

// ─── Reaction ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReactBody {
  /// `true` for like, `false` for dislike.
  pub is_like:        bool,
  /// Whether a first like is written to the caller's history. Defaults to
  /// `true`; lightweight widgets send `false`.
  #[serde(default = "default_true")]
  pub record_history: bool,
}

fn default_true() -> bool { true }

/// `POST /comments/{id}/reaction`
pub async fn react<S: EngagementStore>(
  State(svc): State<Engagement<S>>,
  Viewer(viewer): Viewer,
  Path(id): Path<Uuid>,
  Json(body): Json<ReactBody>,
) -> Result<Json<ReactionResult>, ApiError> {
  let history = if body.record_history {
    LikeHistory::Record
  } else {
    LikeHistory::Skip
  };
  let result = svc
    .react(viewer, id, body.is_like, history)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(result))
}
