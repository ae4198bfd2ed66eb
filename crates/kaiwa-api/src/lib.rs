//! JSON REST API for Kaiwa.
//!
//! Exposes an axum [`Router`] driving an [`Engagement`] service over any
//! [`kaiwa_core::store::EngagementStore`]. Authentication is the caller's
//! job: an outer layer inserts [`CurrentUser`] into the request extensions
//! for authenticated requests and leaves it out for anonymous ones.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", kaiwa_api::api_router(engagement.clone()))
//! ```

pub mod comments;
pub mod episodes;
pub mod error;
pub mod history;
pub mod notifications;
pub mod watch_later;

use std::convert::Infallible;

use axum::{
  Router,
  extract::FromRequestParts,
  http::request::Parts,
  routing::{delete, get, post},
};
use kaiwa_core::{engagement::Engagement, store::EngagementStore};
use serde::Deserialize;
use uuid::Uuid;

pub use error::ApiError;

// ─── Request context ─────────────────────────────────────────────────────────

/// The authenticated user, as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

/// Extracts the acting user, if any. Never rejects; operations that need an
/// actor fail with 401 through the service.
#[derive(Debug, Clone, Copy)]
pub struct Viewer(pub Option<Uuid>);

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
  type Rejection = Infallible;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    Ok(Viewer(parts.extensions.get::<CurrentUser>().map(|u| u.0)))
  }
}

/// `?limit=&offset=` on feed endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `engagement`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(engagement: Engagement<S>) -> Router<()>
where
  S: EngagementStore + 'static,
{
  Router::new()
    // Episodes
    .route(
      "/episodes/{id}/comments",
      get(comments::tree::<S>).post(comments::create::<S>),
    )
    .route("/episodes/{id}/views", post(episodes::record_view::<S>))
    .route("/episodes/{id}/announce", post(episodes::announce::<S>))
    // Comments
    .route(
      "/comments/{id}",
      get(comments::get_one::<S>)
        .patch(comments::update::<S>)
        .delete(comments::remove::<S>),
    )
    .route("/comments/{id}/reaction", post(comments::react::<S>))
    // Notifications
    .route(
      "/notifications",
      get(notifications::list::<S>).delete(notifications::clear::<S>),
    )
    .route("/notifications/read", post(notifications::mark_all_read::<S>))
    .route("/notifications/{id}", delete(notifications::remove::<S>))
    // History
    .route("/history", get(history::list::<S>).delete(history::clear::<S>))
    .route("/history/activity", post(history::record_activity::<S>))
    // Watch later
    .route(
      "/watch-later",
      get(watch_later::list::<S>).post(watch_later::add::<S>),
    )
    .route("/watch-later/{episode_id}", delete(watch_later::remove::<S>))
    .with_state(engagement)
}
