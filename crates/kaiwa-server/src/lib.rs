//! HTTP server assembly for Kaiwa.
//!
//! Nests the [`kaiwa_api`] router under `/api`, wraps it in Basic auth
//! backed by the store's users, and adds request tracing.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, middleware};
use kaiwa_core::{
  engagement::{Engagement, EngagementConfig},
  store::EngagementStore,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  #[serde(default)]
  pub engagement: EngagementConfig,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("kaiwa.db") }

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       default_host(),
      port:       default_port(),
      store_path: default_store_path(),
      engagement: EngagementConfig::default(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state of the auth middleware.
#[derive(Clone)]
pub struct AppState<S: EngagementStore> {
  pub engagement: Engagement<S>,
}

impl<S: EngagementStore> AppState<S> {
  pub fn new(store: Arc<S>, config: EngagementConfig) -> Self {
    Self { engagement: Engagement::new(store, config) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application [`Router`].
pub fn router<S>(state: AppState<S>) -> Router
where
  S: EngagementStore + Clone + 'static,
{
  Router::new()
    .nest("/api", kaiwa_api::api_router(state.engagement.clone()))
    .layer(middleware::from_fn_with_state(state, auth::authenticate::<S>))
    .layer(TraceLayer::new_for_http())
}

// ─── Tests ────────────────────────────────────────────────────────────────────
