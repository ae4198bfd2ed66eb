//! Page-cache keys and the invalidation coordinator.
//!
//! Listing pages are cached forever under structured keys and only go stale
//! through missed invalidation. Catalog mutations (episodes, anime,
//! categories, seasons, news) call [`CacheCoordinator::on_mutation`]
//! explicitly from their handlers; nothing is hooked implicitly.
//!
//! Cache failures never fail the caller: reads fall through to the loader and
//! writes are best-effort.

use std::{fmt, future::Future, sync::Arc};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, warn};

/// Pages per paged listing that are ever cached, and therefore invalidated.
pub const MAX_CACHED_PAGES: u32 = 100;

// ─── Keys ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum CacheDomain {
  Home,
  Api,
  Anime,
  Movies,
  Episodes,
  Categories,
  Seasons,
  News,
}

/// A domain plus positional parameters; renders as
/// `cache:<domain>[:<param>]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  domain: CacheDomain,
  params: Vec<String>,
}

impl CacheKey {
  pub fn new(domain: CacheDomain) -> Self { Self { domain, params: Vec::new() } }

  pub fn with(mut self, param: impl fmt::Display) -> Self {
    self.params.push(param.to_string());
    self
  }

  pub fn page(self, n: u32) -> Self { self.with("page").with(n) }

  pub fn domain(&self) -> CacheDomain { self.domain }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "cache:{}", self.domain)?;
    for p in &self.params {
      write!(f, ":{p}")?;
    }
    Ok(())
  }
}

/// The keys the site reads through.
pub mod keys {
  use super::{CacheDomain::*, CacheKey};

  pub fn home_episodes(page: u32) -> CacheKey { CacheKey::new(Home).with("episodes").page(page) }
  pub fn api_episodes(page: u32) -> CacheKey { CacheKey::new(Api).with("episodes").page(page) }
  pub fn episodes_list(page: u32) -> CacheKey { CacheKey::new(Episodes).with("list").page(page) }
  pub fn home_animes() -> CacheKey { CacheKey::new(Home).with("animes").with("all") }
  pub fn anime_dropdown() -> CacheKey { CacheKey::new(Anime).with("dropdown") }
  pub fn anime_latest_tv() -> CacheKey { CacheKey::new(Anime).with("latest_tv") }
  pub fn anime_tv(page: u32) -> CacheKey { CacheKey::new(Anime).with("tv").page(page) }
  pub fn anime_show(id: &str) -> CacheKey { CacheKey::new(Anime).with("show").with(id) }
  pub fn movies(page: u32) -> CacheKey { CacheKey::new(Movies).page(page) }
  pub fn categories() -> CacheKey { CacheKey::new(Categories).with("all") }
  pub fn seasons() -> CacheKey { CacheKey::new(Seasons).with("all") }
  pub fn news() -> CacheKey { CacheKey::new(News).with("latest") }
}

// ─── Mutations → keys ────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
  Episode,
  Anime,
  Category,
  Season,
  News,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Mutation {
  Created,
  Updated,
  Deleted,
}

/// Keys made stale by a mutation of `entity`. `id` selects the entity's own
/// detail key where one exists.
pub fn stale_keys(entity: EntityKind, mutation: Mutation, id: Option<&str>) -> Vec<CacheKey> {
  let pages = 1..=MAX_CACHED_PAGES;
  match entity {
    EntityKind::Episode => {
      let mut out: Vec<CacheKey> = pages
        .flat_map(|p| [keys::home_episodes(p), keys::api_episodes(p), keys::episodes_list(p)])
        .collect();
      out.push(keys::anime_latest_tv());
      out
    }
    EntityKind::Anime => {
      let mut out = vec![keys::home_animes(), keys::anime_dropdown(), keys::anime_latest_tv()];
      out.extend(pages.flat_map(|p| [keys::anime_tv(p), keys::movies(p)]));
      if mutation != Mutation::Created {
        out.extend(id.map(keys::anime_show));
      }
      out
    }
    EntityKind::Category => vec![keys::categories()],
    EntityKind::Season => vec![keys::seasons()],
    EntityKind::News => vec![keys::news()],
  }
}

/// Keys pre-warmed right after invalidation so the next request does not
/// stampede the source of truth.
pub fn warm_keys(entity: EntityKind) -> Vec<CacheKey> {
  match entity {
    EntityKind::Episode => vec![keys::home_episodes(1), keys::api_episodes(1)],
    EntityKind::Anime => vec![keys::home_animes(), keys::anime_dropdown()],
    EntityKind::Category | EntityKind::Season | EntityKind::News => Vec::new(),
  }
}

// ─── Store and loader ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CacheError {
  #[error("cache unavailable: {0}")]
  Unavailable(String),
  #[error("cache backend error: {0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type LoadError = Box<dyn std::error::Error + Send + Sync>;

/// Key-value store with write-once-read-many semantics and no expiry.
pub trait CacheStore: Send + Sync {
  fn get<'a>(
    &'a self,
    key: &'a CacheKey,
  ) -> impl Future<Output = Result<Option<Value>, CacheError>> + Send + 'a;

  /// Store `value` unless the key already holds one; return the value held
  /// afterwards.
  fn put_forever(
    &self,
    key: CacheKey,
    value: Value,
  ) -> impl Future<Output = Result<Value, CacheError>> + Send + '_;

  /// Returns whether a value was removed.
  fn forget<'a>(
    &'a self,
    key: &'a CacheKey,
  ) -> impl Future<Output = Result<bool, CacheError>> + Send + 'a;
}

/// Produces the fresh value for a key from the source of truth.
pub trait CacheLoader: Send + Sync {
  fn load<'a>(
    &'a self,
    key: &'a CacheKey,
  ) -> impl Future<Output = Result<Value, LoadError>> + Send + 'a;
}

/// In-process [`CacheStore`].
#[derive(Debug, Default)]
pub struct MemoryCache {
  entries: DashMap<String, Value>,
}

impl MemoryCache {
  pub fn new() -> Self { Self::default() }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl CacheStore for MemoryCache {
  async fn get(&self, key: &CacheKey) -> Result<Option<Value>, CacheError> {
    Ok(self.entries.get(&key.to_string()).map(|v| v.value().clone()))
  }

  async fn put_forever(&self, key: CacheKey, value: Value) -> Result<Value, CacheError> {
    Ok(self.entries.entry(key.to_string()).or_insert(value).value().clone())
  }

  async fn forget(&self, key: &CacheKey) -> Result<bool, CacheError> {
    Ok(self.entries.remove(&key.to_string()).is_some())
  }
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
  Cold,
  Warm,
}

pub struct CacheCoordinator<C, L> {
  cache:  Arc<C>,
  loader: Arc<L>,
}

impl<C, L> Clone for CacheCoordinator<C, L> {
  fn clone(&self) -> Self {
    Self { cache: Arc::clone(&self.cache), loader: Arc::clone(&self.loader) }
  }
}

impl<C: CacheStore, L: CacheLoader> CacheCoordinator<C, L> {
  pub fn new(cache: Arc<C>, loader: Arc<L>) -> Self { Self { cache, loader } }

  pub fn cache(&self) -> &Arc<C> { &self.cache }

  /// Read-through: return the cached value, or load, remember and return it.
  pub async fn remember(&self, key: CacheKey) -> Result<Value, LoadError> {
    match self.cache.get(&key).await {
      Ok(Some(v)) => return Ok(v),
      Ok(None) => {}
      Err(e) => {
        warn!(%key, error = %e, "cache read failed, loading from source");
        return self.loader.load(&key).await;
      }
    }

    let fresh = self.loader.load(&key).await?;
    match self.cache.put_forever(key.clone(), fresh.clone()).await {
      Ok(held) => Ok(held),
      Err(e) => {
        warn!(%key, error = %e, "cache write failed");
        Ok(fresh)
      }
    }
  }

  pub async fn state(&self, key: &CacheKey) -> CacheState {
    match self.cache.get(key).await {
      Ok(Some(_)) => CacheState::Warm,
      _ => CacheState::Cold,
    }
  }

  /// Forget every key made stale by the mutation. Returns how many keys held
  /// a value.
  pub async fn invalidate(&self, entity: EntityKind, mutation: Mutation, id: Option<&str>) -> usize {
    let mut removed = 0;
    for key in stale_keys(entity, mutation, id) {
      match self.cache.forget(&key).await {
        Ok(true) => removed += 1,
        Ok(false) => {}
        Err(e) => warn!(%key, error = %e, "cache forget failed"),
      }
    }
    debug!(%entity, %mutation, removed, "cache invalidated");
    removed
  }

  /// Pre-warm the entity's hottest keys. Returns how many were stored.
  pub async fn rebuild(&self, entity: EntityKind) -> usize {
    let mut warmed = 0;
    for key in warm_keys(entity) {
      let value = match self.loader.load(&key).await {
        Ok(v) => v,
        Err(e) => {
          warn!(%key, error = %e, "rebuild load failed");
          continue;
        }
      };
      match self.cache.put_forever(key.clone(), value).await {
        Ok(_) => warmed += 1,
        Err(e) => warn!(%key, error = %e, "rebuild write failed"),
      }
    }
    warmed
  }

  /// Invalidate, then rebuild for the two entities with hot listings.
  pub async fn on_mutation(&self, entity: EntityKind, mutation: Mutation, id: Option<&str>) {
    self.invalidate(entity, mutation, id).await;
    if matches!(entity, EntityKind::Episode | EntityKind::Anime) {
      self.rebuild(entity).await;
    }
  }
}
