//! Core types and the engagement service for Kaiwa, the episode discussion
//! backend.
//!
//! This crate is free of HTTP and database dependencies. Storage backends
//! implement [`store::EngagementStore`]; the HTTP layer drives
//! [`engagement::Engagement`].

// Native `async fn` in traits; `Send` bounds are spelled out where needed.
#![allow(async_fn_in_trait)]

pub mod cache;
pub mod comment;
pub mod engagement;
pub mod error;
pub mod fanout;
pub mod format;
pub mod history;
pub mod notification;
pub mod reaction;
pub mod store;
pub mod tree;
pub mod user;
pub mod watch_later;

pub use error::{Classify, Error, ErrorKind, Result};
