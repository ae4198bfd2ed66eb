//! Error types for `kaiwa-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("comment content must not be empty")]
  EmptyContent,

  #[error("comment content exceeds {max} characters (got {len})")]
  ContentTooLong { len: usize, max: usize },

  #[error("parent comment {parent} belongs to a different episode")]
  ParentEpisodeMismatch { parent: Uuid },

  #[error("comment not found: {0}")]
  CommentNotFound(Uuid),

  #[error("parent comment not found: {0}")]
  ParentNotFound(Uuid),

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("notification not found: {0}")]
  NotificationNotFound(Uuid),

  #[error("authentication required")]
  Unauthenticated,

  #[error("user {user} is not the author of comment {comment}")]
  NotAuthor { user: Uuid, comment: Uuid },

  #[error("concurrent reaction on target {0}")]
  ReactionConflict(Uuid),

  #[error("unknown {kind} discriminant: {value:?}")]
  UnknownDiscriminant { kind: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// Coarse outcome class of an error, used by transport layers to choose a
/// status code without knowing the concrete backend error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Bad input shape or size.
  Validation,
  /// A referenced entity does not exist.
  NotFound,
  /// The actor is missing or lacks permission.
  Authorization,
  /// A concurrent write collided with this one.
  Conflict,
  /// Anything else; not the caller's fault.
  Internal,
}

/// Implemented by every error type that crosses the [`EngagementStore`]
/// boundary.
///
/// [`EngagementStore`]: crate::store::EngagementStore
pub trait Classify {
  fn kind(&self) -> ErrorKind;

  /// `true` when no user was authenticated, as opposed to an authenticated
  /// user lacking permission.
  fn is_unauthenticated(&self) -> bool { false }
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::EmptyContent
      | Self::ContentTooLong { .. }
      | Self::ParentEpisodeMismatch { .. } => ErrorKind::Validation,
      Self::CommentNotFound(_)
      | Self::ParentNotFound(_)
      | Self::UserNotFound(_)
      | Self::NotificationNotFound(_) => ErrorKind::NotFound,
      Self::Unauthenticated | Self::NotAuthor { .. } => ErrorKind::Authorization,
      Self::ReactionConflict(_) => ErrorKind::Conflict,
      Self::UnknownDiscriminant { .. } | Self::Serialization(_) => {
        ErrorKind::Internal
      }
    }
  }

  fn is_unauthenticated(&self) -> bool { matches!(self, Self::Unauthenticated) }
}
