//! Display helpers shared by notifications, history metadata and the comment
//! tree.

use chrono::{DateTime, Utc};

/// Keep at most `max` characters of `text`. When anything is cut, the last
/// kept character is replaced by `…` so the result never exceeds `max`.
pub fn snippet(text: &str, max: usize) -> String {
  if text.chars().count() <= max {
    return text.to_owned();
  }
  if max == 0 {
    return String::new();
  }
  let mut out: String = text.chars().take(max - 1).collect();
  out.push('…');
  out
}

/// Human relative time, e.g. `"5 minutes ago"`.
///
/// Timestamps in the future (clock skew between writers) render as
/// `"just now"`.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
  let secs = (now - then).num_seconds();
  if secs < 1 {
    return "just now".to_owned();
  }

  const MINUTE: i64 = 60;
  const HOUR: i64 = 60 * MINUTE;
  const DAY: i64 = 24 * HOUR;
  const WEEK: i64 = 7 * DAY;
  const MONTH: i64 = 30 * DAY;
  const YEAR: i64 = 365 * DAY;

  let (n, unit) = match secs {
    s if s < MINUTE => (s, "second"),
    s if s < HOUR => (s / MINUTE, "minute"),
    s if s < DAY => (s / HOUR, "hour"),
    s if s < WEEK => (s / DAY, "day"),
    s if s < MONTH => (s / WEEK, "week"),
    s if s < YEAR => (s / MONTH, "month"),
    s => (s / YEAR, "year"),
  };

  if n == 1 {
    format!("1 {unit} ago")
  } else {
    format!("{n} {unit}s ago")
  }
}
