//! crates/storyhaven_core/src/domain.rs
//!
//! Defines the pure, core data structures for the platform.
//! These structs are independent of any database or transport format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ports::{PortError, PortResult};

/// Publication status of a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryStatus {
    Ongoing,
    Completed,
}

impl StoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryStatus::Ongoing => "ongoing",
            StoryStatus::Completed => "completed",
        }
    }

    /// Parses the stored column value; anything unrecognised reads as ongoing
    /// so a stray row never breaks a listing page.
    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => StoryStatus::Completed,
            _ => StoryStatus::Ongoing,
        }
    }
}

/// A story as listed and read on the platform.
///
/// The slug is the canonical URL key; `cover_image` and `updated_at` are the
/// single canonical names for fields the source data spelled several ways.
#[derive(Debug, Clone, Serialize)]
pub struct Story {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub genres: Vec<String>,
    pub cover_image: Option<String>,
    pub status: StoryStatus,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One chapter of a story. Content is raw text, paragraph-delimited by
/// newlines. The slug is unique per story and is the only addressing scheme.
#[derive(Debug, Clone, Serialize)]
pub struct Chapter {
    pub id: Uuid,
    pub story_id: Uuid,
    pub slug: String,
    pub title: String,
    pub content: String,
    /// Explicit sequence number, when the author assigned one. Ordering
    /// falls back to creation time for chapters without it.
    pub number: Option<i32>,
    pub word_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Where a reader left off in a story. At most one row per (user, story);
/// writes are last-write-wins upserts on that pair.
#[derive(Debug, Clone, Serialize)]
pub struct ReadingProgress {
    pub user_id: Uuid,
    pub story_id: Uuid,
    pub chapter_id: Uuid,
    pub scroll_position: i64,
    pub updated_at: DateTime<Utc>,
}

/// Payload for a progress upsert. Offsets are clamped to zero at the edge so
/// a negative scroll report can never reach the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub user_id: Uuid,
    pub story_id: Uuid,
    pub chapter_id: Uuid,
    pub scroll_position: i64,
}

impl ProgressUpdate {
    pub fn new(user_id: Uuid, story_id: Uuid, chapter_id: Uuid, scroll_position: i64) -> Self {
        Self {
            user_id,
            story_id,
            chapter_id,
            scroll_position: scroll_position.max(0),
        }
    }
}

/// A server-synced bookmark: one per (user, story), optionally pinned to a
/// chapter. Removable, unlike reading progress.
#[derive(Debug, Clone, Serialize)]
pub struct Bookmark {
    pub user_id: Uuid,
    pub story_id: Uuid,
    pub chapter_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

/// A star rating, validated to 1..=5 before it can exist at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RatingValue(i16);

impl RatingValue {
    /// Rejects anything outside 1..=5 with a validation error, so an
    /// out-of-range value fails before any write is attempted.
    pub fn new(value: i16) -> PortResult<Self> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(PortError::Validation(format!(
                "rating must be between 1 and 5, got {value}"
            )))
        }
    }

    pub fn get(&self) -> i16 {
        self.0
    }
}

/// Aggregate rating for a story, plus the viewer's own vote when known.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RatingStats {
    pub average: f64,
    pub count: i64,
    /// The requesting user's own rating, 0 when they have not voted.
    pub mine: i16,
}

/// A reader comment on a chapter. Append-only.
#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub user_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// Represents a user - used throughout the app.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie).
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Counts whitespace-separated words, the derivation used when a chapter is
/// created and when the reader shows a word count.
pub fn word_count(content: &str) -> i32 {
    content.split_whitespace().count() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_value_accepts_one_through_five() {
        for v in 1..=5 {
            assert!(RatingValue::new(v).is_ok());
        }
    }

    #[test]
    fn rating_value_rejects_out_of_range() {
        for v in [0, 6, -1, 100] {
            let err = RatingValue::new(v).unwrap_err();
            assert!(matches!(err, PortError::Validation(_)));
        }
    }

    #[test]
    fn progress_update_clamps_negative_offsets() {
        let u = Uuid::new_v4();
        let s = Uuid::new_v4();
        let c = Uuid::new_v4();
        assert_eq!(ProgressUpdate::new(u, s, c, -40).scroll_position, 0);
        assert_eq!(ProgressUpdate::new(u, s, c, 800).scroll_position, 800);
    }

    #[test]
    fn word_count_ignores_blank_runs() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("  \n \t "), 0);
        assert_eq!(word_count("one two\nthree"), 3);
        assert_eq!(word_count("a  b   c"), 3);
    }

    #[test]
    fn story_status_parse_defaults_to_ongoing() {
        assert_eq!(StoryStatus::parse("completed"), StoryStatus::Completed);
        assert_eq!(StoryStatus::parse("ongoing"), StoryStatus::Ongoing);
        assert_eq!(StoryStatus::parse("hiatus?"), StoryStatus::Ongoing);
    }
}
