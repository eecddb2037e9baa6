//! crates/storyhaven_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the platform's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of the concrete database behind the gateway.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Bookmark, Chapter, Comment, ProgressUpdate, RatingStats, RatingValue, ReadingProgress, Story,
    User, UserCredentials,
};

/// A generic error type for all port operations. Concrete adapter errors
/// (database, network) are folded into these categories at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// An entry on the "continue reading" list: a progress row joined with
/// enough of the story to render a card.
#[derive(Debug, Clone)]
pub struct ProgressWithStory {
    pub progress: ReadingProgress,
    pub story: Story,
    pub chapter_slug: String,
}

/// The single data port for the platform. Reads normalize row shapes into
/// the canonical domain structs; writes are idempotent upserts wherever a
/// uniqueness key exists.
#[async_trait]
pub trait DataGateway: Send + Sync {
    // --- Stories ---
    async fn get_story_by_slug(&self, slug: &str) -> PortResult<Story>;
    async fn list_top_stories(&self, limit: i64, exclude: Option<Uuid>) -> PortResult<Vec<Story>>;
    async fn search_stories(&self, query: &str) -> PortResult<Vec<Story>>;
    async fn increment_story_views(&self, story_id: Uuid) -> PortResult<()>;

    // --- Chapters ---
    /// Chapters in canonical order: explicit sequence number first, then
    /// creation time, then id. The order is total so prev/next is always
    /// well-defined.
    async fn list_chapters(&self, story_id: Uuid) -> PortResult<Vec<Chapter>>;
    async fn get_chapter(&self, story_id: Uuid, chapter_slug: &str) -> PortResult<Chapter>;
    async fn create_chapter(
        &self,
        story_id: Uuid,
        title: &str,
        content: &str,
    ) -> PortResult<Chapter>;

    // --- Reading progress ---
    async fn upsert_reading_progress(&self, update: ProgressUpdate) -> PortResult<()>;
    async fn get_reading_progress(
        &self,
        user_id: Uuid,
        story_id: Uuid,
    ) -> PortResult<Option<ReadingProgress>>;
    async fn list_reading_progress(&self, user_id: Uuid) -> PortResult<Vec<ProgressWithStory>>;

    // --- Bookmarks ---
    async fn upsert_bookmark(
        &self,
        user_id: Uuid,
        story_id: Uuid,
        chapter_id: Option<Uuid>,
    ) -> PortResult<()>;
    async fn remove_bookmark(&self, user_id: Uuid, story_id: Uuid) -> PortResult<()>;
    async fn list_bookmarks(&self, user_id: Uuid) -> PortResult<Vec<(Bookmark, Story)>>;

    // --- Ratings ---
    async fn upsert_rating(
        &self,
        user_id: Uuid,
        story_id: Uuid,
        value: RatingValue,
    ) -> PortResult<()>;
    async fn rating_stats(&self, story_id: Uuid, viewer: Option<Uuid>) -> PortResult<RatingStats>;

    // --- Comments ---
    async fn add_comment(
        &self,
        chapter_id: Uuid,
        user_id: Option<Uuid>,
        content: &str,
    ) -> PortResult<Comment>;
    async fn list_comments(&self, chapter_id: Uuid) -> PortResult<Vec<Comment>>;

    // --- Auth ---
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;
    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;
    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

/// Validates comment content the way the gateway expects it: trimmed and
/// non-empty. Returns the trimmed text so the caller stores the canonical
/// form.
pub fn validate_comment(user_id: Option<Uuid>, content: &str) -> PortResult<&str> {
    if user_id.is_none() {
        return Err(PortError::Unauthorized);
    }
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(PortError::Validation(
            "comment content must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}
