//! services/api/src/adapters/db.rs
//!
//! The database adapter: the concrete implementation of the `DataGateway`
//! port from the core crate, over PostgreSQL via `sqlx`.
//!
//! Row shapes are normalized here. The canonical column names
//! (`cover_image`, `updated_at`) are the only spellings that exist past this
//! boundary; queries are runtime-checked so the crate builds without a live
//! database.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use storyhaven_core::domain::{
    Bookmark, Chapter, Comment, ProgressUpdate, RatingStats, RatingValue, ReadingProgress, Story,
    StoryStatus, User, UserCredentials,
};
use storyhaven_core::navigation::{dedup_slug, slugify};
use storyhaven_core::ports::{
    validate_comment, DataGateway, PortError, PortResult, ProgressWithStory,
};

/// A database adapter that implements the `DataGateway` port.
#[derive(Clone)]
pub struct PgGateway {
    pool: PgPool,
}

impl PgGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found(what: impl Into<String>) -> impl FnOnce(sqlx::Error) -> PortError {
    let what = what.into();
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        other => unexpected(other),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct StoryRecord {
    id: Uuid,
    slug: String,
    title: String,
    author: Option<String>,
    description: Option<String>,
    genres: Vec<String>,
    cover_image: Option<String>,
    status: String,
    views: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoryRecord {
    fn to_domain(self) -> Story {
        Story {
            id: self.id,
            slug: self.slug,
            title: self.title,
            author: self.author,
            description: self.description,
            genres: self.genres,
            cover_image: self.cover_image,
            status: StoryStatus::parse(&self.status),
            views: self.views,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const STORY_COLUMNS: &str =
    "id, slug, title, author, description, genres, cover_image, status, views, created_at, updated_at";

#[derive(FromRow)]
struct ChapterRecord {
    id: Uuid,
    story_id: Uuid,
    slug: String,
    title: String,
    content: String,
    number: Option<i32>,
    word_count: i32,
    created_at: DateTime<Utc>,
}

impl ChapterRecord {
    fn to_domain(self) -> Chapter {
        Chapter {
            id: self.id,
            story_id: self.story_id,
            slug: self.slug,
            title: self.title,
            content: self.content,
            number: self.number,
            word_count: self.word_count,
            created_at: self.created_at,
        }
    }
}

const CHAPTER_COLUMNS: &str =
    "id, story_id, slug, title, content, number, word_count, created_at";

#[derive(FromRow)]
struct ProgressRecord {
    user_id: Uuid,
    story_id: Uuid,
    chapter_id: Uuid,
    scroll_position: i64,
    updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    fn to_domain(self) -> ReadingProgress {
        ReadingProgress {
            user_id: self.user_id,
            story_id: self.story_id,
            chapter_id: self.chapter_id,
            scroll_position: self.scroll_position,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CommentRecord {
    id: Uuid,
    chapter_id: Uuid,
    user_id: Option<Uuid>,
    content: String,
    created_at: DateTime<Utc>,
}

impl CommentRecord {
    fn to_domain(self) -> Comment {
        Comment {
            id: self.id,
            chapter_id: self.chapter_id,
            user_id: self.user_id,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct RatingStatsRecord {
    avg_rating: Option<f64>,
    rating_count: Option<i64>,
}

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: Option<String>,
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

//=========================================================================================
// `DataGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl DataGateway for PgGateway {
    async fn get_story_by_slug(&self, slug: &str) -> PortResult<Story> {
        let sql = format!("SELECT {STORY_COLUMNS} FROM stories WHERE slug = $1");
        let record = sqlx::query_as::<_, StoryRecord>(&sql)
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found(format!("Story '{slug}' not found")))?;
        Ok(record.to_domain())
    }

    async fn list_top_stories(&self, limit: i64, exclude: Option<Uuid>) -> PortResult<Vec<Story>> {
        // Views descending, id ascending as a deterministic tiebreak.
        let sql = format!(
            "SELECT {STORY_COLUMNS} FROM stories \
             WHERE ($2::uuid IS NULL OR id <> $2) \
             ORDER BY views DESC, id ASC LIMIT $1"
        );
        let records = sqlx::query_as::<_, StoryRecord>(&sql)
            .bind(limit)
            .bind(exclude)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn search_stories(&self, query: &str) -> PortResult<Vec<Story>> {
        let pattern = format!("%{}%", query.trim());
        let sql = format!(
            "SELECT {STORY_COLUMNS} FROM stories \
             WHERE title ILIKE $1 OR author ILIKE $1 \
                OR EXISTS (SELECT 1 FROM unnest(genres) g WHERE g ILIKE $1) \
             ORDER BY views DESC, id ASC"
        );
        let records = sqlx::query_as::<_, StoryRecord>(&sql)
            .bind(pattern)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn increment_story_views(&self, story_id: Uuid) -> PortResult<()> {
        sqlx::query("UPDATE stories SET views = views + 1 WHERE id = $1")
            .bind(story_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_chapters(&self, story_id: Uuid) -> PortResult<Vec<Chapter>> {
        let sql = format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE story_id = $1 \
             ORDER BY number ASC NULLS LAST, created_at ASC, id ASC"
        );
        let records = sqlx::query_as::<_, ChapterRecord>(&sql)
            .bind(story_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_chapter(&self, story_id: Uuid, chapter_slug: &str) -> PortResult<Chapter> {
        let sql = format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE story_id = $1 AND slug = $2"
        );
        let record = sqlx::query_as::<_, ChapterRecord>(&sql)
            .bind(story_id)
            .bind(chapter_slug)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found(format!("Chapter '{chapter_slug}' not found")))?;
        Ok(record.to_domain())
    }

    async fn create_chapter(
        &self,
        story_id: Uuid,
        title: &str,
        content: &str,
    ) -> PortResult<Chapter> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Lock the story row so concurrent uploads serialize on slug dedup
        // and chapter numbering.
        sqlx::query("SELECT id FROM stories WHERE id = $1 FOR UPDATE")
            .bind(story_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(not_found(format!("Story '{story_id}' not found")))?;

        let taken: HashSet<String> =
            sqlx::query_scalar::<_, String>("SELECT slug FROM chapters WHERE story_id = $1")
                .bind(story_id)
                .fetch_all(&mut *tx)
                .await
                .map_err(unexpected)?
                .into_iter()
                .collect();
        let slug = dedup_slug(&slugify(title), &taken);
        let word_count = storyhaven_core::domain::word_count(content);

        let sql = format!(
            "INSERT INTO chapters (story_id, slug, title, content, number, word_count) \
             VALUES ($1, $2, $3, $4, \
                     (SELECT COALESCE(MAX(number), 0) + 1 FROM chapters WHERE story_id = $1), \
                     $5) \
             RETURNING {CHAPTER_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ChapterRecord>(&sql)
            .bind(story_id)
            .bind(&slug)
            .bind(title)
            .bind(content)
            .bind(word_count)
            .fetch_one(&mut *tx)
            .await
            .map_err(unexpected)?;

        // A new chapter bumps the story's "last updated" timestamp.
        sqlx::query("UPDATE stories SET updated_at = now() WHERE id = $1")
            .bind(story_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn upsert_reading_progress(&self, update: ProgressUpdate) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO reading_progress (user_id, story_id, chapter_id, scroll_position, updated_at) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (user_id, story_id) DO UPDATE \
             SET chapter_id = EXCLUDED.chapter_id, \
                 scroll_position = EXCLUDED.scroll_position, \
                 updated_at = now()",
        )
        .bind(update.user_id)
        .bind(update.story_id)
        .bind(update.chapter_id)
        .bind(update.scroll_position)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_reading_progress(
        &self,
        user_id: Uuid,
        story_id: Uuid,
    ) -> PortResult<Option<ReadingProgress>> {
        let record = sqlx::query_as::<_, ProgressRecord>(
            "SELECT user_id, story_id, chapter_id, scroll_position, updated_at \
             FROM reading_progress WHERE user_id = $1 AND story_id = $2",
        )
        .bind(user_id)
        .bind(story_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn list_reading_progress(&self, user_id: Uuid) -> PortResult<Vec<ProgressWithStory>> {
        #[derive(FromRow)]
        struct Row {
            user_id: Uuid,
            story_id: Uuid,
            chapter_id: Uuid,
            scroll_position: i64,
            updated_at: DateTime<Utc>,
            chapter_slug: String,
            id: Uuid,
            slug: String,
            title: String,
            author: Option<String>,
            description: Option<String>,
            genres: Vec<String>,
            cover_image: Option<String>,
            status: String,
            views: i64,
            story_created_at: DateTime<Utc>,
            story_updated_at: DateTime<Utc>,
        }

        let rows = sqlx::query_as::<_, Row>(
            "SELECT rp.user_id, rp.story_id, rp.chapter_id, rp.scroll_position, rp.updated_at, \
                    c.slug AS chapter_slug, \
                    s.id, s.slug, s.title, s.author, s.description, s.genres, s.cover_image, \
                    s.status, s.views, \
                    s.created_at AS story_created_at, s.updated_at AS story_updated_at \
             FROM reading_progress rp \
             JOIN stories s ON s.id = rp.story_id \
             JOIN chapters c ON c.id = rp.chapter_id \
             WHERE rp.user_id = $1 \
             ORDER BY rp.updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(rows
            .into_iter()
            .map(|r| ProgressWithStory {
                progress: ReadingProgress {
                    user_id: r.user_id,
                    story_id: r.story_id,
                    chapter_id: r.chapter_id,
                    scroll_position: r.scroll_position,
                    updated_at: r.updated_at,
                },
                chapter_slug: r.chapter_slug,
                story: Story {
                    id: r.id,
                    slug: r.slug,
                    title: r.title,
                    author: r.author,
                    description: r.description,
                    genres: r.genres,
                    cover_image: r.cover_image,
                    status: StoryStatus::parse(&r.status),
                    views: r.views,
                    created_at: r.story_created_at,
                    updated_at: r.story_updated_at,
                },
            })
            .collect())
    }

    async fn upsert_bookmark(
        &self,
        user_id: Uuid,
        story_id: Uuid,
        chapter_id: Option<Uuid>,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO bookmarks (user_id, story_id, chapter_id, updated_at) \
             VALUES ($1, $2, $3, now()) \
             ON CONFLICT (user_id, story_id) DO UPDATE \
             SET chapter_id = EXCLUDED.chapter_id, updated_at = now()",
        )
        .bind(user_id)
        .bind(story_id)
        .bind(chapter_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn remove_bookmark(&self, user_id: Uuid, story_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM bookmarks WHERE user_id = $1 AND story_id = $2")
            .bind(user_id)
            .bind(story_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_bookmarks(&self, user_id: Uuid) -> PortResult<Vec<(Bookmark, Story)>> {
        #[derive(FromRow)]
        struct Row {
            user_id: Uuid,
            story_id: Uuid,
            chapter_id: Option<Uuid>,
            bookmark_updated_at: DateTime<Utc>,
            id: Uuid,
            slug: String,
            title: String,
            author: Option<String>,
            description: Option<String>,
            genres: Vec<String>,
            cover_image: Option<String>,
            status: String,
            views: i64,
            created_at: DateTime<Utc>,
            updated_at: DateTime<Utc>,
        }

        let rows = sqlx::query_as::<_, Row>(
            "SELECT b.user_id, b.story_id, b.chapter_id, \
                    b.updated_at AS bookmark_updated_at, \
                    s.id, s.slug, s.title, s.author, s.description, s.genres, s.cover_image, \
                    s.status, s.views, s.created_at, s.updated_at \
             FROM bookmarks b \
             JOIN stories s ON s.id = b.story_id \
             WHERE b.user_id = $1 \
             ORDER BY b.updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    Bookmark {
                        user_id: r.user_id,
                        story_id: r.story_id,
                        chapter_id: r.chapter_id,
                        updated_at: r.bookmark_updated_at,
                    },
                    Story {
                        id: r.id,
                        slug: r.slug,
                        title: r.title,
                        author: r.author,
                        description: r.description,
                        genres: r.genres,
                        cover_image: r.cover_image,
                        status: StoryStatus::parse(&r.status),
                        views: r.views,
                        created_at: r.created_at,
                        updated_at: r.updated_at,
                    },
                )
            })
            .collect())
    }

    async fn upsert_rating(
        &self,
        user_id: Uuid,
        story_id: Uuid,
        value: RatingValue,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO story_ratings (user_id, story_id, value, updated_at) \
             VALUES ($1, $2, $3, now()) \
             ON CONFLICT (user_id, story_id) DO UPDATE \
             SET value = EXCLUDED.value, updated_at = now()",
        )
        .bind(user_id)
        .bind(story_id)
        .bind(value.get())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn rating_stats(&self, story_id: Uuid, viewer: Option<Uuid>) -> PortResult<RatingStats> {
        let stats = sqlx::query_as::<_, RatingStatsRecord>(
            "SELECT avg_rating, rating_count FROM story_rating_stats WHERE story_id = $1",
        )
        .bind(story_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        let mine = match viewer {
            Some(user_id) => sqlx::query_scalar::<_, i16>(
                "SELECT value FROM story_ratings WHERE story_id = $1 AND user_id = $2",
            )
            .bind(story_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .unwrap_or(0),
            None => 0,
        };

        let (average, count) = stats
            .map(|s| (s.avg_rating.unwrap_or(0.0), s.rating_count.unwrap_or(0)))
            .unwrap_or((0.0, 0));

        Ok(RatingStats {
            average,
            count,
            mine,
        })
    }

    async fn add_comment(
        &self,
        chapter_id: Uuid,
        user_id: Option<Uuid>,
        content: &str,
    ) -> PortResult<Comment> {
        let trimmed = validate_comment(user_id, content)?;
        let record = sqlx::query_as::<_, CommentRecord>(
            "INSERT INTO comments (chapter_id, user_id, content) VALUES ($1, $2, $3) \
             RETURNING id, chapter_id, user_id, content, created_at",
        )
        .bind(chapter_id)
        .bind(user_id)
        .bind(trimmed)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_comments(&self, chapter_id: Uuid) -> PortResult<Vec<Comment>> {
        let records = sqlx::query_as::<_, CommentRecord>(
            "SELECT id, chapter_id, user_id, content, created_at \
             FROM comments WHERE chapter_id = $1 ORDER BY created_at ASC",
        )
        .bind(chapter_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (email, hashed_password) VALUES ($1, $2) \
             RETURNING user_id, email",
        )
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|d| d.is_unique_violation())
            {
                PortError::Validation("email is already registered".to_string())
            } else {
                unexpected(e)
            }
        })?;
        Ok(User {
            user_id: record.user_id,
            email: record.email,
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("User '{email}' not found")))?;
        Ok(UserCredentials {
            user_id: record.user_id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
