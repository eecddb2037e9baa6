//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::web::middleware::{CurrentUser, MaybeUser};
use crate::web::state::AppState;
use storyhaven_core::domain::{Chapter, ProgressUpdate, RatingStats, RatingValue, Story};
use storyhaven_core::navigation::ChapterList;
use storyhaven_core::ports::PortError;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_stories_handler,
        top_stories_handler,
        story_detail_handler,
        chapter_handler,
        create_chapter_handler,
        list_comments_handler,
        add_comment_handler,
        rating_handler,
        upsert_rating_handler,
        upsert_bookmark_handler,
        remove_bookmark_handler,
        save_progress_handler,
        my_progress_handler,
        my_bookmarks_handler,
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
    ),
    components(schemas(
        StorySummary,
        StoryDetailResponse,
        ChapterSummary,
        ChapterResponse,
        CommentBody,
        AddCommentRequest,
        RatingStatsBody,
        RateRequest,
        BookmarkRequest,
        SaveProgressRequest,
        ProgressEntry,
        CreateChapterRequest,
        crate::web::auth::SignupRequest,
        crate::web::auth::LoginRequest,
        crate::web::auth::AuthResponse,
    )),
    tags(
        (name = "Storyhaven API", description = "Browsing, reading, and progress endpoints for the story platform.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A story as rendered on listing pages and cards.
#[derive(Serialize, ToSchema)]
pub struct StorySummary {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub genres: Vec<String>,
    pub cover_image: Option<String>,
    pub status: String,
    pub views: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<Story> for StorySummary {
    fn from(story: Story) -> Self {
        Self {
            id: story.id,
            slug: story.slug,
            title: story.title,
            author: story.author,
            description: story.description,
            genres: story.genres,
            cover_image: story.cover_image,
            status: story.status.as_str().to_string(),
            views: story.views,
            updated_at: story.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ChapterSummary {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub number: Option<i32>,
    pub word_count: i32,
    pub created_at: DateTime<Utc>,
}

impl From<&Chapter> for ChapterSummary {
    fn from(c: &Chapter) -> Self {
        Self {
            id: c.id,
            slug: c.slug.clone(),
            title: c.title.clone(),
            number: c.number,
            word_count: c.word_count,
            created_at: c.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RatingStatsBody {
    pub average: f64,
    pub count: i64,
    /// The requesting user's own vote, 0 when absent or anonymous.
    pub mine: i16,
}

impl From<RatingStats> for RatingStatsBody {
    fn from(s: RatingStats) -> Self {
        Self {
            average: s.average,
            count: s.count,
            mine: s.mine,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct StoryDetailResponse {
    #[serde(flatten)]
    pub story: StorySummary,
    pub rating: RatingStatsBody,
    pub chapters: Vec<ChapterSummary>,
}

#[derive(Serialize, ToSchema)]
pub struct ChapterResponse {
    pub id: Uuid,
    pub story_slug: String,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub word_count: i32,
    pub previous: Option<String>,
    pub next: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CommentBody {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub user_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, ToSchema)]
pub struct AddCommentRequest {
    pub content: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RateRequest {
    pub value: i16,
}

#[derive(Deserialize, ToSchema)]
pub struct BookmarkRequest {
    /// Chapter to pin the bookmark to; omitted bookmarks point at the story.
    pub chapter_slug: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SaveProgressRequest {
    pub chapter_slug: String,
    pub scroll_position: i64,
}

#[derive(Serialize, ToSchema)]
pub struct ProgressEntry {
    pub story: StorySummary,
    pub chapter_slug: String,
    pub scroll_position: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateChapterRequest {
    pub title: String,
    pub content: String,
}

#[derive(Deserialize, IntoParams)]
pub struct ListStoriesParams {
    /// Case-insensitive search over title, author, and genres.
    pub q: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct TopStoriesParams {
    pub limit: Option<i64>,
    pub exclude: Option<Uuid>,
}

/// Maps a port error onto the HTTP taxonomy: not-found renders a 404 page
/// state, validation is rejected with a 400 before any write, and auth
/// failures prompt a login.
fn port_error_response(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Login required".to_string()),
        PortError::Unexpected(msg) => {
            error!("Gateway error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

//=========================================================================================
// Story Browsing
//=========================================================================================

/// List stories, optionally filtered by a search query.
#[utoipa::path(
    get,
    path = "/stories",
    params(ListStoriesParams),
    responses((status = 200, description = "Matching stories", body = [StorySummary]))
)]
pub async fn list_stories_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListStoriesParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let query = params.q.unwrap_or_default();
    let stories = state
        .gateway
        .search_stories(&query)
        .await
        .map_err(port_error_response)?;
    let body: Vec<StorySummary> = stories.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// Top stories by view count, with a deterministic id tiebreak.
#[utoipa::path(
    get,
    path = "/stories/top",
    params(TopStoriesParams),
    responses((status = 200, description = "Most-viewed stories", body = [StorySummary]))
)]
pub async fn top_stories_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TopStoriesParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let limit = params.limit.unwrap_or(5).clamp(1, 50);
    let stories = state
        .gateway
        .list_top_stories(limit, params.exclude)
        .await
        .map_err(port_error_response)?;
    let body: Vec<StorySummary> = stories.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// Story detail: the story, its ordered chapters, and aggregate rating.
/// Viewing a story bumps its view counter.
#[utoipa::path(
    get,
    path = "/stories/{slug}",
    params(("slug" = String, Path, description = "Story slug")),
    responses(
        (status = 200, description = "Story with chapters", body = StoryDetailResponse),
        (status = 404, description = "Story not found")
    )
)]
pub async fn story_detail_handler(
    State(state): State<Arc<AppState>>,
    Extension(MaybeUser(viewer)): Extension<MaybeUser>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let story = state
        .gateway
        .get_story_by_slug(&slug)
        .await
        .map_err(port_error_response)?;

    // Best effort; a failed bump never blocks the page.
    if let Err(e) = state.gateway.increment_story_views(story.id).await {
        warn!("Failed to increment views for {}: {:?}", story.id, e);
    }

    let chapters = ChapterList::new(
        state
            .gateway
            .list_chapters(story.id)
            .await
            .map_err(port_error_response)?,
    );
    let rating = state
        .gateway
        .rating_stats(story.id, viewer)
        .await
        .map_err(port_error_response)?;

    let body = StoryDetailResponse {
        chapters: chapters.chapters().iter().map(Into::into).collect(),
        rating: rating.into(),
        story: story.into(),
    };
    Ok(Json(body))
}

//=========================================================================================
// Chapters
//=========================================================================================

/// A chapter with its content and prev/next navigation, all addressed by
/// the canonical per-story slug.
#[utoipa::path(
    get,
    path = "/stories/{slug}/chapters/{chapter_slug}",
    params(
        ("slug" = String, Path, description = "Story slug"),
        ("chapter_slug" = String, Path, description = "Chapter slug")
    ),
    responses(
        (status = 200, description = "Chapter content", body = ChapterResponse),
        (status = 404, description = "Story or chapter not found")
    )
)]
pub async fn chapter_handler(
    State(state): State<Arc<AppState>>,
    Path((slug, chapter_slug)): Path<(String, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let story = state
        .gateway
        .get_story_by_slug(&slug)
        .await
        .map_err(port_error_response)?;
    let chapters = ChapterList::new(
        state
            .gateway
            .list_chapters(story.id)
            .await
            .map_err(port_error_response)?,
    );
    let chapter = chapters
        .resolve(&chapter_slug)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Chapter '{chapter_slug}' not found")))?;
    let neighbors = chapters.neighbors(&chapter_slug);

    let body = ChapterResponse {
        id: chapter.id,
        story_slug: story.slug,
        slug: chapter.slug.clone(),
        title: chapter.title.clone(),
        content: chapter.content.clone(),
        word_count: chapter.word_count,
        previous: neighbors.previous.map(|c| c.slug.clone()),
        next: neighbors.next.map(|c| c.slug.clone()),
    };
    Ok(Json(body))
}

/// Author upload: appends a chapter with a deduplicated slug and the next
/// sequence number.
#[utoipa::path(
    post,
    path = "/stories/{slug}/chapters",
    params(("slug" = String, Path, description = "Story slug")),
    request_body = CreateChapterRequest,
    responses(
        (status = 201, description = "Chapter created", body = ChapterSummary),
        (status = 400, description = "Empty title or content"),
        (status = 401, description = "Login required"),
        (status = 404, description = "Story not found")
    )
)]
pub async fn create_chapter_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(_user_id)): Extension<CurrentUser>,
    Path(slug): Path<String>,
    Json(req): Json<CreateChapterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.title.trim().is_empty() || req.content.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Chapter title and content must not be empty".to_string(),
        ));
    }
    let story = state
        .gateway
        .get_story_by_slug(&slug)
        .await
        .map_err(port_error_response)?;
    let chapter = state
        .gateway
        .create_chapter(story.id, req.title.trim(), &req.content)
        .await
        .map_err(port_error_response)?;
    Ok((StatusCode::CREATED, Json(ChapterSummary::from(&chapter))))
}

//=========================================================================================
// Comments
//=========================================================================================

/// Comments on a chapter, oldest first.
#[utoipa::path(
    get,
    path = "/chapters/{chapter_id}/comments",
    params(("chapter_id" = Uuid, Path, description = "Chapter id")),
    responses((status = 200, description = "Comments", body = [CommentBody]))
)]
pub async fn list_comments_handler(
    State(state): State<Arc<AppState>>,
    Path(chapter_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let comments = state
        .gateway
        .list_comments(chapter_id)
        .await
        .map_err(port_error_response)?;
    let body: Vec<CommentBody> = comments
        .into_iter()
        .map(|c| CommentBody {
            id: c.id,
            chapter_id: c.chapter_id,
            user_id: c.user_id,
            content: c.content,
            created_at: c.created_at,
        })
        .collect();
    Ok(Json(body))
}

/// Posts a comment. Empty or whitespace-only content is rejected before any
/// write; anonymous requests are rejected with 401.
#[utoipa::path(
    post,
    path = "/chapters/{chapter_id}/comments",
    params(("chapter_id" = Uuid, Path, description = "Chapter id")),
    request_body = AddCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentBody),
        (status = 400, description = "Empty content"),
        (status = 401, description = "Login required")
    )
)]
pub async fn add_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(MaybeUser(user_id)): Extension<MaybeUser>,
    Path(chapter_id): Path<Uuid>,
    Json(req): Json<AddCommentRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // An anonymous request fails with Unauthorized before any write.
    let comment = state
        .gateway
        .add_comment(chapter_id, user_id, &req.content)
        .await
        .map_err(port_error_response)?;
    let body = CommentBody {
        id: comment.id,
        chapter_id: comment.chapter_id,
        user_id: comment.user_id,
        content: comment.content,
        created_at: comment.created_at,
    };
    Ok((StatusCode::CREATED, Json(body)))
}

//=========================================================================================
// Ratings
//=========================================================================================

/// Aggregate rating for a story plus the viewer's own vote.
#[utoipa::path(
    get,
    path = "/stories/{slug}/rating",
    params(("slug" = String, Path, description = "Story slug")),
    responses(
        (status = 200, description = "Rating stats", body = RatingStatsBody),
        (status = 404, description = "Story not found")
    )
)]
pub async fn rating_handler(
    State(state): State<Arc<AppState>>,
    Extension(MaybeUser(viewer)): Extension<MaybeUser>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let story = state
        .gateway
        .get_story_by_slug(&slug)
        .await
        .map_err(port_error_response)?;
    let stats = state
        .gateway
        .rating_stats(story.id, viewer)
        .await
        .map_err(port_error_response)?;
    Ok(Json(RatingStatsBody::from(stats)))
}

/// Submits or replaces the user's rating. A value outside 1..=5 fails
/// validation before any write; re-rating overwrites the single row and the
/// returned stats reflect only the latest value per user.
#[utoipa::path(
    put,
    path = "/stories/{slug}/rating",
    params(("slug" = String, Path, description = "Story slug")),
    request_body = RateRequest,
    responses(
        (status = 200, description = "Updated stats", body = RatingStatsBody),
        (status = 400, description = "Value out of range"),
        (status = 401, description = "Login required"),
        (status = 404, description = "Story not found")
    )
)]
pub async fn upsert_rating_handler(
    State(state): State<Arc<AppState>>,
    Extension(MaybeUser(viewer)): Extension<MaybeUser>,
    Path(slug): Path<String>,
    Json(req): Json<RateRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = viewer.ok_or_else(|| port_error_response(PortError::Unauthorized))?;
    let value = RatingValue::new(req.value).map_err(port_error_response)?;
    let story = state
        .gateway
        .get_story_by_slug(&slug)
        .await
        .map_err(port_error_response)?;
    state
        .gateway
        .upsert_rating(user_id, story.id, value)
        .await
        .map_err(port_error_response)?;
    let stats = state
        .gateway
        .rating_stats(story.id, Some(user_id))
        .await
        .map_err(port_error_response)?;
    Ok(Json(RatingStatsBody::from(stats)))
}

//=========================================================================================
// Bookmarks and Progress
//=========================================================================================

/// Bookmarks a story (one per user and story; re-bookmarking replaces).
#[utoipa::path(
    put,
    path = "/stories/{slug}/bookmark",
    params(("slug" = String, Path, description = "Story slug")),
    request_body = BookmarkRequest,
    responses(
        (status = 204, description = "Bookmark saved"),
        (status = 401, description = "Login required"),
        (status = 404, description = "Story or chapter not found")
    )
)]
pub async fn upsert_bookmark_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(slug): Path<String>,
    Json(req): Json<BookmarkRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let story = state
        .gateway
        .get_story_by_slug(&slug)
        .await
        .map_err(port_error_response)?;
    let chapter_id = match req.chapter_slug {
        Some(chapter_slug) => Some(
            state
                .gateway
                .get_chapter(story.id, &chapter_slug)
                .await
                .map_err(port_error_response)?
                .id,
        ),
        None => None,
    };
    state
        .gateway
        .upsert_bookmark(user_id, story.id, chapter_id)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Removes a bookmark.
#[utoipa::path(
    delete,
    path = "/stories/{slug}/bookmark",
    params(("slug" = String, Path, description = "Story slug")),
    responses(
        (status = 204, description = "Bookmark removed"),
        (status = 401, description = "Login required"),
        (status = 404, description = "Story not found")
    )
)]
pub async fn remove_bookmark_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let story = state
        .gateway
        .get_story_by_slug(&slug)
        .await
        .map_err(port_error_response)?;
    state
        .gateway
        .remove_bookmark(user_id, story.id)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Direct progress save for clients that do not hold a reader session open.
/// Idempotent last-write-wins on the (user, story) key.
#[utoipa::path(
    put,
    path = "/stories/{slug}/progress",
    params(("slug" = String, Path, description = "Story slug")),
    request_body = SaveProgressRequest,
    responses(
        (status = 204, description = "Progress saved"),
        (status = 401, description = "Login required"),
        (status = 404, description = "Story or chapter not found")
    )
)]
pub async fn save_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(slug): Path<String>,
    Json(req): Json<SaveProgressRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let story = state
        .gateway
        .get_story_by_slug(&slug)
        .await
        .map_err(port_error_response)?;
    let chapter = state
        .gateway
        .get_chapter(story.id, &req.chapter_slug)
        .await
        .map_err(port_error_response)?;
    state
        .gateway
        .upsert_reading_progress(ProgressUpdate::new(
            user_id,
            story.id,
            chapter.id,
            req.scroll_position,
        ))
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// The "continue reading" list: most recently read first.
#[utoipa::path(
    get,
    path = "/me/progress",
    responses(
        (status = 200, description = "Reading progress entries", body = [ProgressEntry]),
        (status = 401, description = "Login required")
    )
)]
pub async fn my_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let entries = state
        .gateway
        .list_reading_progress(user_id)
        .await
        .map_err(port_error_response)?;
    let body: Vec<ProgressEntry> = entries
        .into_iter()
        .map(|e| ProgressEntry {
            story: e.story.into(),
            chapter_slug: e.chapter_slug,
            scroll_position: e.progress.scroll_position,
            updated_at: e.progress.updated_at,
        })
        .collect();
    Ok(Json(body))
}

/// The user's bookmarked stories, most recently bookmarked first.
#[utoipa::path(
    get,
    path = "/me/bookmarks",
    responses(
        (status = 200, description = "Bookmarked stories", body = [StorySummary]),
        (status = 401, description = "Login required")
    )
)]
pub async fn my_bookmarks_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let bookmarks = state
        .gateway
        .list_bookmarks(user_id)
        .await
        .map_err(port_error_response)?;
    let body: Vec<StorySummary> = bookmarks
        .into_iter()
        .map(|(_, story)| story.into())
        .collect();
    Ok(Json(body))
}
