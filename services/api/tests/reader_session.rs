//! End-to-end tests for the reader session flow against an in-memory
//! gateway: anchoring, periodic saves, the final flush, and resume-point
//! seeding.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use api_lib::config::Config;
use api_lib::web::reader_task::perform_save;
use api_lib::web::state::{AppState, ReaderState};
use storyhaven_core::domain::{
    Bookmark, Chapter, Comment, ProgressUpdate, RatingStats, RatingValue, ReadingProgress, Story,
    StoryStatus, User, UserCredentials,
};
use storyhaven_core::ports::{DataGateway, PortError, PortResult, ProgressWithStory};
use storyhaven_core::sync::SyncEffect;

/// An in-memory gateway with one story and three chapters; progress rows
/// live in a map keyed by (user, story), exactly like the unique constraint
/// in the real schema.
struct MemoryGateway {
    story: Story,
    chapters: Vec<Chapter>,
    progress: std::sync::Mutex<HashMap<(Uuid, Uuid), ReadingProgress>>,
    fail_saves: std::sync::atomic::AtomicBool,
}

impl MemoryGateway {
    fn new() -> Self {
        let story_id = Uuid::new_v4();
        let base = Utc::now();
        let chapters = (1..=3)
            .map(|n| Chapter {
                id: Uuid::new_v4(),
                story_id,
                slug: format!("c{n}"),
                title: format!("Chapter {n}"),
                content: "line one\nline two".to_string(),
                number: Some(n),
                word_count: 4,
                created_at: base,
            })
            .collect();
        Self {
            story: Story {
                id: story_id,
                slug: "story-a".to_string(),
                title: "Story A".to_string(),
                author: Some("someone".to_string()),
                description: None,
                genres: vec!["fantasy".to_string()],
                cover_image: None,
                status: StoryStatus::Ongoing,
                views: 0,
                created_at: base,
                updated_at: base,
            },
            chapters,
            progress: std::sync::Mutex::new(HashMap::new()),
            fail_saves: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn saved(&self, user: Uuid, story: Uuid) -> Option<ReadingProgress> {
        self.progress.lock().unwrap().get(&(user, story)).cloned()
    }

    fn chapter(&self, slug: &str) -> &Chapter {
        self.chapters.iter().find(|c| c.slug == slug).unwrap()
    }
}

#[async_trait]
impl DataGateway for MemoryGateway {
    async fn get_story_by_slug(&self, slug: &str) -> PortResult<Story> {
        if slug == self.story.slug {
            Ok(self.story.clone())
        } else {
            Err(PortError::NotFound(format!("Story '{slug}' not found")))
        }
    }

    async fn list_top_stories(&self, _: i64, _: Option<Uuid>) -> PortResult<Vec<Story>> {
        Ok(vec![self.story.clone()])
    }

    async fn search_stories(&self, _: &str) -> PortResult<Vec<Story>> {
        Ok(vec![self.story.clone()])
    }

    async fn increment_story_views(&self, _: Uuid) -> PortResult<()> {
        Ok(())
    }

    async fn list_chapters(&self, story_id: Uuid) -> PortResult<Vec<Chapter>> {
        Ok(self
            .chapters
            .iter()
            .filter(|c| c.story_id == story_id)
            .cloned()
            .collect())
    }

    async fn get_chapter(&self, story_id: Uuid, chapter_slug: &str) -> PortResult<Chapter> {
        self.chapters
            .iter()
            .find(|c| c.story_id == story_id && c.slug == chapter_slug)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Chapter '{chapter_slug}' not found")))
    }

    async fn create_chapter(&self, _: Uuid, _: &str, _: &str) -> PortResult<Chapter> {
        unreachable!("not exercised by these tests")
    }

    async fn upsert_reading_progress(&self, update: ProgressUpdate) -> PortResult<()> {
        if self.fail_saves.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(PortError::Unexpected("simulated outage".to_string()));
        }
        let mut map = self.progress.lock().unwrap();
        map.insert(
            (update.user_id, update.story_id),
            ReadingProgress {
                user_id: update.user_id,
                story_id: update.story_id,
                chapter_id: update.chapter_id,
                scroll_position: update.scroll_position,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_reading_progress(
        &self,
        user_id: Uuid,
        story_id: Uuid,
    ) -> PortResult<Option<ReadingProgress>> {
        Ok(self.saved(user_id, story_id))
    }

    async fn list_reading_progress(&self, _: Uuid) -> PortResult<Vec<ProgressWithStory>> {
        Ok(Vec::new())
    }

    async fn upsert_bookmark(&self, _: Uuid, _: Uuid, _: Option<Uuid>) -> PortResult<()> {
        Ok(())
    }

    async fn remove_bookmark(&self, _: Uuid, _: Uuid) -> PortResult<()> {
        Ok(())
    }

    async fn list_bookmarks(&self, _: Uuid) -> PortResult<Vec<(Bookmark, Story)>> {
        Ok(Vec::new())
    }

    async fn upsert_rating(&self, _: Uuid, _: Uuid, _: RatingValue) -> PortResult<()> {
        Ok(())
    }

    async fn rating_stats(&self, _: Uuid, _: Option<Uuid>) -> PortResult<RatingStats> {
        Ok(RatingStats::default())
    }

    async fn add_comment(&self, _: Uuid, _: Option<Uuid>, _: &str) -> PortResult<Comment> {
        unreachable!("not exercised by these tests")
    }

    async fn list_comments(&self, _: Uuid) -> PortResult<Vec<Comment>> {
        Ok(Vec::new())
    }

    async fn create_user_with_email(&self, _: &str, _: &str) -> PortResult<User> {
        unreachable!("not exercised by these tests")
    }

    async fn get_user_by_email(&self, _: &str) -> PortResult<UserCredentials> {
        unreachable!("not exercised by these tests")
    }

    async fn create_auth_session(
        &self,
        _: &str,
        _: Uuid,
        _: DateTime<Utc>,
    ) -> PortResult<()> {
        Ok(())
    }

    async fn validate_auth_session(&self, _: &str) -> PortResult<Uuid> {
        Err(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, _: &str) -> PortResult<()> {
        Ok(())
    }
}

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        log_level: tracing::Level::INFO,
        cors_origin: "http://localhost:5173".to_string(),
        sync_interval: Duration::from_millis(10),
        session_ttl_days: 30,
    }
}

fn app_state(gateway: Arc<MemoryGateway>) -> Arc<AppState> {
    Arc::new(AppState {
        gateway,
        config: Arc::new(test_config()),
    })
}

#[tokio::test]
async fn session_persists_last_offset_through_flush() {
    let gateway = Arc::new(MemoryGateway::new());
    let state = app_state(gateway.clone());
    let user = Uuid::new_v4();

    let (reader, resume, initial_save) =
        ReaderState::new(state.clone(), Some(user), "story-a", "c2")
            .await
            .unwrap();
    assert_eq!(resume, None);
    let reader_lock = Arc::new(AsyncMutex::new(reader));

    // The immediate save anchors the resume point at offset 0.
    if let Some(SyncEffect::Save(update)) = initial_save {
        perform_save(&state, &reader_lock, update).await;
    }
    let saved = gateway.saved(user, gateway.story.id).unwrap();
    assert_eq!(saved.chapter_id, gateway.chapter("c2").id);
    assert_eq!(saved.scroll_position, 0);

    // Scroll to 800, let one interval elapse, then close the view.
    {
        let mut reader = reader_lock.lock().await;
        reader.sync.observe_scroll(800);
    }
    let tick_save = reader_lock.lock().await.sync.tick();
    if let Some(SyncEffect::Save(update)) = tick_save {
        perform_save(&state, &reader_lock, update).await;
    }
    let final_save = reader_lock.lock().await.sync.finish();
    if let Some(SyncEffect::Save(update)) = final_save {
        perform_save(&state, &reader_lock, update).await;
    }

    let saved = gateway.saved(user, gateway.story.id).unwrap();
    assert_eq!(saved.chapter_id, gateway.chapter("c2").id);
    assert_eq!(saved.scroll_position, 800);
}

#[tokio::test]
async fn reopening_the_same_chapter_seeds_the_resume_point() {
    let gateway = Arc::new(MemoryGateway::new());
    let state = app_state(gateway.clone());
    let user = Uuid::new_v4();

    gateway
        .upsert_reading_progress(ProgressUpdate::new(
            user,
            gateway.story.id,
            gateway.chapter("c2").id,
            800,
        ))
        .await
        .unwrap();

    let (_, resume, _) = ReaderState::new(state.clone(), Some(user), "story-a", "c2")
        .await
        .unwrap();
    assert_eq!(resume, Some(800));

    // A different chapter of the same story must not restore.
    let (_, resume, _) = ReaderState::new(state, Some(user), "story-a", "c3")
        .await
        .unwrap();
    assert_eq!(resume, None);
}

#[tokio::test]
async fn anonymous_session_never_writes_progress() {
    let gateway = Arc::new(MemoryGateway::new());
    let state = app_state(gateway.clone());

    let (reader, resume, initial_save) = ReaderState::new(state, None, "story-a", "c1")
        .await
        .unwrap();
    assert_eq!(resume, None);
    assert!(initial_save.is_none());

    let mut reader = reader;
    reader.sync.observe_scroll(500);
    assert!(reader.sync.tick().is_none());
    assert!(reader.sync.finish().is_none());
    assert!(gateway.progress.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_save_is_dropped_and_next_tick_recovers() {
    let gateway = Arc::new(MemoryGateway::new());
    let state = app_state(gateway.clone());
    let user = Uuid::new_v4();

    let (reader, _, initial_save) = ReaderState::new(state.clone(), Some(user), "story-a", "c1")
        .await
        .unwrap();
    let reader_lock = Arc::new(AsyncMutex::new(reader));

    // First save hits a simulated outage; it is logged and dropped.
    gateway
        .fail_saves
        .store(true, std::sync::atomic::Ordering::SeqCst);
    if let Some(SyncEffect::Save(update)) = initial_save {
        perform_save(&state, &reader_lock, update).await;
    }
    assert!(gateway.saved(user, gateway.story.id).is_none());

    // The outage ends; the next tick retries with fresh data.
    gateway
        .fail_saves
        .store(false, std::sync::atomic::Ordering::SeqCst);
    {
        let mut reader = reader_lock.lock().await;
        reader.sync.observe_scroll(120);
    }
    let tick_save = reader_lock.lock().await.sync.tick();
    if let Some(SyncEffect::Save(update)) = tick_save {
        perform_save(&state, &reader_lock, update).await;
    }
    assert_eq!(
        gateway.saved(user, gateway.story.id).unwrap().scroll_position,
        120
    );
}

#[tokio::test]
async fn unknown_chapter_fails_to_anchor() {
    let gateway = Arc::new(MemoryGateway::new());
    let state = app_state(gateway);

    let err = match ReaderState::new(state, None, "story-a", "c99").await {
        Ok(_) => panic!("anchoring an unknown chapter should fail"),
        Err(err) => err,
    };
    assert!(matches!(err, PortError::NotFound(_)));
}
