//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-connection reader
//! session state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Config;
use storyhaven_core::domain::{Chapter, Story};
use storyhaven_core::navigation::ChapterList;
use storyhaven_core::ports::{DataGateway, PortResult};
use storyhaven_core::sync::{SyncEffect, SyncSession};

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all
/// handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn DataGateway>,
    pub config: Arc<Config>,
}

//=========================================================================================
// ReaderState (Specific to One WebSocket Connection)
//=========================================================================================

/// The state for a single, active reader session: the resolved story, its
/// ordered chapters, and the progress synchronizer anchored to the current
/// chapter.
#[derive(Debug)]
pub struct ReaderState {
    pub user_id: Option<Uuid>,
    pub story: Story,
    pub chapters: ChapterList,
    pub current_chapter: Chapter,
    pub sync: SyncSession,
    /// Cancels the background synchronizer task on teardown.
    pub cancellation_token: CancellationToken,
}

impl ReaderState {
    /// Resolves the story and chapter and anchors a synchronizer session.
    ///
    /// The saved progress row, if any, seeds the resume point — but only
    /// when it refers to this exact chapter; a position saved in a different
    /// chapter of the same story must not scroll this one.
    pub async fn new(
        app_state: Arc<AppState>,
        user_id: Option<Uuid>,
        story_slug: &str,
        chapter_slug: &str,
    ) -> PortResult<(Self, Option<i64>, Option<SyncEffect>)> {
        let story = app_state.gateway.get_story_by_slug(story_slug).await?;
        let chapters = ChapterList::new(app_state.gateway.list_chapters(story.id).await?);
        let current_chapter = app_state.gateway.get_chapter(story.id, chapter_slug).await?;

        let resume = match user_id {
            Some(uid) => app_state
                .gateway
                .get_reading_progress(uid, story.id)
                .await?
                .filter(|p| p.chapter_id == current_chapter.id && p.scroll_position > 0)
                .map(|p| p.scroll_position),
            None => None,
        };

        let (sync, initial_save) =
            SyncSession::start(user_id, story.id, current_chapter.id, resume.unwrap_or(0));

        let state = Self {
            user_id,
            story,
            chapters,
            current_chapter,
            sync,
            cancellation_token: CancellationToken::new(),
        };
        Ok((state, resume, initial_save))
    }
}
