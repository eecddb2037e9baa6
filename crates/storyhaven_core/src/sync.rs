//! crates/storyhaven_core/src/sync.rs
//!
//! The reading-progress synchronizer.
//!
//! A pure state machine for one reading session: it samples the scroll
//! offset, emits at most one save per timer tick, and guarantees a final
//! flush when the session ends. The timer itself belongs to the driver (a
//! tokio interval in the service, a hand-advanced loop in tests), so the
//! machine can be exercised against a virtual clock.

use uuid::Uuid;

use crate::domain::ProgressUpdate;

/// Lifecycle of a synchronizer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No chapter anchored yet, or the session is over.
    Idle,
    /// Anchored to a chapter; sampling on ticks.
    Tracking,
    /// Final save emitted; waiting for nothing further.
    Flushing,
}

/// An effect the driver must perform. Saves are fire-and-forget from the
/// reader's point of view, but the driver reports completion back through
/// [`SyncSession::ack_save`] so overlapping writes can be skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEffect {
    Save(ProgressUpdate),
}

/// Per-session synchronizer state.
///
/// Remote saves happen only for an authenticated user; an anonymous session
/// is a remote no-op while local bookmark capture proceeds independently.
#[derive(Debug)]
pub struct SyncSession {
    user_id: Option<Uuid>,
    story_id: Uuid,
    chapter_id: Uuid,
    phase: SyncPhase,
    last_offset: i64,
    save_in_flight: bool,
}

impl SyncSession {
    /// Anchors a session to a chapter and emits the immediate resume-point
    /// save, so the position is captured even if the reader never scrolls.
    pub fn start(
        user_id: Option<Uuid>,
        story_id: Uuid,
        chapter_id: Uuid,
        initial_offset: i64,
    ) -> (Self, Option<SyncEffect>) {
        let mut session = Self {
            user_id,
            story_id,
            chapter_id,
            phase: SyncPhase::Tracking,
            last_offset: initial_offset.max(0),
            save_in_flight: false,
        };
        let effect = session.emit_save();
        (session, effect)
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn last_offset(&self) -> i64 {
        self.last_offset
    }

    /// Records the newest scroll offset. Scroll events fire far more often
    /// than is worth persisting; nothing is written until the next tick.
    pub fn observe_scroll(&mut self, offset: i64) {
        if self.phase == SyncPhase::Tracking {
            self.last_offset = offset.max(0);
        }
    }

    /// One timer tick: sample and save. A tick while the previous save is
    /// still unacknowledged emits nothing, so writes for the same
    /// (user, story) key never race each other out of order.
    pub fn tick(&mut self) -> Option<SyncEffect> {
        if self.phase != SyncPhase::Tracking {
            return None;
        }
        self.emit_save()
    }

    /// The driver reports the outcome of the last save. A failure is simply
    /// dropped; the next tick retries with fresh data.
    pub fn ack_save(&mut self, _ok: bool) {
        self.save_in_flight = false;
        if self.phase == SyncPhase::Flushing {
            self.phase = SyncPhase::Idle;
        }
    }

    /// Re-anchors the session to a new chapter (reader navigation). Emits a
    /// final save for the old chapter and the resume-point save for the new
    /// one.
    pub fn navigate(&mut self, chapter_id: Uuid, initial_offset: i64) -> Vec<SyncEffect> {
        let mut effects = Vec::new();
        if self.phase == SyncPhase::Tracking {
            // Flush the old chapter position first, ignoring the overlap
            // guard: an idempotent upsert on teardown is always safe.
            self.save_in_flight = false;
            if let Some(e) = self.emit_save() {
                effects.push(e);
            }
        }
        self.chapter_id = chapter_id;
        self.last_offset = initial_offset.max(0);
        self.phase = SyncPhase::Tracking;
        self.save_in_flight = false;
        if let Some(e) = self.emit_save() {
            effects.push(e);
        }
        effects
    }

    /// Ends the session: cancels ticking and emits one final save with the
    /// last known offset, even if it falls between timer ticks.
    pub fn finish(&mut self) -> Option<SyncEffect> {
        if self.phase != SyncPhase::Tracking {
            return None;
        }
        self.phase = SyncPhase::Flushing;
        self.save_in_flight = false;
        let effect = self.emit_save();
        if effect.is_none() {
            self.phase = SyncPhase::Idle;
        }
        effect
    }

    fn emit_save(&mut self) -> Option<SyncEffect> {
        if self.save_in_flight {
            return None;
        }
        let user_id = self.user_id?;
        self.save_in_flight = true;
        Some(SyncEffect::Save(ProgressUpdate::new(
            user_id,
            self.story_id,
            self.chapter_id,
            self.last_offset,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (Uuid, Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
    }

    fn expect_save(effect: Option<SyncEffect>) -> ProgressUpdate {
        match effect {
            Some(SyncEffect::Save(update)) => update,
            None => panic!("expected a save effect"),
        }
    }

    #[test]
    fn start_emits_immediate_resume_point() {
        let (user, story, chapter) = ids();
        let (session, effect) = SyncSession::start(Some(user), story, chapter, 0);
        let update = expect_save(effect);
        assert_eq!(update.chapter_id, chapter);
        assert_eq!(update.scroll_position, 0);
        assert_eq!(session.phase(), SyncPhase::Tracking);
    }

    #[test]
    fn anonymous_session_emits_no_remote_saves() {
        let (_, story, chapter) = ids();
        let (mut session, effect) = SyncSession::start(None, story, chapter, 120);
        assert!(effect.is_none());
        session.observe_scroll(500);
        assert!(session.tick().is_none());
        assert!(session.finish().is_none());
        // The offset is still tracked for local bookmark capture.
        assert_eq!(session.last_offset(), 500);
    }

    #[test]
    fn tick_samples_latest_offset_once_per_interval() {
        let (user, story, chapter) = ids();
        let (mut session, first) = SyncSession::start(Some(user), story, chapter, 0);
        session.ack_save(true);
        let _ = expect_save(first);

        // Many scroll events between ticks collapse into one write.
        for offset in [100, 340, 780, 800] {
            session.observe_scroll(offset);
        }
        let update = expect_save(session.tick());
        assert_eq!(update.scroll_position, 800);
    }

    #[test]
    fn tick_is_skipped_while_a_save_is_in_flight() {
        let (user, story, chapter) = ids();
        let (mut session, _) = SyncSession::start(Some(user), story, chapter, 0);
        // The initial save has not been acknowledged yet.
        session.observe_scroll(300);
        assert!(session.tick().is_none());

        session.ack_save(true);
        let update = expect_save(session.tick());
        assert_eq!(update.scroll_position, 300);
    }

    #[test]
    fn failed_save_is_dropped_and_retried_next_tick() {
        let (user, story, chapter) = ids();
        let (mut session, _) = SyncSession::start(Some(user), story, chapter, 0);
        session.ack_save(false);

        session.observe_scroll(250);
        let update = expect_save(session.tick());
        assert_eq!(update.scroll_position, 250);
    }

    #[test]
    fn finish_flushes_last_offset_between_ticks() {
        let (user, story, chapter) = ids();
        let (mut session, _) = SyncSession::start(Some(user), story, chapter, 0);
        session.ack_save(true);
        session.observe_scroll(800);

        let update = expect_save(session.finish());
        assert_eq!(update.scroll_position, 800);
        assert_eq!(session.phase(), SyncPhase::Flushing);

        session.ack_save(true);
        assert_eq!(session.phase(), SyncPhase::Idle);
        assert!(session.tick().is_none());
    }

    #[test]
    fn scrolls_after_finish_are_ignored() {
        let (user, story, chapter) = ids();
        let (mut session, _) = SyncSession::start(Some(user), story, chapter, 0);
        session.ack_save(true);
        session.observe_scroll(400);
        let _ = session.finish();
        session.observe_scroll(9000);
        assert_eq!(session.last_offset(), 400);
    }

    #[test]
    fn navigate_flushes_old_chapter_and_anchors_new_one() {
        let (user, story, c1) = ids();
        let c2 = Uuid::new_v4();
        let (mut session, _) = SyncSession::start(Some(user), story, c1, 0);
        session.ack_save(true);
        session.observe_scroll(620);

        let effects = session.navigate(c2, 0);
        assert_eq!(effects.len(), 2);
        let SyncEffect::Save(flush) = &effects[0];
        assert_eq!(flush.chapter_id, c1);
        assert_eq!(flush.scroll_position, 620);
        let SyncEffect::Save(anchor) = &effects[1];
        assert_eq!(anchor.chapter_id, c2);
        assert_eq!(anchor.scroll_position, 0);
        assert_eq!(session.phase(), SyncPhase::Tracking);
    }

    #[test]
    fn reading_scenario_c2_offset_800_survives_the_session() {
        // Story A has chapters [c1, c2, c3]; reading c2, scrolling to 800,
        // one interval passes, then the view closes. The last persisted
        // update must be (c2, 800).
        let (user, story, _) = ids();
        let c2 = Uuid::new_v4();
        let mut persisted: Option<ProgressUpdate> = None;

        let (mut session, effect) = SyncSession::start(Some(user), story, c2, 0);
        if let Some(SyncEffect::Save(u)) = effect {
            persisted = Some(u);
            session.ack_save(true);
        }

        session.observe_scroll(800);
        if let Some(SyncEffect::Save(u)) = session.tick() {
            persisted = Some(u);
            session.ack_save(true);
        }
        if let Some(SyncEffect::Save(u)) = session.finish() {
            persisted = Some(u);
            session.ack_save(true);
        }

        let last = persisted.unwrap();
        assert_eq!(last.chapter_id, c2);
        assert_eq!(last.scroll_position, 800);
    }
}
