//! crates/storyhaven_core/src/prefs.rs
//!
//! Client-local reading preferences and the local bookmark map.
//!
//! This store has no network dependency: it is a synchronous cache loaded
//! once at startup from a serialized blob and written back on every change.
//! It keeps the reading experience working fully offline, independently of
//! the remote gateway.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const FONT_SIZE_MIN: u8 = 12;
pub const FONT_SIZE_MAX: u8 = 24;
pub const FONT_SIZE_DEFAULT: u8 = 16;

/// User-tunable reading preferences that should survive restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingPreferences {
    pub font_size: u8,
    pub dark_mode: bool,
}

impl Default for ReadingPreferences {
    fn default() -> Self {
        Self {
            font_size: FONT_SIZE_DEFAULT,
            dark_mode: false,
        }
    }
}

impl ReadingPreferences {
    /// Sets the font size, clamped to [`FONT_SIZE_MIN`, `FONT_SIZE_MAX`].
    pub fn set_font_size(&mut self, size: u8) {
        self.font_size = size.clamp(FONT_SIZE_MIN, FONT_SIZE_MAX);
    }

    /// Steps the font size by `delta`, saturating at the bounds.
    pub fn adjust_font_size(&mut self, delta: i8) {
        let next = self.font_size as i16 + delta as i16;
        self.set_font_size(next.clamp(0, u8::MAX as i16) as u8);
    }
}

/// One bookmark per story, keyed by the story slug. Adding a bookmark for a
/// story replaces any previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalBookmark {
    pub story_slug: String,
    pub chapter_slug: String,
    pub scroll_position: u64,
}

/// The serialized shape of the whole local state. Unknown fields in an old
/// blob are ignored; missing fields take defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LocalState {
    #[serde(default)]
    preferences: ReadingPreferences,
    #[serde(default)]
    bookmarks: HashMap<String, LocalBookmark>,
}

/// Abstract persistence backend for the local state blob.
pub trait StorageBackend {
    fn load(&mut self) -> io::Result<Option<String>>;
    fn save(&mut self, blob: &str) -> io::Result<()>;
}

/// JSON file on disk, the durable backend for a real client.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StorageBackend for FileStorage {
    fn load(&mut self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&mut self, blob: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, blob)
    }
}

/// In-memory backend for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStorage {
    blob: Option<String>,
}

impl StorageBackend for MemoryStorage {
    fn load(&mut self) -> io::Result<Option<String>> {
        Ok(self.blob.clone())
    }

    fn save(&mut self, blob: &str) -> io::Result<()> {
        self.blob = Some(blob.to_string());
        Ok(())
    }
}

/// The local store: preferences plus the bookmark map, persisted through a
/// [`StorageBackend`] on every mutation.
pub struct LocalStore<B: StorageBackend> {
    state: LocalState,
    backend: B,
}

impl<B: StorageBackend> LocalStore<B> {
    /// Loads the store once at startup. A missing or corrupt blob falls back
    /// to defaults rather than failing the caller.
    pub fn load(mut backend: B) -> Self {
        let state = match backend.load() {
            Ok(Some(blob)) => serde_json::from_str(&blob).unwrap_or_default(),
            _ => LocalState::default(),
        };
        Self { state, backend }
    }

    pub fn preferences(&self) -> ReadingPreferences {
        self.state.preferences
    }

    /// Applies a preference change and persists the whole state.
    pub fn update_preferences(&mut self, apply: impl FnOnce(&mut ReadingPreferences)) {
        apply(&mut self.state.preferences);
        // clamp even if the closure wrote the field directly
        let size = self.state.preferences.font_size;
        self.state.preferences.set_font_size(size);
        self.persist();
    }

    /// Replaces any existing bookmark for the same story slug.
    pub fn add_bookmark(&mut self, bookmark: LocalBookmark) {
        self.state
            .bookmarks
            .insert(bookmark.story_slug.clone(), bookmark);
        self.persist();
    }

    pub fn bookmark(&self, story_slug: &str) -> Option<&LocalBookmark> {
        self.state.bookmarks.get(story_slug)
    }

    pub fn remove_bookmark(&mut self, story_slug: &str) -> Option<LocalBookmark> {
        let removed = self.state.bookmarks.remove(story_slug);
        if removed.is_some() {
            self.persist();
        }
        removed
    }

    /// Serializes the current state; exposed so callers can snapshot it.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.state).unwrap_or_else(|_| "{}".to_string())
    }

    fn persist(&mut self) {
        let blob = self.to_json();
        // A failed local write is not fatal; the in-memory state stays
        // authoritative for this run.
        let _ = self.backend.save(&blob);
    }
}

/// Decides whether a stored bookmark should scroll the reader on entry:
/// only when it points at this exact (story, chapter) pair and has a
/// meaningful offset. Entering a different chapter of the same story must
/// not trigger a restore.
pub fn restore_target<B: StorageBackend>(
    store: &LocalStore<B>,
    story_slug: &str,
    chapter_slug: &str,
) -> Option<u64> {
    let bm = store.bookmark(story_slug)?;
    if bm.chapter_slug == chapter_slug && bm.scroll_position > 0 {
        Some(bm.scroll_position)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> LocalStore<MemoryStorage> {
        LocalStore::load(MemoryStorage::default())
    }

    #[test]
    fn font_size_clamps_at_both_bounds() {
        let mut prefs = ReadingPreferences::default();
        prefs.set_font_size(24);
        prefs.adjust_font_size(2);
        assert_eq!(prefs.font_size, 24);

        prefs.set_font_size(12);
        prefs.adjust_font_size(-2);
        assert_eq!(prefs.font_size, 12);

        prefs.set_font_size(40);
        assert_eq!(prefs.font_size, 24);
        prefs.set_font_size(3);
        assert_eq!(prefs.font_size, 12);
    }

    #[test]
    fn add_bookmark_replaces_previous_entry_for_story() {
        let mut s = store();
        s.add_bookmark(LocalBookmark {
            story_slug: "a".into(),
            chapter_slug: "c1".into(),
            scroll_position: 100,
        });
        s.add_bookmark(LocalBookmark {
            story_slug: "a".into(),
            chapter_slug: "c2".into(),
            scroll_position: 250,
        });
        let bm = s.bookmark("a").unwrap();
        assert_eq!(bm.chapter_slug, "c2");
        assert_eq!(bm.scroll_position, 250);
    }

    #[test]
    fn restore_only_for_exact_chapter() {
        let mut s = store();
        s.add_bookmark(LocalBookmark {
            story_slug: "a".into(),
            chapter_slug: "c2".into(),
            scroll_position: 800,
        });
        assert_eq!(restore_target(&s, "a", "c2"), Some(800));
        assert_eq!(restore_target(&s, "a", "c3"), None);
        assert_eq!(restore_target(&s, "b", "c2"), None);
    }

    #[test]
    fn restore_ignores_zero_offset() {
        let mut s = store();
        s.add_bookmark(LocalBookmark {
            story_slug: "a".into(),
            chapter_slug: "c1".into(),
            scroll_position: 0,
        });
        assert_eq!(restore_target(&s, "a", "c1"), None);
    }

    #[test]
    fn state_round_trips_through_the_backend() {
        let mut backend = MemoryStorage::default();
        {
            let mut s = LocalStore::load(std::mem::take(&mut backend));
            s.update_preferences(|p| p.dark_mode = true);
            s.add_bookmark(LocalBookmark {
                story_slug: "a".into(),
                chapter_slug: "c1".into(),
                scroll_position: 42,
            });
            backend = s.backend;
        }
        let s = LocalStore::load(backend);
        assert!(s.preferences().dark_mode);
        assert_eq!(s.bookmark("a").unwrap().scroll_position, 42);
    }

    #[test]
    fn corrupt_blob_falls_back_to_defaults() {
        let mut backend = MemoryStorage::default();
        backend.save("not json at all").unwrap();
        let s = LocalStore::load(backend);
        assert_eq!(s.preferences(), ReadingPreferences::default());
        assert!(s.bookmark("a").is_none());
    }

    #[test]
    fn file_storage_persists_across_loads() {
        let path = std::env::temp_dir().join(format!(
            "storyhaven-prefs-{}.json",
            uuid::Uuid::new_v4()
        ));
        {
            let mut s = LocalStore::load(FileStorage::new(&path));
            s.update_preferences(|p| p.font_size = 20);
        }
        let s = LocalStore::load(FileStorage::new(&path));
        assert_eq!(s.preferences().font_size, 20);
        let _ = std::fs::remove_file(&path);
    }
}
