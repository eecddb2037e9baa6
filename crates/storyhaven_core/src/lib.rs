pub mod domain;
pub mod navigation;
pub mod ports;
pub mod prefs;
pub mod search;
pub mod sync;

pub use domain::{
    AuthSession, Bookmark, Chapter, Comment, ProgressUpdate, RatingStats, RatingValue,
    ReadingProgress, Story, StoryStatus, User, UserCredentials,
};
pub use navigation::{ChapterList, Neighbors};
pub use ports::{DataGateway, PortError, PortResult, ProgressWithStory};
pub use prefs::{LocalBookmark, LocalStore, ReadingPreferences};
pub use sync::{SyncEffect, SyncPhase, SyncSession};
