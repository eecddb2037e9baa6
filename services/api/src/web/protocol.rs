//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the reader client and the
//! API server for a reading session.

use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client (Reader) TO the Server
//=========================================================================================

/// Structured text messages a client can send during a reading session.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens a session on a specific chapter. Must be the first message.
    Init {
        story_slug: String,
        chapter_slug: String,
    },

    /// Reports the current scroll offset. Sent freely; the server samples it
    /// on a timer rather than persisting every report.
    Scroll { position: i64 },

    /// Moves the session to another chapter of the same story. The old
    /// chapter's position is flushed before the session re-anchors.
    Navigate { chapter_slug: String },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Reader)
//=========================================================================================

/// Structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the session is anchored. `resume_position` is set only when
    /// saved progress exists for this exact chapter, so the client can
    /// scroll there once layout has settled.
    SessionReady {
        story_slug: String,
        chapter_slug: String,
        chapter_title: String,
        word_count: i32,
        resume_position: Option<i64>,
        previous: Option<String>,
        next: Option<String>,
    },

    /// The session moved to another chapter after a `Navigate` request.
    ChapterChanged {
        chapter_slug: String,
        chapter_title: String,
        word_count: i32,
        previous: Option<String>,
        next: Option<String>,
    },

    /// Reports an error to the client. Progress-save failures are never
    /// surfaced this way; they are logged and retried on the next tick.
    Error { message: String },
}
