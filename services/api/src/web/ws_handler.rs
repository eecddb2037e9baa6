//! services/api/src/web/ws_handler.rs
//!
//! The entry point and control loop for a reader-session WebSocket
//! connection: anchor on a chapter, sample scroll reports on a timer, and
//! flush the final position when the reader leaves.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::web::{
    middleware::MaybeUser,
    protocol::{ClientMessage, ServerMessage},
    reader_task::{perform_save, sync_loop},
    state::{AppState, ReaderState},
};
use storyhaven_core::sync::SyncEffect;

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// The handler for upgrading HTTP requests to WebSocket connections.
/// Anonymous readers are accepted; their sessions simply perform no remote
/// progress writes.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(MaybeUser(user_id)): Extension<MaybeUser>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user_id))
}

async fn send_msg(sender: &WsSender, msg: &ServerMessage) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return false;
        }
    };
    sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .is_ok()
}

fn session_ready(reader: &ReaderState, resume: Option<i64>) -> ServerMessage {
    let neighbors = reader.chapters.neighbors(&reader.current_chapter.slug);
    ServerMessage::SessionReady {
        story_slug: reader.story.slug.clone(),
        chapter_slug: reader.current_chapter.slug.clone(),
        chapter_title: reader.current_chapter.title.clone(),
        word_count: reader.current_chapter.word_count,
        resume_position: resume,
        previous: neighbors.previous.map(|c| c.slug.clone()),
        next: neighbors.next.map(|c| c.slug.clone()),
    }
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Option<uuid::Uuid>) {
    info!("New reader session established (user: {:?}).", user_id);

    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Initialization Phase ---
    let reader_lock: Arc<Mutex<ReaderState>>;
    if let Some(Ok(Message::Text(init_json))) = receiver.next().await {
        match serde_json::from_str::<ClientMessage>(&init_json) {
            Ok(ClientMessage::Init {
                story_slug,
                chapter_slug,
            }) => {
                match ReaderState::new(app_state.clone(), user_id, &story_slug, &chapter_slug).await
                {
                    Ok((reader, resume, initial_save)) => {
                        let ready = session_ready(&reader, resume);
                        reader_lock = Arc::new(Mutex::new(reader));
                        if !send_msg(&ws_sender, &ready).await {
                            error!("Failed to send session ready message.");
                            return;
                        }
                        // The immediate save captures the resume point even
                        // if the reader never scrolls.
                        if let Some(SyncEffect::Save(update)) = initial_save {
                            perform_save(&app_state, &reader_lock, update).await;
                        }
                    }
                    Err(e) => {
                        info!("Failed to anchor reader session: {:?}", e);
                        let _ = send_msg(
                            &ws_sender,
                            &ServerMessage::Error {
                                message: "Story or chapter not found.".to_string(),
                            },
                        )
                        .await;
                        return;
                    }
                }
            }
            _ => {
                warn!("First message was not a valid Init message.");
                return;
            }
        }
    } else {
        info!("Client disconnected before sending Init message.");
        return;
    }

    // --- 2. Background Sync Task ---
    let cancellation_token = reader_lock.lock().await.cancellation_token.clone();
    let sync_task = tokio::spawn(sync_loop(
        app_state.clone(),
        reader_lock.clone(),
        cancellation_token.clone(),
    ));

    // --- 3. Main Message Loop ---
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                handle_text_message(text.to_string(), &app_state, &reader_lock, &ws_sender).await;
            }
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => {}
        }
    }

    // --- 4. Teardown: cancel the timer, flush the last known position ---
    cancellation_token.cancel();
    let final_save = {
        let mut reader = reader_lock.lock().await;
        reader.sync.finish()
    };
    if let Some(SyncEffect::Save(update)) = final_save {
        perform_save(&app_state, &reader_lock, update).await;
    }
    let _ = sync_task.await;
    info!("Reader session closed.");
}

/// Handles the logic for the different `ClientMessage` variants after init.
async fn handle_text_message(
    text: String,
    app_state: &Arc<AppState>,
    reader_lock: &Arc<Mutex<ReaderState>>,
    ws_sender: &WsSender,
) {
    match serde_json::from_str::<ClientMessage>(&text) {
        Ok(ClientMessage::Scroll { position }) => {
            let mut reader = reader_lock.lock().await;
            reader.sync.observe_scroll(position);
        }
        Ok(ClientMessage::Navigate { chapter_slug }) => {
            let (effects, changed) = {
                let mut reader = reader_lock.lock().await;
                let Some(chapter) = reader.chapters.resolve(&chapter_slug).cloned() else {
                    drop(reader);
                    let _ = send_msg(
                        ws_sender,
                        &ServerMessage::Error {
                            message: format!("Chapter '{chapter_slug}' not found."),
                        },
                    )
                    .await;
                    return;
                };
                let effects = reader.sync.navigate(chapter.id, 0);
                reader.current_chapter = chapter;
                let neighbors = reader.chapters.neighbors(&chapter_slug);
                let changed = ServerMessage::ChapterChanged {
                    chapter_slug: reader.current_chapter.slug.clone(),
                    chapter_title: reader.current_chapter.title.clone(),
                    word_count: reader.current_chapter.word_count,
                    previous: neighbors.previous.map(|c| c.slug.clone()),
                    next: neighbors.next.map(|c| c.slug.clone()),
                };
                (effects, changed)
            };

            for effect in effects {
                let SyncEffect::Save(update) = effect;
                perform_save(app_state, reader_lock, update).await;
            }
            let _ = send_msg(ws_sender, &changed).await;
        }
        Ok(ClientMessage::Init { .. }) => {
            warn!("Received subsequent Init message, which is ignored.");
        }
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
        }
    }
}
