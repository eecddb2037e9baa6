//! services/api/src/web/reader_task.rs
//!
//! The background "worker" for a reader session: a fixed-interval timer
//! that samples the session's scroll offset and persists it through the
//! gateway.
//!
//! The interval is a deliberate debounce — scroll reports arrive far more
//! often than is worth persisting, so write volume is bounded to one upsert
//! per tick regardless of scroll frequency. A failed upsert is logged and
//! dropped; the next tick retries with fresh data.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::web::state::{AppState, ReaderState};
use storyhaven_core::domain::ProgressUpdate;
use storyhaven_core::sync::SyncEffect;

/// Runs the periodic sync loop until the session is cancelled. The final
/// flush on teardown is performed by the connection handler, not here, so
/// cancellation can never race it.
pub async fn sync_loop(
    app_state: Arc<AppState>,
    reader_lock: Arc<Mutex<ReaderState>>,
    cancellation_token: CancellationToken,
) {
    let mut interval = tokio::time::interval(app_state.config.sync_interval);
    // The first tick of a tokio interval fires immediately; the initial
    // resume-point save has already been emitted, so skip it.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                debug!("Reader sync loop cancelled.");
                return;
            }
            _ = interval.tick() => {
                let effect = {
                    let mut reader = reader_lock.lock().await;
                    reader.sync.tick()
                };
                if let Some(SyncEffect::Save(update)) = effect {
                    perform_save(&app_state, &reader_lock, update).await;
                }
            }
        }
    }
}

/// Performs one progress upsert and reports the outcome back to the state
/// machine so the overlap guard can release.
pub async fn perform_save(
    app_state: &Arc<AppState>,
    reader_lock: &Arc<Mutex<ReaderState>>,
    update: ProgressUpdate,
) {
    let result = app_state.gateway.upsert_reading_progress(update).await;
    if let Err(e) = &result {
        // Not surfaced to the reader; the position simply isn't saved yet.
        warn!("Failed to save reading progress: {:?}", e);
    }
    let mut reader = reader_lock.lock().await;
    reader.sync.ack_save(result.is_ok());
}
