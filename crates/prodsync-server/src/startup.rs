//! Automatic catalogue load at server startup.

use tokio::task::JoinHandle;

use prodsync_core::AppError;

use crate::config::LoadOnStartup;
use crate::state::AppState;

/// Decides whether to load, given the mode and the emptiness check (only
/// performed for `IfEmpty`). A failed check skips the load.
fn should_load(mode: LoadOnStartup, index_empty: Option<Result<bool, AppError>>) -> bool {
    match mode {
        LoadOnStartup::Never => false,
        LoadOnStartup::Always => true,
        LoadOnStartup::IfEmpty => match index_empty {
            Some(Ok(empty)) => empty,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Could not check product index, skipping startup load");
                false
            }
            None => false,
        },
    }
}

/// Starts a background full load according to `mode`.
///
/// Returns the task driving the load, or `None` if no load was started.
/// The task stops waiting when the shutdown token is cancelled; the run
/// itself is not interrupted.
pub async fn spawn_startup_load(state: &AppState, mode: LoadOnStartup) -> Option<JoinHandle<()>> {
    let index_empty = match mode {
        LoadOnStartup::IfEmpty => Some(state.ingestion.is_index_empty().await),
        _ => None,
    };

    if !should_load(mode, index_empty) {
        tracing::info!(mode = ?mode, "Skipping startup data load");
        return None;
    }

    tracing::info!(mode = ?mode, "Starting startup data load");
    let handle = state.ingestion.start_full_ingestion();
    let shutdown = state.shutdown_token.clone();

    Some(tokio::spawn(async move {
        tokio::select! {
            result = handle => {
                if result.success {
                    tracing::info!(message = %result.message, "Startup data load finished");
                } else {
                    tracing::error!(message = %result.message, "Startup data load failed");
                }
            }
            _ = shutdown.cancelled() => {
                tracing::info!("Shutdown requested during startup data load");
            }
        }
    }))
}
