use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::engine::{Engine, EngineError};

/// Background task that re-reads a tenant's dataset whenever its files change.
pub async fn run_reloader(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; the engine was just loaded.
    interval.tick().await;
    loop {
        interval.tick().await;
        let worker = engine.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || reload_if_stale(&worker)).await {
            warn!("reloader task for {} failed: {e}", engine.dir().display());
        }
    }
}

/// Reload when the files changed since the current snapshot. `None` when nothing changed.
pub fn reload_if_stale(engine: &Engine) -> Option<Result<usize, EngineError>> {
    if !engine.is_stale() {
        return None;
    }
    let result = engine.reload();
    match &result {
        Ok(count) => info!("reloaded {}: {count} bookings", engine.dir().display()),
        // Keep serving the last good snapshot.
        Err(e) => warn!("reload of {} failed: {e}", engine.dir().display()),
    }
    Some(result)
}
