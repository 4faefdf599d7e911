//! Foreground service: coordinator timers plus a periodic expiry sweep

use crate::app::App;
use anyhow::Result;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

pub async fn cmd_run(app: &App) -> Result<()> {
    app.coordinator.start();

    let period = Duration::from_secs(app.config.storage.cleanup_interval_secs.max(1));
    let mut cleanup = tokio::time::interval(period);
    cleanup.set_missed_tick_behavior(MissedTickBehavior::Skip);

    eprintln!("✓ AstroSync running (Ctrl-C to stop)");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            _ = cleanup.tick() => {
                match app.storage.cleanup_expired() {
                    Ok(removed) => tracing::debug!("Expiry sweep removed {} records", removed),
                    Err(e) => tracing::warn!("Expiry sweep failed: {}", e),
                }
            }
        }
    }

    app.coordinator.shutdown();
    eprintln!("✓ Stopped");
    Ok(())
}
