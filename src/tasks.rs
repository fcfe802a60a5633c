use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex};

use crate::config::Config;
use crate::db::Repository;
use crate::importer::Importer;
use crate::models::{ImportReport, Settings};

/// Default poll period for the publish scheduler.
pub const SCHEDULER_PERIOD: Duration = Duration::from_secs(30);

/// Level-triggered publish scheduler: every tick, flip scheduled posts
/// whose publish time has passed. Exits when the shutdown signal flips.
pub async fn scheduler_loop(
    repo: Arc<Repository>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                match repo.publish_due(Utc::now()).await {
                    Ok(0) => {}
                    Ok(n) => tracing::info!("Scheduler published {} post(s)", n),
                    Err(e) => tracing::warn!("Scheduler pass failed: {}", e),
                }
            }
        }
    }
    tracing::debug!("Scheduler stopped");
}

/// Periodic auto-import. The interval is re-read from settings before each
/// wait so an admin change takes effect without a restart; 0 disables the
/// import but the loop keeps checking for re-enablement.
pub async fn auto_import_loop(
    importer: Arc<Importer>,
    repo: Arc<Repository>,
    config: Config,
    last_report: Arc<Mutex<Option<ImportReport>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let minutes = match repo.get_settings_map().await {
            Ok(map) => Settings::from_map(&map, &config)
                .map(|s| s.import_interval_min)
                .unwrap_or(config.import_interval_min),
            Err(e) => {
                tracing::warn!("Could not read settings for auto-import: {}", e);
                config.import_interval_min
            }
        };

        let wait = if minutes == 0 {
            // Disabled; check again in a minute.
            Duration::from_secs(60)
        } else {
            Duration::from_secs(minutes * 60)
        };

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        if minutes == 0 {
            continue;
        }

        match importer.run().await {
            Ok(report) => {
                tracing::info!("Import automatique: {}", report);
                *last_report.lock().await = Some(report);
            }
            Err(e) => tracing::warn!("Import automatique échoué: {}", e),
        }
    }
    tracing::debug!("Auto-import stopped");
}
