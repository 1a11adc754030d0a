//! Daily refresh scheduling.

use std::path::Path;
use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use reelstat_core::model::SettingKey;
use reelstat_core::schema::Database;

use crate::pipeline::{RefreshOutcome, RefreshPipeline};

/// Parse an `HH:MM` time of day.
pub fn parse_refresh_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// The first instant strictly after `now` falling on `at`.
pub fn next_run_after(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    }
}

/// Read the scheduled time from settings, creating it from `default` on
/// first use. An unreadable stored value falls back to `default`.
pub fn refresh_time(db: &Database, default: &str) -> anyhow::Result<NaiveTime> {
    let stored = db.get_or_create_setting(SettingKey::RefreshTime.as_str(), default)?;
    if let Some(time) = parse_refresh_time(&stored) {
        return Ok(time);
    }
    log::warn!("Unreadable refresh_time {:?}, using {}", stored, default);
    parse_refresh_time(default)
        .ok_or_else(|| anyhow::anyhow!("Invalid refresh time {default:?}, expected HH:MM"))
}

/// Run a refresh every day at the configured time until Ctrl-C.
///
/// The time is re-read from settings before every wait, so a changed
/// setting takes effect from the next run.
pub async fn run_daily(
    pipeline: &RefreshPipeline,
    db_path: &Path,
    default_time: &str,
) -> anyhow::Result<()> {
    loop {
        let at = {
            let db = Database::open(db_path)?;
            refresh_time(&db, default_time)?
        };
        let now = pipeline.policy().clock().now();
        let next = next_run_after(now, at);
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        log::info!("Next refresh at {} (in {:?})", next, wait);

        tokio::select! {
            () = tokio::time::sleep(wait) => {}
            signal = tokio::signal::ctrl_c() => {
                signal?;
                log::info!("Scheduler stopped");
                return Ok(());
            }
        }

        match pipeline.run_full_refresh(false).await {
            Ok(RefreshOutcome::Completed(report)) => {
                log::info!("Scheduled refresh {} completed", report.run_id);
            }
            Ok(outcome) => log::info!("Scheduled refresh skipped: {:?}", outcome),
            Err(e) => log::error!("Scheduled refresh failed: {:#}", e),
        }
    }
}
