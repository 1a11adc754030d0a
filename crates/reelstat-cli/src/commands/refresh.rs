use std::sync::Arc;

use anyhow::{Context, Result};
use reelstat_core::schema::Database;
use reelstat_etl::{Config, RefreshOutcome, RefreshPipeline, RefreshPolicy, StagePhase, SystemClock};

/// Run one refresh now. `force` skips the rebuild interval check.
pub async fn run_refresh(config: &Config, force: bool) -> Result<()> {
    println!("\n🎬 Reelstat Dataset Refresh\n");
    println!("  Database: {}", config.database_path.display());
    println!("  Work dir: {}", config.data_dir.display());
    println!();

    let pipeline = RefreshPipeline::from_config(config)?;
    let outcome = pipeline
        .run_full_refresh(force)
        .await
        .context("Refresh failed")?;

    match &outcome {
        RefreshOutcome::Paused => {
            println!("⏸  Updates are paused. Run `reelstat resume` to re-enable them.");
        }
        RefreshOutcome::NotDue => {
            println!("✓ Collection is up to date. Use --force to rebuild anyway.");
        }
        RefreshOutcome::Completed(report) => {
            for stage in &report.stages {
                let mark = if stage.phase == StagePhase::Done { "✓" } else { "✗" };
                println!(
                    "  {mark} [{}] {} rows kept of {} ({} malformed), {} merged, {} skipped, {} failed",
                    stage.dataset.name(),
                    stage.parse.kept,
                    stage.parse.seen,
                    stage.parse.malformed,
                    stage.merge.merged,
                    stage.merge.skipped,
                    stage.merge.failed,
                );
                if let Some(error) = &stage.error {
                    println!("      {error}");
                }
            }
            println!("\n✓ Refresh {} complete", report.run_id);
        }
    }
    Ok(())
}

/// Refresh every day at the stored refresh time until Ctrl-C.
pub async fn run_schedule(config: &Config) -> Result<()> {
    let pipeline = RefreshPipeline::from_config(config)?;
    println!("⏰ Scheduler running, press Ctrl-C to stop");
    reelstat_etl::scheduler::run_daily(&pipeline, &config.database_path, &config.refresh_time)
        .await
}

/// Pause or resume scheduled and manual refreshes.
pub fn set_paused(config: &Config, paused: bool) -> Result<()> {
    let db = Database::open(&config.database_path).context("Failed to open database")?;
    let policy = RefreshPolicy::new(config.drop_collection_interval_days, Arc::new(SystemClock));
    policy.set_paused(&db, paused)?;

    if paused {
        println!("⏸  Updates paused");
    } else {
        println!("▶  Updates resumed");
    }
    Ok(())
}
