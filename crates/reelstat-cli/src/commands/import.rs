use std::path::PathBuf;

use anyhow::{Context, Result};
use reelstat_core::model::UserId;
use reelstat_core::schema::Database;
use reelstat_etl::{import_user_ratings_file, Config};

/// Replace a user's ratings with the contents of a CSV export.
///
/// Without a path, `<user_ratings_dir>/<user>.csv` is read.
pub fn run_import(
    config: &Config,
    user: UserId,
    path: Option<PathBuf>,
    delete_file: bool,
) -> Result<()> {
    let path = path.unwrap_or_else(|| config.user_ratings_dir.join(format!("{user}.csv")));
    if !path.exists() {
        anyhow::bail!("Ratings file not found: {}", path.display());
    }

    let db = Database::open(&config.database_path).context("Failed to open database")?;
    let summary = import_user_ratings_file(&db, &user, &path, delete_file)
        .with_context(|| format!("Failed to import {}", path.display()))?;

    if summary.merge.merged == 0 && summary.merge.failed == 0 {
        println!("No ratings found in {}, existing ratings kept", path.display());
    } else {
        println!(
            "✓ Imported {} ratings for {user} ({} replaced, {} failed)",
            summary.merge.merged, summary.replaced, summary.merge.failed
        );
    }
    Ok(())
}
