//! Bulk import of a user's ratings.

use std::path::Path;

use reelstat_core::model::{UserId, UserRating};
use reelstat_core::schema::Database;
use serde::Serialize;

use crate::delimited::RowStream;
use crate::error::EtlResult;
use crate::merge::MergeSummary;
use crate::rows::UserRatingRow;

/// Result of one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Ratings removed before the import.
    pub replaced: usize,
    pub merge: MergeSummary,
}

/// Replace every rating of `user_id` with `rows`.
///
/// The user's previous ratings are cleared only when there is at least one
/// row to import. A row that fails to save is logged and skipped.
pub fn import_user_ratings(
    db: &Database,
    user_id: &UserId,
    rows: &[UserRatingRow],
) -> EtlResult<ImportSummary> {
    if rows.is_empty() {
        log::warn!("No ratings to import for user {}, keeping existing ones", user_id);
        return Ok(ImportSummary::default());
    }

    let summary = db.in_transaction(|db| {
        let replaced = db.delete_user_ratings(user_id)?;
        let mut merge = MergeSummary::default();
        for row in rows {
            let saved = UserRating::new(*user_id, row.imdb_id.clone(), i64::from(row.rating), row.date)
                .and_then(|rating| db.save_user_rating(&rating));
            match saved {
                Ok(()) => merge.merged += 1,
                Err(e) => {
                    merge.failed += 1;
                    log::error!("Failed to save rating {:?} for user {}: {}", row, user_id, e);
                }
            }
        }
        Ok(ImportSummary { replaced, merge })
    })?;

    log::info!(
        "Imported {} ratings for user {} ({} replaced, {} failed)",
        summary.merge.merged,
        user_id,
        summary.replaced,
        summary.merge.failed
    );
    Ok(summary)
}

/// Parse a comma-delimited ratings file and import it for `user_id`,
/// optionally deleting the file afterwards.
pub fn import_user_ratings_file(
    db: &Database,
    user_id: &UserId,
    path: &Path,
    delete_file: bool,
) -> EtlResult<ImportSummary> {
    let stream = RowStream::open(path, ',', |_: &UserRatingRow| true)?;
    let (rows, _stats) = stream.collect_logged(&format!("ratings of {user_id}"));
    let summary = import_user_ratings(db, user_id, &rows)?;

    if delete_file {
        std::fs::remove_file(path)?;
        log::info!("Removed {}", path.display());
    }
    Ok(summary)
}
