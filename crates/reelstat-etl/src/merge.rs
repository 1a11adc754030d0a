//! Folding dataset rows into the title merge store.
//!
//! The `overlay_*` functions are the pure part: they decide what a row
//! contributes to a title. The `merge_*` functions load the title, apply
//! the overlay and write it back.

use std::fmt::Debug;

use reelstat_core::model::Title;
use reelstat_core::schema::Database;
use serde::Serialize;

use crate::progress::Progress;
use crate::rows::{BasicsRow, EpisodeRow, RatingRow};

/// What happened to one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged,
    /// The row had nothing to contribute (no title yet, or already merged).
    Skipped,
}

/// Per-stage merge counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub merged: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl MergeSummary {
    fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Merged => self.merged += 1,
            MergeOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Rating and votes laid over an existing title, or a new rating-only title.
pub fn overlay_rating(existing: Option<Title>, row: &RatingRow) -> Title {
    let title = existing.unwrap_or_else(|| Title::new(row.imdb_id.clone()));
    title.with_rating(row.average_rating, row.num_votes)
}

/// Basic metadata laid over a title that has no name yet.
///
/// Returns `false`, leaving the title untouched, when it is already named.
pub fn overlay_basics(title: &mut Title, row: &BasicsRow) -> bool {
    if title.name.is_some() {
        return false;
    }
    if let Some(title_type) = &row.title_type {
        title.title_type = Some(title_type.clone());
    }
    if let Some(name) = &row.primary_title {
        title.name = Some(name.clone());
    }
    if row.start_year.is_some() {
        title.year = row.start_year;
    }
    if row.end_year.is_some() {
        title.end_year = row.end_year;
    }
    if row.runtime_minutes.is_some() {
        title.runtime = row.runtime_minutes;
    }
    if !row.genres.is_empty() {
        title.genres.clone_from(&row.genres);
    }
    true
}

/// Episode linkage laid over a title that has no parent yet.
///
/// Returns `false`, leaving the title untouched, when it is already linked.
pub fn overlay_episode(title: &mut Title, row: &EpisodeRow) -> bool {
    if title.parent_imdb_id.is_some() {
        return false;
    }
    title.parent_imdb_id = Some(row.parent_imdb_id.clone());
    if row.season.is_some() {
        title.season = row.season;
    }
    if row.episode.is_some() {
        title.episode = row.episode;
    }
    true
}

/// Upsert the rating of one title.
pub fn merge_rating(db: &Database, row: &RatingRow) -> reelstat_core::Result<MergeOutcome> {
    let existing = db.get_title_by_imdb_id(&row.imdb_id)?;
    db.save_title(&overlay_rating(existing, row))?;
    Ok(MergeOutcome::Merged)
}

/// Name an existing title.
pub fn merge_basics(db: &Database, row: &BasicsRow) -> reelstat_core::Result<MergeOutcome> {
    let Some(mut title) = db.get_title_by_imdb_id(&row.imdb_id)? else {
        return Ok(MergeOutcome::Skipped);
    };
    if !overlay_basics(&mut title, row) {
        return Ok(MergeOutcome::Skipped);
    }
    db.save_title(&title)?;
    Ok(MergeOutcome::Merged)
}

/// Link an existing episode to its series and cache the edge on the
/// series when the series is stored.
pub fn merge_episode(db: &Database, row: &EpisodeRow) -> reelstat_core::Result<MergeOutcome> {
    let Some(mut title) = db.get_title_by_imdb_id(&row.imdb_id)? else {
        return Ok(MergeOutcome::Skipped);
    };
    if !overlay_episode(&mut title, row) {
        return Ok(MergeOutcome::Skipped);
    }
    db.save_title(&title)?;

    if db.get_title_by_imdb_id(&row.parent_imdb_id)?.is_some() {
        db.upsert_child_edge(&row.parent_imdb_id, &title.as_child_edge())?;
    } else {
        log::debug!(
            "Parent {} of {} is not stored, edge not cached",
            row.parent_imdb_id,
            row.imdb_id
        );
    }
    Ok(MergeOutcome::Merged)
}

/// Merge every row inside a single transaction.
///
/// Each row runs in its own savepoint, so a row whose merge fails leaves
/// nothing behind. It is logged with its payload and counted, and the loop
/// goes on with the next row.
pub fn merge_rows<T, F>(
    db: &Database,
    label: &str,
    rows: &[T],
    progress_step: u32,
    merge: F,
) -> reelstat_core::Result<MergeSummary>
where
    T: Debug,
    F: Fn(&Database, &T) -> reelstat_core::Result<MergeOutcome>,
{
    let progress = Progress::new(format!("{label} merge"), rows.len() as u64, progress_step);

    let summary = db.in_transaction(|db| {
        let mut summary = MergeSummary::default();
        for (index, row) in rows.iter().enumerate() {
            match db.in_savepoint(|db| merge(db, row)) {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    summary.failed += 1;
                    log::error!("{}: failed to merge {:?}: {}", label, row, e);
                }
            }
            progress.tick(index as u64 + 1);
        }
        Ok(summary)
    })?;

    log::info!(
        "{}: {} merged, {} skipped, {} failed",
        label,
        summary.merged,
        summary.skipped,
        summary.failed
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating(imdb_id: &str, value: f64, votes: u64) -> RatingRow {
        RatingRow {
            imdb_id: imdb_id.to_string(),
            average_rating: value,
            num_votes: votes,
        }
    }

    fn basics(imdb_id: &str, title_type: &str, name: &str) -> BasicsRow {
        BasicsRow {
            imdb_id: imdb_id.to_string(),
            title_type: Some(title_type.to_string()),
            primary_title: Some(name.to_string()),
            start_year: Some(2008),
            end_year: None,
            runtime_minutes: Some(47),
            genres: vec!["Crime".to_string(), "Drama".to_string()],
        }
    }

    fn episode(imdb_id: &str, parent: &str, season: Option<u32>, number: Option<u32>) -> EpisodeRow {
        EpisodeRow {
            imdb_id: imdb_id.to_string(),
            parent_imdb_id: parent.to_string(),
            season,
            episode: number,
        }
    }

    #[test]
    fn test_overlay_rating_keeps_other_fields() {
        let named = Title::new("tt1").with_name("Heat").with_rating(7.0, 100);
        let id = named.id;
        let updated = overlay_rating(Some(named), &rating("tt1", 8.3, 700_000));
        assert_eq!(updated.id, id);
        assert_eq!(updated.name.as_deref(), Some("Heat"));
        assert_eq!(updated.rating, Some(8.3));
        assert_eq!(updated.votes, Some(700_000));

        let fresh = overlay_rating(None, &rating("tt2", 6.1, 150));
        assert_eq!(fresh.imdb_id, "tt2");
        assert!(fresh.name.is_none());
    }

    #[test]
    fn test_overlay_basics_only_once() {
        let mut title = Title::new("tt1");
        assert!(overlay_basics(&mut title, &basics("tt1", "tvSeries", "Breaking Bad")));
        assert_eq!(title.name.as_deref(), Some("Breaking Bad"));
        assert_eq!(title.year, Some(2008));
        assert!(title.end_year.is_none());

        assert!(!overlay_basics(&mut title, &basics("tt1", "movie", "Other")));
        assert_eq!(title.title_type.as_deref(), Some("tvSeries"));
    }

    #[test]
    fn test_overlay_basics_leaves_absent_fields_unset() {
        let mut title = Title::new("tt1");
        title.year = Some(1999);
        let row = BasicsRow {
            imdb_id: "tt1".to_string(),
            title_type: None,
            primary_title: Some("Untyped".to_string()),
            start_year: None,
            end_year: None,
            runtime_minutes: None,
            genres: Vec::new(),
        };
        assert!(overlay_basics(&mut title, &row));
        assert!(title.title_type.is_none());
        assert_eq!(title.year, Some(1999));
        assert!(title.genres.is_empty());
    }

    #[test]
    fn test_merge_basics_requires_existing_title() {
        let db = Database::open_in_memory().unwrap();
        let outcome = merge_basics(&db, &basics("tt404", "movie", "Ghost")).unwrap();
        assert_eq!(outcome, MergeOutcome::Skipped);
        assert!(db.get_title_by_imdb_id("tt404").unwrap().is_none());
    }

    #[test]
    fn test_merge_episode_caches_edge_once() {
        let db = Database::open_in_memory().unwrap();
        merge_rating(&db, &rating("tt100", 9.0, 1000)).unwrap();
        merge_rating(&db, &rating("tt101", 8.0, 500)).unwrap();
        merge_basics(&db, &basics("tt100", "tvSeries", "Show")).unwrap();

        let row = episode("tt101", "tt100", Some(1), Some(1));
        assert_eq!(merge_episode(&db, &row).unwrap(), MergeOutcome::Merged);
        assert_eq!(merge_episode(&db, &row).unwrap(), MergeOutcome::Skipped);

        let child = db.get_title_by_imdb_id("tt101").unwrap().unwrap();
        assert_eq!(child.parent_imdb_id.as_deref(), Some("tt100"));
        assert_eq!(child.season, Some(1));

        let parent = db.get_title_by_imdb_id("tt100").unwrap().unwrap();
        assert_eq!(parent.children.len(), 1);
        assert_eq!(parent.children[0].imdb_id, "tt101");
        assert_eq!(parent.children[0].rating, Some(8.0));
    }

    #[test]
    fn test_merge_episode_without_stored_parent() {
        let db = Database::open_in_memory().unwrap();
        merge_rating(&db, &rating("tt101", 8.0, 500)).unwrap();

        let outcome = merge_episode(&db, &episode("tt101", "tt999", None, None)).unwrap();
        assert_eq!(outcome, MergeOutcome::Merged);
        assert_eq!(db.count_child_edges().unwrap(), 0);
        let child = db.get_title_by_imdb_id("tt101").unwrap().unwrap();
        assert_eq!(child.parent_imdb_id.as_deref(), Some("tt999"));
    }

    #[test]
    fn test_failed_edge_write_leaves_episode_unlinked() {
        let db = Database::open_in_memory().unwrap();
        merge_rating(&db, &rating("tt100", 9.0, 1000)).unwrap();
        merge_rating(&db, &rating("tt101", 8.0, 500)).unwrap();
        db.conn()
            .execute_batch(
                "CREATE TEMP TRIGGER refuse_edges BEFORE INSERT ON title_children
                 BEGIN SELECT RAISE(ABORT, 'edge write refused'); END;",
            )
            .unwrap();

        let rows = vec![episode("tt101", "tt100", Some(1), Some(2))];
        let summary = merge_rows(&db, "episodes", &rows, 50, merge_episode).unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.merged, 0);

        let child = db.get_title_by_imdb_id("tt101").unwrap().unwrap();
        assert!(child.parent_imdb_id.is_none());
        assert!(child.season.is_none());

        // The next run can still link it.
        db.conn().execute_batch("DROP TRIGGER refuse_edges").unwrap();
        let summary = merge_rows(&db, "episodes", &rows, 50, merge_episode).unwrap();
        assert_eq!(summary.merged, 1);
        let parent = db.get_title_by_imdb_id("tt100").unwrap().unwrap();
        assert_eq!(parent.children.len(), 1);
        assert_eq!(parent.children[0].episode, Some(2));
    }

    #[test]
    fn test_merge_rows_counts_failures_without_aborting() {
        let db = Database::open_in_memory().unwrap();
        let rows = vec![rating("tt1", 7.0, 100), rating("tt2", 7.0, 100), rating("tt3", 7.0, 100)];

        let summary = merge_rows(&db, "ratings", &rows, 50, |db, row: &RatingRow| {
            if row.imdb_id == "tt2" {
                return Err(reelstat_core::Error::InvalidData("boom".to_string()));
            }
            merge_rating(db, row)
        })
        .unwrap();

        assert_eq!(
            summary,
            MergeSummary {
                merged: 2,
                skipped: 0,
                failed: 1
            }
        );
        assert!(db.get_title_by_imdb_id("tt1").unwrap().is_some());
        assert!(db.get_title_by_imdb_id("tt3").unwrap().is_some());
    }
}
