//! Integration tests for the full ratings → basics → episodes refresh.
//!
//! Datasets are served from a local mirror directory holding gzipped
//! fixtures, so no network access is needed.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;

use reelstat_core::schema::{Database, TitleFilter};
use reelstat_etl::config::DatasetUrls;
use reelstat_etl::source::MirrorSource;
use reelstat_etl::stages::StageSettings;
use reelstat_etl::{FixedClock, RefreshOutcome, RefreshPipeline, RefreshPolicy, StagePhase};

const RATINGS: &str = "tconst\taverageRating\tnumVotes
tt0000001\t5.7\t50
tt0903747\t9.5\t2000000
tt0959621\t9.0\t40000
tt1054724\t8.6\t30000
tt1232244\t9.9\t180000
tt0111161\t9.3\t2800000
tt9999999\t6.0\t99
tt0068646\t9.2\t1900000
";

const BASICS: &str = "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres
tt0000001\tshort\tCarmencita\tCarmencita\t0\t1894\t\\N\t1\tDocumentary,Short
tt0903747\ttvSeries\tBreaking Bad\tBreaking Bad\t0\t2008\t2013\t49\tCrime,Drama,Thriller
tt0959621\ttvEpisode\tPilot\tPilot\t0\t2008\t\\N\t58\tCrime,Drama,Thriller
tt1054724\ttvEpisode\tCat's in the Bag...\tCat's in the Bag...\t0\t2008\t\\N\t48\tCrime,Drama,Thriller
tt1232244\ttvEpisode\tOzymandias\tOzymandias\t0\t2013\t\\N\t47\tCrime,Drama,Thriller
tt0111161\tmovie\tThe Shawshank Redemption\tThe Shawshank Redemption\t0\t1994\t\\N\t142\tDrama
tt9999999\ttvEpisode\tObscure\tObscure\t0\t2008\t\\N\t\\N\t\\N
tt0068646\tmovie\tThe Godfather\tThe Godfather\t0\t1972\t\\N\t175\tCrime,Drama
";

const EPISODES: &str = "tconst\tparentTconst\tseasonNumber\tepisodeNumber
tt0959621\ttt0903747\t1\t1
tt1054724\ttt0903747\t1\t2
tt9999999\ttt0903747\t1\t3
tt1232244\ttt0903747\t5\t14
tt0959621\ttt0903747\t1\t1
tt0000002\tbroken
";

fn write_gz(path: &Path, text: &str) {
    let mut encoder = GzEncoder::new(std::fs::File::create(path).unwrap(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

fn mirror(dir: &Path, with_episodes: bool) {
    let mirror = dir.join("mirror");
    std::fs::create_dir_all(&mirror).unwrap();
    write_gz(&mirror.join("title.ratings.tsv.gz"), RATINGS);
    write_gz(&mirror.join("title.basics.tsv.gz"), BASICS);
    if with_episodes {
        write_gz(&mirror.join("title.episode.tsv.gz"), EPISODES);
    }
}

fn pipeline(dir: &Path, today: NaiveDate) -> RefreshPipeline {
    RefreshPipeline::new(
        DatasetUrls::default(),
        StageSettings {
            db_path: dir.join("reelstat.db"),
            work_dir: dir.join("datasets"),
            minimum_votes: 100,
            progress_step: 10,
        },
        Arc::new(MirrorSource::new(dir.join("mirror"))),
        RefreshPolicy::new(7, Arc::new(FixedClock::on(today))),
    )
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

fn snapshot(db: &Database) -> String {
    let titles = db.list_titles(&TitleFilter::default(), 1000, 0).unwrap();
    serde_json::to_string(&titles).unwrap()
}

#[tokio::test]
async fn test_full_refresh_builds_collection() {
    let temp_dir = TempDir::new().unwrap();
    mirror(temp_dir.path(), true);

    let outcome = pipeline(temp_dir.path(), day(1))
        .run_full_refresh(false)
        .await
        .unwrap();
    let RefreshOutcome::Completed(report) = outcome else {
        panic!("expected a completed refresh, got {outcome:?}");
    };
    assert_eq!(report.stages.len(), 3);
    assert!(report.stages.iter().all(|s| s.phase == StagePhase::Done));
    assert_eq!(report.stages[2].parse.malformed, 1);

    let db = Database::open(temp_dir.path().join("reelstat.db")).unwrap();
    assert_eq!(db.count_titles(&TitleFilter::default()).unwrap(), 6);

    // Below the vote threshold: never created, never named, never linked.
    assert!(db.get_title_by_imdb_id("tt0000001").unwrap().is_none());
    assert!(db.get_title_by_imdb_id("tt9999999").unwrap().is_none());

    let movie = db.get_title_by_imdb_id("tt0111161").unwrap().unwrap();
    assert_eq!(movie.name.as_deref(), Some("The Shawshank Redemption"));
    assert_eq!(movie.year, Some(1994));
    assert!(movie.end_year.is_none());
    assert_eq!(movie.votes, Some(2_800_000));

    let series = db.get_title_by_imdb_id("tt0903747").unwrap().unwrap();
    let children: Vec<&str> = series.children.iter().map(|c| c.imdb_id.as_str()).collect();
    assert_eq!(children, vec!["tt0959621", "tt1054724", "tt1232244"]);
    assert_eq!(series.children[2].season, Some(5));
    assert_eq!(series.children[2].rating, Some(9.9));

    let episode = db.get_title_by_imdb_id("tt1232244").unwrap().unwrap();
    assert_eq!(episode.parent_imdb_id.as_deref(), Some("tt0903747"));
    assert_eq!(episode.episode, Some(14));

    assert_eq!(db.get_setting("last_drop").unwrap().as_deref(), Some("2024-06-01"));
}

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    mirror(temp_dir.path(), true);
    let pipeline = pipeline(temp_dir.path(), day(1));

    pipeline.run_full_refresh(true).await.unwrap();
    let first = snapshot(&Database::open(temp_dir.path().join("reelstat.db")).unwrap());

    pipeline.run_full_refresh(true).await.unwrap();
    let second = snapshot(&Database::open(temp_dir.path().join("reelstat.db")).unwrap());

    assert_eq!(first, second);
    let db = Database::open(temp_dir.path().join("reelstat.db")).unwrap();
    assert_eq!(db.count_child_edges().unwrap(), 3);
}

#[tokio::test]
async fn test_refresh_gated_by_interval() {
    let temp_dir = TempDir::new().unwrap();
    mirror(temp_dir.path(), true);

    let first = pipeline(temp_dir.path(), day(1)).run_full_refresh(false).await.unwrap();
    assert!(matches!(first, RefreshOutcome::Completed(_)));

    let too_soon = pipeline(temp_dir.path(), day(5)).run_full_refresh(false).await.unwrap();
    assert!(matches!(too_soon, RefreshOutcome::NotDue));

    let due = pipeline(temp_dir.path(), day(8)).run_full_refresh(false).await.unwrap();
    assert!(matches!(due, RefreshOutcome::Completed(_)));
}

#[tokio::test]
async fn test_missing_dataset_does_not_abort_run() {
    let temp_dir = TempDir::new().unwrap();
    mirror(temp_dir.path(), false);

    let outcome = pipeline(temp_dir.path(), day(1))
        .run_full_refresh(false)
        .await
        .unwrap();
    let RefreshOutcome::Completed(report) = outcome else {
        panic!("expected a completed refresh, got {outcome:?}");
    };
    assert_eq!(report.stages[0].phase, StagePhase::Done);
    assert_eq!(report.stages[1].phase, StagePhase::Done);
    assert_eq!(report.stages[2].phase, StagePhase::Failed);

    let db = Database::open(temp_dir.path().join("reelstat.db")).unwrap();
    let episode = db.get_title_by_imdb_id("tt0959621").unwrap().unwrap();
    assert_eq!(episode.name.as_deref(), Some("Pilot"));
    assert!(episode.parent_imdb_id.is_none());
    assert_eq!(db.count_child_edges().unwrap(), 0);
}
