//! Dataset stages: fetch → decompress → parse → merge, one per dataset.
//!
//! Fetch and decompression failures are logged, recorded on the stage
//! report and the stage still completes, so the stages after it run with
//! whatever is already merged. Malformed rows and failed merges are
//! counted and skipped.

use std::collections::HashSet;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use treadle::{Stage, StageContext, StageOutcome};

use reelstat_core::schema::Database;

use crate::config::DatasetUrls;
use crate::delimited::{DelimitedRow, ParseStats, RowStream};
use crate::error::{EtlError, EtlResult};
use crate::merge::{merge_basics, merge_episode, merge_rating, merge_rows, MergeSummary};
use crate::rows::{BasicsRow, EpisodeRow, RatingRow};
use crate::source::{decompress_gz, file_name_of, DatasetSource};

/// The three fixed datasets, in the order they must be merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    Ratings,
    Basics,
    Episodes,
}

impl Dataset {
    pub const ALL: [Self; 3] = [Self::Ratings, Self::Basics, Self::Episodes];

    /// Stage name in the workflow.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ratings => "ratings",
            Self::Basics => "basics",
            Self::Episodes => "episodes",
        }
    }

    pub fn url(self, urls: &DatasetUrls) -> &str {
        match self {
            Self::Ratings => &urls.ratings_url,
            Self::Basics => &urls.basics_url,
            Self::Episodes => &urls.episodes_url,
        }
    }
}

/// Where a dataset stage got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StagePhase {
    Idle,
    Fetching,
    Decompressing,
    Parsing,
    Merging,
    Done,
    Failed,
}

/// Outcome of one dataset stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub dataset: Dataset,
    pub phase: StagePhase,
    pub parse: ParseStats,
    pub merge: MergeSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageReport {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            phase: StagePhase::Idle,
            parse: ParseStats::default(),
            merge: MergeSummary::default(),
            error: None,
        }
    }

    fn enter(&mut self, phase: StagePhase) {
        log::info!("[{}] {:?} -> {:?}", self.dataset.name(), self.phase, phase);
        self.phase = phase;
    }

    fn fail(&mut self, error: &EtlError) {
        log::error!("[{}] failed while {:?}: {}", self.dataset.name(), self.phase, error);
        self.phase = StagePhase::Failed;
        self.error = Some(error.to_string());
    }
}

/// State shared by the stages of one run.
#[derive(Debug, Default)]
pub struct RunState {
    /// Ids that passed the ratings vote filter.
    pub inclusion: HashSet<String>,
    pub reports: Vec<StageReport>,
}

pub type SharedRunState = Arc<Mutex<RunState>>;

pub(crate) fn lock(state: &SharedRunState) -> MutexGuard<'_, RunState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Settings every dataset stage needs.
#[derive(Debug, Clone)]
pub struct StageSettings {
    pub db_path: PathBuf,
    pub work_dir: PathBuf,
    pub minimum_votes: u64,
    pub progress_step: u32,
}

/// A treadle stage ingesting one dataset.
#[derive(Debug)]
pub struct DatasetStage {
    dataset: Dataset,
    url: String,
    settings: StageSettings,
    source: Arc<dyn DatasetSource>,
    state: SharedRunState,
}

impl DatasetStage {
    pub fn new(
        dataset: Dataset,
        url: impl Into<String>,
        settings: StageSettings,
        source: Arc<dyn DatasetSource>,
        state: SharedRunState,
    ) -> Self {
        Self {
            dataset,
            url: url.into(),
            settings,
            source,
            state,
        }
    }

    fn archive_path(&self) -> PathBuf {
        let name = file_name_of(&self.url).unwrap_or(self.dataset.name());
        self.settings.work_dir.join(name)
    }

    /// The inclusion set for the basics and episodes stages, rebuilt from
    /// the stored ids when the ratings stage ran in another process.
    fn inclusion(&self) -> EtlResult<Arc<HashSet<String>>> {
        {
            let state = lock(&self.state);
            if !state.inclusion.is_empty() {
                return Ok(Arc::new(state.inclusion.clone()));
            }
        }
        let db = Database::open(&self.settings.db_path)?;
        let ids: HashSet<String> = db.list_title_imdb_ids()?.into_iter().collect();
        log::info!(
            "[{}] inclusion set re-derived from {} stored titles",
            self.dataset.name(),
            ids.len()
        );
        lock(&self.state).inclusion.clone_from(&ids);
        Ok(Arc::new(ids))
    }

    async fn fetch_and_decompress(&self, report: &mut StageReport) -> EtlResult<PathBuf> {
        report.enter(StagePhase::Fetching);
        let archive = self.source.fetch(&self.url, &self.archive_path()).await?;

        report.enter(StagePhase::Decompressing);
        tokio::task::spawn_blocking(move || decompress_gz(&archive))
            .await
            .map_err(|e| EtlError::Io(std::io::Error::other(e)))?
    }

    async fn parse_and_merge(&self, path: PathBuf, report: &mut StageReport) -> EtlResult<()> {
        report.enter(StagePhase::Parsing);
        let inclusion = match self.dataset {
            Dataset::Ratings => Arc::new(HashSet::new()),
            Dataset::Basics | Dataset::Episodes => self.inclusion()?,
        };

        let dataset = self.dataset;
        let settings = self.settings.clone();
        let ingested = tokio::task::spawn_blocking(move || {
            ingest(dataset, &settings, &path, &inclusion)
        })
        .await
        .map_err(|e| EtlError::Io(std::io::Error::other(e)))??;

        report.enter(StagePhase::Merging);
        report.parse = ingested.parse;
        report.merge = ingested.merge;
        if let Some(kept) = ingested.kept_ids {
            lock(&self.state).inclusion = kept;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Stage for DatasetStage {
    fn name(&self) -> &str {
        self.dataset.name()
    }

    async fn execute(
        &self,
        item: &dyn treadle::WorkItem,
        ctx: &mut StageContext,
    ) -> treadle::Result<StageOutcome> {
        log::info!("[{}] starting for {}", self.dataset.name(), item.id());
        let mut report = StageReport::new(self.dataset);

        match self.fetch_and_decompress(&mut report).await {
            Ok(path) => match self.parse_and_merge(path, &mut report).await {
                Ok(()) => report.enter(StagePhase::Done),
                Err(e) if matches!(e, EtlError::Database(_)) => {
                    return Err(treadle::TreadleError::StageExecution(format!(
                        "{} merge failed: {e}",
                        self.dataset.name()
                    )));
                }
                Err(e) => report.fail(&e),
            },
            Err(e) => report.fail(&e),
        }

        let summary = serde_json::to_value(&report).map_err(|e| {
            treadle::TreadleError::StageExecution(format!("Failed to serialize report: {e}"))
        })?;
        ctx.metadata.insert("report".to_string(), summary);
        lock(&self.state).reports.push(report);

        Ok(StageOutcome::Complete)
    }
}

/// What the blocking half of a stage produced.
#[derive(Debug)]
struct Ingested {
    parse: ParseStats,
    merge: MergeSummary,
    /// The new inclusion set, from the ratings stage only.
    kept_ids: Option<HashSet<String>>,
}

fn ingest(
    dataset: Dataset,
    settings: &StageSettings,
    path: &Path,
    inclusion: &HashSet<String>,
) -> EtlResult<Ingested> {
    let label = dataset.name();
    let db = Database::open(&settings.db_path)?;
    let step = settings.progress_step;

    match dataset {
        Dataset::Ratings => {
            let minimum = settings.minimum_votes;
            let (rows, parse) = parse(path, label, |row: &RatingRow| row.num_votes >= minimum)?;
            let merge = merge_rows(&db, label, &rows, step, merge_rating)?;
            let kept_ids = rows.into_iter().map(|row| row.imdb_id).collect();
            Ok(Ingested {
                parse,
                merge,
                kept_ids: Some(kept_ids),
            })
        }
        Dataset::Basics => {
            let (rows, parse) = parse_included::<BasicsRow>(path, label, inclusion)?;
            let merge = merge_rows(&db, label, &rows, step, merge_basics)?;
            Ok(Ingested {
                parse,
                merge,
                kept_ids: None,
            })
        }
        Dataset::Episodes => {
            let (rows, parse) = parse_included::<EpisodeRow>(path, label, inclusion)?;
            let merge = merge_rows(&db, label, &rows, step, merge_episode)?;
            Ok(Ingested {
                parse,
                merge,
                kept_ids: None,
            })
        }
    }
}

fn parse<T, P>(path: &Path, label: &str, predicate: P) -> EtlResult<(Vec<T>, ParseStats)>
where
    T: DelimitedRow,
    P: FnMut(&T) -> bool,
{
    let stream = RowStream::open(path, '\t', predicate)?;
    Ok(stream.collect_logged(label))
}

/// Parse only the rows whose key is in `inclusion`. Other lines are
/// dropped before decoding.
fn parse_included<T>(
    path: &Path,
    label: &str,
    inclusion: &HashSet<String>,
) -> EtlResult<(Vec<T>, ParseStats)>
where
    T: DelimitedRow,
{
    let stream = RowStream::open(path, '\t', |_: &T| true)?
        .with_key_filter(|key: &str| inclusion.contains(key));
    Ok(stream.collect_logged(label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MirrorSource;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct TestItem {
        id: String,
    }

    impl treadle::WorkItem for TestItem {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn write_gz(path: &Path, text: &str) {
        let mut encoder = GzEncoder::new(std::fs::File::create(path).unwrap(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    fn stage(dataset: Dataset, dir: &Path, state: SharedRunState) -> DatasetStage {
        let settings = StageSettings {
            db_path: dir.join("reelstat.db"),
            work_dir: dir.join("work"),
            minimum_votes: 100,
            progress_step: 10,
        };
        let url = dataset.url(&DatasetUrls::default()).to_string();
        DatasetStage::new(
            dataset,
            url,
            settings,
            Arc::new(MirrorSource::new(dir.join("mirror"))),
            state,
        )
    }

    #[test]
    fn test_dataset_order_and_names() {
        let names: Vec<&str> = Dataset::ALL.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["ratings", "basics", "episodes"]);
    }

    #[tokio::test]
    async fn test_ratings_stage_builds_inclusion_set() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("mirror")).unwrap();
        write_gz(
            &dir.path().join("mirror").join("title.ratings.tsv.gz"),
            "tconst\taverageRating\tnumVotes\ntt1\t7.5\t100\ntt2\t9.9\t99\ntt3\toops\t5000\n",
        );

        let state = SharedRunState::default();
        let stage = stage(Dataset::Ratings, dir.path(), Arc::clone(&state));
        let item = TestItem {
            id: "run-1".to_string(),
        };
        let mut ctx = StageContext::new("ratings".to_string());

        let outcome = stage.execute(&item, &mut ctx).await.unwrap();
        assert!(matches!(outcome, StageOutcome::Complete));
        assert!(ctx.metadata.contains_key("report"));

        let state = lock(&state);
        assert_eq!(state.inclusion.len(), 1);
        assert!(state.inclusion.contains("tt1"));
        let report = &state.reports[0];
        assert_eq!(report.phase, StagePhase::Done);
        assert_eq!(report.parse.seen, 3);
        assert_eq!(report.parse.kept, 1);
        assert_eq!(report.parse.malformed, 1);
        assert_eq!(report.merge.merged, 1);
    }

    #[tokio::test]
    async fn test_missing_archive_fails_softly() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("mirror")).unwrap();

        let state = SharedRunState::default();
        let stage = stage(Dataset::Basics, dir.path(), Arc::clone(&state));
        let item = TestItem {
            id: "run-2".to_string(),
        };
        let mut ctx = StageContext::new("basics".to_string());

        let outcome = stage.execute(&item, &mut ctx).await.unwrap();
        assert!(matches!(outcome, StageOutcome::Complete));

        let state = lock(&state);
        assert_eq!(state.reports[0].phase, StagePhase::Failed);
        assert!(state.reports[0].error.is_some());
    }

    #[tokio::test]
    async fn test_inclusion_set_rederived_from_store() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("mirror")).unwrap();
        {
            let db = Database::open(dir.path().join("reelstat.db")).unwrap();
            db.save_title(&reelstat_core::model::Title::new("tt7").with_rating(8.0, 900))
                .unwrap();
        }
        write_gz(
            &dir.path().join("mirror").join("title.basics.tsv.gz"),
            "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres\n\
             tt7\tmovie\tSeven\tSeven\t0\t1995\t\\N\t127\tCrime,Drama\n\
             tt8\tmovie\tEight\tEight\t0\t1995\t\\N\t90\tDrama\n",
        );

        let state = SharedRunState::default();
        let stage = stage(Dataset::Basics, dir.path(), Arc::clone(&state));
        let item = TestItem {
            id: "run-3".to_string(),
        };
        let mut ctx = StageContext::new("basics".to_string());
        stage.execute(&item, &mut ctx).await.unwrap();

        let db = Database::open(dir.path().join("reelstat.db")).unwrap();
        let title = db.get_title_by_imdb_id("tt7").unwrap().unwrap();
        assert_eq!(title.name.as_deref(), Some("Seven"));
        assert!(db.get_title_by_imdb_id("tt8").unwrap().is_none());
        assert_eq!(lock(&state).reports[0].parse.kept, 1);
    }
}
