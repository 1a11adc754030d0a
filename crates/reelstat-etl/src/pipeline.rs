//! The full refresh: gate, rebuild, then ratings → basics → episodes.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use treadle::Workflow;

use reelstat_core::schema::Database;

use crate::config::{Config, DatasetUrls};
use crate::refresh::{Clock, RefreshGate, RefreshPolicy, SystemClock};
use crate::source::{DatasetSource, HttpSource, MirrorSource};
use crate::stages::{lock, Dataset, DatasetStage, RunState, SharedRunState, StageReport, StageSettings};
use crate::work_item::RefreshRun;

/// Result of a completed refresh run.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub run_id: String,
    pub stages: Vec<StageReport>,
}

/// What `run_full_refresh` did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// Refreshes are administratively paused.
    Paused,
    /// The rebuild interval has not elapsed yet.
    NotDue,
    Completed(RefreshReport),
}

/// Build the ratings → basics → episodes workflow.
///
/// # Errors
/// Returns an error if the workflow cannot be built.
pub fn build_workflow(
    urls: &DatasetUrls,
    settings: &StageSettings,
    source: &Arc<dyn DatasetSource>,
    state: &SharedRunState,
) -> treadle::Result<Workflow> {
    let stage = |dataset: Dataset| {
        DatasetStage::new(
            dataset,
            dataset.url(urls),
            settings.clone(),
            Arc::clone(source),
            Arc::clone(state),
        )
    };

    Workflow::builder()
        .stage(Dataset::Ratings.name(), stage(Dataset::Ratings))
        .stage(Dataset::Basics.name(), stage(Dataset::Basics))
        .stage(Dataset::Episodes.name(), stage(Dataset::Episodes))
        .dependency(Dataset::Basics.name(), Dataset::Ratings.name())
        .dependency(Dataset::Episodes.name(), Dataset::Basics.name())
        .build()
}

/// Drives refresh runs, one at a time.
#[derive(Debug)]
pub struct RefreshPipeline {
    urls: DatasetUrls,
    settings: StageSettings,
    source: Arc<dyn DatasetSource>,
    policy: RefreshPolicy,
    run_lock: AsyncMutex<()>,
}

impl RefreshPipeline {
    pub fn new(
        urls: DatasetUrls,
        settings: StageSettings,
        source: Arc<dyn DatasetSource>,
        policy: RefreshPolicy,
    ) -> Self {
        Self {
            urls,
            settings,
            source,
            policy,
            run_lock: AsyncMutex::new(()),
        }
    }

    /// Wire a pipeline from configuration: HTTP downloads unless a mirror
    /// directory is configured, and the system clock.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let source: Arc<dyn DatasetSource> = match &config.mirror_dir {
            Some(dir) => {
                log::info!("Reading datasets from mirror {}", dir.display());
                Arc::new(MirrorSource::new(dir.clone()))
            }
            None => Arc::new(HttpSource::new()?),
        };
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Ok(Self::new(
            config.datasets.clone(),
            StageSettings {
                db_path: config.database_path.clone(),
                work_dir: config.data_dir.clone(),
                minimum_votes: config.minimum_votes,
                progress_step: config.progress_step,
            },
            source,
            RefreshPolicy::new(config.drop_collection_interval_days, clock),
        ))
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    fn state_store_path(&self) -> PathBuf {
        self.settings.work_dir.join("pipeline.db")
    }

    /// Run the whole ingestion if it is due and not paused. `force` skips
    /// the interval check.
    ///
    /// Overlapping calls wait for the running one to finish.
    pub async fn run_full_refresh(&self, force: bool) -> anyhow::Result<RefreshOutcome> {
        let _guard = self.run_lock.lock().await;

        let gate = {
            let db = Database::open(&self.settings.db_path)?;
            let gate = self.policy.gate(&db, force)?;
            if gate == RefreshGate::Rebuild {
                log::info!("Rebuilding title collection");
                db.rebuild_title_tables()?;
                self.policy.record_rebuild(&db)?;
            }
            gate
        };

        match gate {
            RefreshGate::Paused => {
                log::info!("Refresh skipped: updates are paused");
                return Ok(RefreshOutcome::Paused);
            }
            RefreshGate::NotDue => {
                log::info!("Refresh skipped: collection rebuild not due yet");
                return Ok(RefreshOutcome::NotDue);
            }
            RefreshGate::Rebuild => {}
        }

        tokio::fs::create_dir_all(&self.settings.work_dir).await?;
        let state: SharedRunState = Arc::new(Mutex::new(RunState::default()));
        let workflow = build_workflow(&self.urls, &self.settings, &self.source, &state)?;
        let mut store = treadle::SqliteStateStore::open(&self.state_store_path()).await?;

        let run = RefreshRun::new(force);
        log::info!("Starting refresh {}", run);

        let mut events = workflow.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    treadle::WorkflowEvent::StageStarted { stage, .. } => {
                        log::info!("[{stage}] started");
                    }
                    treadle::WorkflowEvent::StageCompleted { stage, .. } => {
                        log::info!("[{stage}] complete");
                    }
                    treadle::WorkflowEvent::StageFailed { stage, error, .. } => {
                        log::error!("[{stage}] FAILED: {error}");
                    }
                    _ => {}
                }
            }
        });

        workflow.advance(&run, &mut store).await?;

        let stages = std::mem::take(&mut lock(&state).reports);
        log::info!("Refresh {} finished ({} stages)", run, stages.len());
        Ok(RefreshOutcome::Completed(RefreshReport {
            run_id: treadle::WorkItem::id(&run).to_string(),
            stages,
        }))
    }
}
