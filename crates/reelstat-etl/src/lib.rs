//! Dataset ingestion for reelstat.
//!
//! Streams the ratings, basics and episode datasets through the ratings →
//! basics → episodes treadle stages into the title merge store, gated by
//! the refresh policy. Also hosts configuration, user rating import and
//! the daily scheduler.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod delimited;
pub mod error;
pub mod logging;
pub mod merge;
pub mod pipeline;
pub mod progress;
pub mod refresh;
pub mod rows;
pub mod scheduler;
pub mod source;
pub mod stages;
pub mod user_ratings;
pub mod work_item;

pub use config::Config;
pub use error::{EtlError, EtlResult, RowParseError};
pub use pipeline::{build_workflow, RefreshOutcome, RefreshPipeline, RefreshReport};
pub use refresh::{Clock, FixedClock, RefreshPolicy, SystemClock};
pub use stages::{Dataset, DatasetStage, StagePhase, StageReport};
pub use user_ratings::{import_user_ratings, import_user_ratings_file, ImportSummary};
pub use work_item::RefreshRun;
