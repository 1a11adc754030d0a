//! Query and aggregation engine for reelstat.
//!
//! Point lookups, paged listings and vote-boosted search over the title
//! store, plus the per-user joins: episodes annotated with the user's
//! ratings, season rollups of rated series, rating analysis and the
//! filtered rating listing.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod join;
pub mod listing;
pub mod search;
pub mod views;

pub use engine::{QueryConfig, QueryEngine};
pub use error::{QueryError, QueryResult};
pub use listing::{SortDirection, UserRatingQuery, UserRatingSort};
pub use views::{
    Analysis, AnnotatedEdge, AnnotatedTitle, Disagreement, RatedSeries, RatedTitle,
    SearchHit, SeasonSummary, SeriesEpisodes, SeriesSeasons, TypeDifference, TypeDistribution,
};
