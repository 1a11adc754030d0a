//! Result shapes returned by the query engine.

use chrono::NaiveDate;
use serde::Serialize;

use reelstat_core::model::{ChildEdge, Title};

/// A title with the requesting user's rating of it, when there is one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedTitle {
    #[serde(flatten)]
    pub title: Title,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_rating: Option<u8>,
}

/// A series with its episodes expanded into full titles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesEpisodes {
    #[serde(flatten)]
    pub series: AnnotatedTitle,
    pub episodes: Vec<AnnotatedTitle>,
}

/// A child edge with the user's rating of that episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedEdge {
    #[serde(flatten)]
    pub edge: ChildEdge,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_rating: Option<u8>,
}

/// A series the user rated. `title.children` is moved into `episodes`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatedSeries {
    #[serde(flatten)]
    pub title: Title,
    pub user_rating: u8,
    pub episodes: Vec<AnnotatedEdge>,
}

/// Per-season averages of one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonSummary {
    pub season: u32,
    /// Mean global rating, rounded to 4 decimals.
    pub rating: f64,
    /// Mean of the user's ratings over the episodes they rated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_rating: Option<f64>,
    pub episode_count: u32,
    pub user_rated_episode_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSeasons {
    pub imdb_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub user_rating: u8,
    pub seasons: Vec<SeasonSummary>,
}

/// A user rating joined with its title and the title's parent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatedTitle {
    pub rating: u8,
    pub date: NaiveDate,
    pub title: Title,
    /// Parent series of an episode, without its children.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_title: Option<Title>,
}

/// A search result and its vote-boosted score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub title: Title,
    pub score: f64,
}

/// Histogram of a user's ratings for one title type. Bucket `i` counts
/// ratings of `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDistribution {
    #[serde(rename = "type")]
    pub title_type: String,
    pub ratings: [u32; 10],
}

/// Running bias of a user against the global rating for one title type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDifference {
    #[serde(rename = "type")]
    pub title_type: String,
    /// Sum of `user rating - global rating`.
    pub difference: f64,
    pub count: u32,
}

impl TypeDifference {
    /// Mean bias per rated title.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.difference / f64::from(self.count)
        }
    }
}

/// One of the largest gaps between a user's rating and the global one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Disagreement {
    pub imdb_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub title_type: String,
    pub rating: f64,
    pub user_rating: u8,
    /// `user_rating - rating`.
    pub difference: f64,
}

/// Everything `get_analysis` reports, in first-seen type order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Analysis {
    pub distribution: Vec<TypeDistribution>,
    pub avg_difference: Vec<TypeDifference>,
    pub max_difference: Vec<Disagreement>,
}
