use serde::{Deserialize, Serialize};

use crate::model::ids::TitleId;

/// Title types that own episodes.
pub const SERIES_TYPES: &[&str] = &["tvSeries", "tvMiniSeries"];

/// A media work (movie, series, episode, ...) merged from the ratings,
/// basics and episode datasets.
///
/// Every attribute except `imdb_id` is optional: a title is created by
/// whichever dataset sees it first and filled in by the others, so a
/// rating-only title without a `name` is a valid state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Title {
    pub id: TitleId,

    /// External identifier (`tconst`), unique across the store.
    pub imdb_id: String,

    /// Category tag such as `movie`, `tvSeries` or `tvEpisode`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub title_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_year: Option<i32>,

    /// Runtime in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<u32>,

    /// Global average rating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,

    /// Containing series, present only on episodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_imdb_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,

    /// Cached episode edges, in discovery order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildEdge>,
}

impl Title {
    #[must_use]
    pub fn new(imdb_id: impl Into<String>) -> Self {
        let imdb_id = imdb_id.into();
        Self {
            id: TitleId::for_imdb_id(&imdb_id),
            imdb_id,
            title_type: None,
            name: None,
            year: None,
            end_year: None,
            runtime: None,
            rating: None,
            votes: None,
            genres: Vec::new(),
            parent_imdb_id: None,
            season: None,
            episode: None,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_type(mut self, title_type: impl Into<String>) -> Self {
        self.title_type = Some(title_type.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_rating(mut self, rating: f64, votes: u64) -> Self {
        self.rating = Some(rating);
        self.votes = Some(votes);
        self
    }

    /// Returns `true` for series and mini-series.
    pub fn is_series(&self) -> bool {
        self.title_type
            .as_deref()
            .is_some_and(|t| SERIES_TYPES.contains(&t))
    }

    /// The edge a parent caches for this title when it is one of its episodes.
    #[must_use]
    pub fn as_child_edge(&self) -> ChildEdge {
        ChildEdge {
            imdb_id: self.imdb_id.clone(),
            season: self.season,
            episode: self.episode,
            rating: self.rating,
        }
    }
}

/// Lightweight reference from a series to one of its episodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildEdge {
    pub imdb_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    /// The episode's global rating at the time the edge was cached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}
