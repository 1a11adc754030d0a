//! Read-side operations over the title and user rating stores.

use std::collections::HashMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use reelstat_core::model::{Title, TitleId, UserId, UserRating};
use reelstat_core::paging::{Page, PageLimits};
use reelstat_core::schema::{Database, TitleFilter};

use crate::aggregate::{analyze, season_rollup};
use crate::error::{QueryError, QueryResult};
use crate::join::{
    annotate_titles, index_titles, join_titles, rated_series, rated_titles, ratings_by_imdb_id,
};
use crate::listing::{paginate_ratings, UserRatingQuery};
use crate::search::{match_expression, rank};
use crate::views::{
    Analysis, AnnotatedTitle, RatedSeries, RatedTitle, SearchHit, SeriesEpisodes, SeriesSeasons,
};

/// Limits applied by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub page_limits: PageLimits,
    /// Maximum number of search results.
    pub search_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_limits: PageLimits::default(),
            search_limit: 5,
        }
    }
}

/// Stateless, read-only queries. Missing records come back as `None` or an
/// empty collection; only store failures are errors.
#[derive(Debug)]
pub struct QueryEngine {
    db: Database,
    config: QueryConfig,
}

impl QueryEngine {
    pub fn new(db: Database, config: QueryConfig) -> Self {
        Self { db, config }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    fn run<T>(
        &self,
        operation: &'static str,
        params: &dyn Debug,
        f: impl FnOnce(&Database) -> reelstat_core::Result<T>,
    ) -> QueryResult<T> {
        f(&self.db).map_err(|source| {
            let err = QueryError::new(operation, params, source);
            log::error!("{err}");
            err
        })
    }

    pub fn get_by_id(&self, id: &TitleId) -> QueryResult<Option<Title>> {
        self.run("get_by_id", id, |db| db.get_title_by_id(id))
    }

    pub fn get_by_external_id(&self, imdb_id: &str) -> QueryResult<Option<Title>> {
        self.run("get_by_external_id", &imdb_id, |db| {
            db.get_title_by_imdb_id(imdb_id)
        })
    }

    /// One page of titles matching `filter`.
    pub fn list_all(
        &self,
        filter: &TitleFilter,
        page: Option<u32>,
        items_per_page: Option<u32>,
    ) -> QueryResult<Page<Title>> {
        let window = self.config.page_limits.resolve(page, items_per_page);
        self.run("list_all", &(filter, page, items_per_page), |db| {
            let count = db.count_titles(filter)?;
            let items = db.list_titles(filter, window.limit(), window.offset())?;
            Ok(Page {
                pagination: window.pagination(count),
                items,
            })
        })
    }

    /// Titles whose name matches any word of `text`, best first.
    pub fn search_by_name(
        &self,
        text: &str,
        title_type: Option<&str>,
    ) -> QueryResult<Vec<SearchHit>> {
        let Some(expr) = match_expression(text) else {
            return Ok(Vec::new());
        };
        let hits = self.run("search_by_name", &(text, title_type), |db| {
            db.search_titles(&expr, title_type)
        })?;
        log::debug!("search {:?} matched {} titles", text, hits.len());
        Ok(rank(hits, self.config.search_limit))
    }

    /// A series with its episodes expanded, both annotated with the user's
    /// ratings.
    pub fn get_episodes_with_user_rating(
        &self,
        parent_imdb_id: &str,
        user_id: &UserId,
    ) -> QueryResult<Option<SeriesEpisodes>> {
        self.run(
            "get_episodes_with_user_rating",
            &(parent_imdb_id, user_id),
            |db| {
                let Some(series) = db.get_title_by_imdb_id(parent_imdb_id)? else {
                    return Ok(None);
                };
                let child_ids: Vec<String> =
                    series.children.iter().map(|c| c.imdb_id.clone()).collect();
                let episodes = if child_ids.is_empty() {
                    Vec::new()
                } else {
                    db.get_titles_by_imdb_ids(&child_ids)?
                };

                let ratings = db.list_user_ratings(user_id)?;
                let by_id = ratings_by_imdb_id(&ratings);
                let series_rating = by_id.get(series.imdb_id.as_str()).copied();
                Ok(Some(SeriesEpisodes {
                    series: AnnotatedTitle {
                        title: series,
                        user_rating: series_rating,
                    },
                    episodes: annotate_titles(episodes, &by_id),
                }))
            },
        )
    }

    pub fn get_by_external_id_with_user_rating(
        &self,
        imdb_id: &str,
        user_id: &UserId,
    ) -> QueryResult<Option<AnnotatedTitle>> {
        self.run(
            "get_by_external_id_with_user_rating",
            &(imdb_id, user_id),
            |db| {
                let Some(title) = db.get_title_by_imdb_id(imdb_id)? else {
                    return Ok(None);
                };
                let user_rating = db.get_user_rating(user_id, imdb_id)?.map(|r| r.rating);
                Ok(Some(AnnotatedTitle { title, user_rating }))
            },
        )
    }

    /// Series the user rated, each episode annotated with the user's rating.
    pub fn get_user_rated_series(&self, user_id: &UserId) -> QueryResult<Vec<RatedSeries>> {
        self.run("get_user_rated_series", user_id, |db| {
            let (ratings, titles) = load_rated_titles(db, user_id)?;
            Ok(rated_series(&ratings, &titles))
        })
    }

    /// Per-season averages for every series the user rated.
    pub fn get_seasons_from_user_rated_series(
        &self,
        user_id: &UserId,
    ) -> QueryResult<Vec<SeriesSeasons>> {
        let series = self.get_user_rated_series(user_id)?;
        Ok(series
            .into_iter()
            .map(|s| SeriesSeasons {
                seasons: season_rollup(&s.episodes),
                imdb_id: s.title.imdb_id,
                name: s.title.name,
                user_rating: s.user_rating,
            })
            .collect())
    }

    /// Rating distribution, bias and largest disagreements of one user.
    pub fn get_analysis(&self, user_id: &UserId) -> QueryResult<Analysis> {
        self.run("get_analysis", user_id, |db| {
            let (ratings, titles) = load_rated_titles(db, user_id)?;
            Ok(analyze(join_titles(&ratings, &titles)))
        })
    }

    /// The user's ratings joined with their titles, filtered, sorted and
    /// paged per `query`.
    pub fn list_user_ratings(
        &self,
        user_id: &UserId,
        query: &UserRatingQuery,
    ) -> QueryResult<Page<RatedTitle>> {
        self.run("list_user_ratings", &(user_id, query), |db| {
            let (ratings, titles) = load_rated_titles(db, user_id)?;
            let mut parent_ids: Vec<String> = titles
                .values()
                .filter_map(|t| t.parent_imdb_id.clone())
                .collect();
            parent_ids.sort();
            parent_ids.dedup();
            let parents = index_titles(db.get_titles_by_imdb_ids(&parent_ids)?);

            let rated = rated_titles(&ratings, &titles, &parents);
            Ok(paginate_ratings(rated, query, &self.config.page_limits))
        })
    }
}

fn load_rated_titles(
    db: &Database,
    user_id: &UserId,
) -> reelstat_core::Result<(Vec<UserRating>, HashMap<String, Title>)> {
    let ratings = db.list_user_ratings(user_id)?;
    let imdb_ids: Vec<String> = ratings.iter().map(|r| r.imdb_id.clone()).collect();
    let titles = index_titles(db.get_titles_by_imdb_ids(&imdb_ids)?);
    Ok((ratings, titles))
}
