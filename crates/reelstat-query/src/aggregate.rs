//! Folds over joined ratings: season rollups and the user analysis.

use std::collections::BTreeMap;

use reelstat_core::model::{Title, UserRating};

use crate::views::{
    Analysis, AnnotatedEdge, Disagreement, SeasonSummary, TypeDifference, TypeDistribution,
};

/// Number of disagreements `get_analysis` keeps.
pub const TOP_DISAGREEMENTS: usize = 10;

/// Round to 4 decimal places.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Default)]
struct SeasonSums {
    rating: f64,
    episodes: u32,
    user_rating: f64,
    user_rated: u32,
}

/// Group a series' episodes by season.
///
/// Episodes without a season or a global rating are left out. Seasons come
/// back in ascending order.
pub fn season_rollup(episodes: &[AnnotatedEdge]) -> Vec<SeasonSummary> {
    let mut sums: BTreeMap<u32, SeasonSums> = BTreeMap::new();
    for episode in episodes {
        let (Some(season), Some(rating)) = (episode.edge.season, episode.edge.rating) else {
            continue;
        };
        let entry = sums.entry(season).or_default();
        entry.rating += rating;
        entry.episodes += 1;
        if let Some(user_rating) = episode.user_rating {
            entry.user_rating += f64::from(user_rating);
            entry.user_rated += 1;
        }
    }

    sums.into_iter()
        .map(|(season, s)| SeasonSummary {
            season,
            rating: round4(s.rating / f64::from(s.episodes)),
            user_rating: (s.user_rated > 0)
                .then(|| round4(s.user_rating / f64::from(s.user_rated))),
            episode_count: s.episodes,
            user_rated_episode_count: s.user_rated,
        })
        .collect()
}

/// Bounded best-of-N selection by magnitude.
///
/// Until full, every candidate is kept. Once full, a candidate replaces the
/// first-found smallest member only if its magnitude is strictly larger.
#[derive(Debug, Clone)]
pub struct TopN<T> {
    capacity: usize,
    items: Vec<(f64, T)>,
}

impl<T> TopN<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn offer(&mut self, magnitude: f64, item: T) {
        if self.items.len() < self.capacity {
            self.items.push((magnitude, item));
            return;
        }
        let Some((index, min)) = self.min_entry() else {
            return;
        };
        if magnitude > min {
            self.items.remove(index);
            self.items.push((magnitude, item));
        }
    }

    fn min_entry(&self) -> Option<(usize, f64)> {
        let mut min: Option<(usize, f64)> = None;
        for (index, (magnitude, _)) in self.items.iter().enumerate() {
            match min {
                Some((_, m)) if *magnitude >= m => {}
                _ => min = Some((index, *magnitude)),
            }
        }
        min
    }

    /// The retained items, largest magnitude first.
    pub fn into_sorted(mut self) -> Vec<T> {
        self.items.sort_by(|a, b| b.0.total_cmp(&a.0));
        self.items.into_iter().map(|(_, item)| item).collect()
    }
}

/// Single pass over a user's ratings joined with their titles.
///
/// Ratings of titles without a type or a global rating are ignored.
pub fn analyze<'a, I>(joined: I) -> Analysis
where
    I: IntoIterator<Item = (&'a UserRating, &'a Title)>,
{
    let mut collector = AnalysisCollector::default();
    for (rating, title) in joined {
        collector.add(rating, title);
    }
    collector.finish()
}

#[derive(Debug)]
struct AnalysisCollector {
    distribution: Vec<TypeDistribution>,
    avg_difference: Vec<TypeDifference>,
    top: TopN<Disagreement>,
}

impl Default for AnalysisCollector {
    fn default() -> Self {
        Self {
            distribution: Vec::new(),
            avg_difference: Vec::new(),
            top: TopN::new(TOP_DISAGREEMENTS),
        }
    }
}

impl AnalysisCollector {
    fn add(&mut self, rating: &UserRating, title: &Title) {
        let (Some(title_type), Some(global)) = (title.title_type.as_deref(), title.rating) else {
            return;
        };

        match self.distribution.iter_mut().find(|d| d.title_type == title_type) {
            Some(distribution) => distribution.ratings[rating.bucket()] += 1,
            None => {
                let mut ratings = [0; 10];
                ratings[rating.bucket()] += 1;
                self.distribution.push(TypeDistribution {
                    title_type: title_type.to_string(),
                    ratings,
                });
            }
        }

        let difference = f64::from(rating.rating) - global;
        match self
            .avg_difference
            .iter_mut()
            .find(|d| d.title_type == title_type)
        {
            Some(entry) => {
                entry.difference += difference;
                entry.count += 1;
            }
            None => self.avg_difference.push(TypeDifference {
                title_type: title_type.to_string(),
                difference,
                count: 1,
            }),
        }

        self.top.offer(
            difference.abs(),
            Disagreement {
                imdb_id: title.imdb_id.clone(),
                name: title.name.clone(),
                title_type: title_type.to_string(),
                rating: global,
                user_rating: rating.rating,
                difference,
            },
        );
    }

    fn finish(self) -> Analysis {
        Analysis {
            distribution: self.distribution,
            avg_difference: self.avg_difference,
            max_difference: self.top.into_sorted(),
        }
    }
}
