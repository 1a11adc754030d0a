//! Join functions over loaded slices of titles and user ratings.
//!
//! The engine loads rows from the stores and hands them to these functions,
//! which keep the join logic testable without a database.

use std::collections::HashMap;

use reelstat_core::model::{ChildEdge, Title, UserRating};

use crate::views::{AnnotatedEdge, AnnotatedTitle, RatedSeries, RatedTitle};

/// A user's ratings keyed by external id.
pub fn ratings_by_imdb_id(ratings: &[UserRating]) -> HashMap<&str, u8> {
    ratings
        .iter()
        .map(|r| (r.imdb_id.as_str(), r.rating))
        .collect()
}

/// Left join of titles with the user's ratings.
pub fn annotate_titles(titles: Vec<Title>, ratings: &HashMap<&str, u8>) -> Vec<AnnotatedTitle> {
    titles
        .into_iter()
        .map(|title| {
            let user_rating = ratings.get(title.imdb_id.as_str()).copied();
            AnnotatedTitle { title, user_rating }
        })
        .collect()
}

/// Left join of child edges with the user's ratings.
pub fn annotate_edges(edges: Vec<ChildEdge>, ratings: &HashMap<&str, u8>) -> Vec<AnnotatedEdge> {
    edges
        .into_iter()
        .map(|edge| {
            let user_rating = ratings.get(edge.imdb_id.as_str()).copied();
            AnnotatedEdge { edge, user_rating }
        })
        .collect()
}

/// Inner join of ratings with their titles, in rating order.
pub fn join_titles<'a>(
    ratings: &'a [UserRating],
    titles: &'a HashMap<String, Title>,
) -> impl Iterator<Item = (&'a UserRating, &'a Title)> + 'a {
    ratings
        .iter()
        .filter_map(move |rating| titles.get(&rating.imdb_id).map(|title| (rating, title)))
}

/// Series among the rated titles, each with its episodes annotated.
pub fn rated_series(
    ratings: &[UserRating],
    titles: &HashMap<String, Title>,
) -> Vec<RatedSeries> {
    let by_id = ratings_by_imdb_id(ratings);
    join_titles(ratings, titles)
        .filter(|(_, title)| title.is_series())
        .map(|(rating, title)| {
            let mut title = title.clone();
            let children = std::mem::take(&mut title.children);
            RatedSeries {
                title,
                user_rating: rating.rating,
                episodes: annotate_edges(children, &by_id),
            }
        })
        .collect()
}

/// Inner join of ratings with their titles, plus the parent of each
/// episode with its children stripped.
pub fn rated_titles(
    ratings: &[UserRating],
    titles: &HashMap<String, Title>,
    parents: &HashMap<String, Title>,
) -> Vec<RatedTitle> {
    join_titles(ratings, titles)
        .map(|(rating, title)| {
            let parent_title = title
                .parent_imdb_id
                .as_ref()
                .and_then(|id| parents.get(id))
                .map(|parent| Title {
                    children: Vec::new(),
                    ..parent.clone()
                });
            RatedTitle {
                rating: rating.rating,
                date: rating.date,
                title: title.clone(),
                parent_title,
            }
        })
        .collect()
}

/// Index titles by external id.
pub fn index_titles(titles: Vec<Title>) -> HashMap<String, Title> {
    titles
        .into_iter()
        .map(|title| (title.imdb_id.clone(), title))
        .collect()
}
