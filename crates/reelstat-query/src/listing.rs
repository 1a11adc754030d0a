//! Filtering, sorting and paging of a user's joined ratings.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use reelstat_core::paging::{Page, PageLimits};

use crate::views::RatedTitle;

/// Field a rating listing is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRatingSort {
    #[default]
    Date,
    Rating,
    Name,
    Year,
}

impl FromStr for UserRatingSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "date" => Ok(Self::Date),
            "rating" => Ok(Self::Rating),
            "name" => Ok(Self::Name),
            "year" => Ok(Self::Year),
            other => Err(format!("unknown sort field: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Filters and paging for `list_user_ratings`. Every filter is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRatingQuery {
    pub rating: Option<u8>,
    /// Case-insensitive substring of the title name.
    pub name: Option<String>,
    /// Accepted title types; empty accepts all.
    pub types: Vec<String>,
    pub year: Option<i32>,
    pub parent_imdb_id: Option<String>,
    pub sort_by: UserRatingSort,
    pub direction: SortDirection,
    pub page: Option<u32>,
    pub items_per_page: Option<u32>,
}

impl UserRatingQuery {
    fn matches(&self, rated: &RatedTitle) -> bool {
        let title = &rated.title;
        if self.rating.is_some_and(|r| r != rated.rating) {
            return false;
        }
        if let Some(needle) = &self.name {
            let needle = needle.to_lowercase();
            let found = title
                .name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&needle));
            if !found {
                return false;
            }
        }
        if !self.types.is_empty() {
            let accepted = title
                .title_type
                .as_ref()
                .is_some_and(|t| self.types.contains(t));
            if !accepted {
                return false;
            }
        }
        if self.year.is_some() && self.year != title.year {
            return false;
        }
        if self.parent_imdb_id.is_some() && self.parent_imdb_id != title.parent_imdb_id {
            return false;
        }
        true
    }

    fn compare(&self, a: &RatedTitle, b: &RatedTitle) -> Ordering {
        let ordering = match self.sort_by {
            UserRatingSort::Date => a.date.cmp(&b.date),
            UserRatingSort::Rating => a.rating.cmp(&b.rating),
            UserRatingSort::Name => a.title.name.cmp(&b.title.name),
            UserRatingSort::Year => a.title.year.cmp(&b.title.year),
        };
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Apply `query` to the joined ratings and cut out the requested page.
pub fn paginate_ratings(
    rated: Vec<RatedTitle>,
    query: &UserRatingQuery,
    limits: &PageLimits,
) -> Page<RatedTitle> {
    let mut matching: Vec<RatedTitle> = rated.into_iter().filter(|r| query.matches(r)).collect();
    matching.sort_by(|a, b| query.compare(a, b));

    let window = limits.resolve(query.page, query.items_per_page);
    let pagination = window.pagination(matching.len() as u64);
    let offset = usize::try_from(window.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(window.limit()).unwrap_or(usize::MAX);
    let items = matching.into_iter().skip(offset).take(limit).collect();

    Page { pagination, items }
}
