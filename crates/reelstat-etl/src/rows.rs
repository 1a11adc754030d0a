//! Typed rows of the three dataset files and the user rating file.

use chrono::NaiveDate;
use serde::Serialize;

use crate::delimited::{optional, present, required, DelimitedRow, FieldError};

/// `(tconst, averageRating, numVotes)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingRow {
    pub imdb_id: String,
    pub average_rating: f64,
    pub num_votes: u64,
}

impl DelimitedRow for RatingRow {
    const COLUMNS: usize = 3;

    fn from_fields(fields: &[&str]) -> Result<Self, FieldError> {
        Ok(Self {
            imdb_id: required("tconst", fields[0])?,
            average_rating: required("averageRating", fields[1])?,
            num_votes: required("numVotes", fields[2])?,
        })
    }
}

/// `(tconst, titleType, primaryTitle, originalTitle, isAdult, startYear,
/// endYear, runtimeMinutes, genres)`
///
/// `originalTitle` and `isAdult` are read past but not kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasicsRow {
    pub imdb_id: String,
    pub title_type: Option<String>,
    pub primary_title: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub runtime_minutes: Option<u32>,
    pub genres: Vec<String>,
}

impl DelimitedRow for BasicsRow {
    const COLUMNS: usize = 9;

    fn from_fields(fields: &[&str]) -> Result<Self, FieldError> {
        Ok(Self {
            imdb_id: required("tconst", fields[0])?,
            title_type: present(fields[1]).map(String::from),
            primary_title: present(fields[2]).map(String::from),
            start_year: optional("startYear", fields[5]),
            end_year: optional("endYear", fields[6]),
            runtime_minutes: optional("runtimeMinutes", fields[7]),
            genres: present(fields[8])
                .map(|g| {
                    g.split(',')
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

/// `(tconst, parentTconst, seasonNumber, episodeNumber)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeRow {
    pub imdb_id: String,
    pub parent_imdb_id: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl DelimitedRow for EpisodeRow {
    const COLUMNS: usize = 4;

    fn from_fields(fields: &[&str]) -> Result<Self, FieldError> {
        Ok(Self {
            imdb_id: required("tconst", fields[0])?,
            parent_imdb_id: required("parentTconst", fields[1])?,
            season: optional("seasonNumber", fields[2]),
            episode: optional("episodeNumber", fields[3]),
        })
    }
}

/// `(tconst, rating, date)` from a user's comma-delimited export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRatingRow {
    pub imdb_id: String,
    /// 1 to 10.
    pub rating: u8,
    pub date: NaiveDate,
}

impl DelimitedRow for UserRatingRow {
    const COLUMNS: usize = 3;

    fn from_fields(fields: &[&str]) -> Result<Self, FieldError> {
        let rating: u8 = required("rating", fields[1])?;
        if !(1..=10).contains(&rating) {
            return Err(FieldError::new("rating", fields[1]));
        }
        let date = present(fields[2])
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .ok_or_else(|| FieldError::new("date", fields[2]))?;

        Ok(Self {
            imdb_id: required("tconst", fields[0])?,
            rating,
            date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_row() {
        let row = RatingRow::from_fields(&["tt0000001", "5.7", "2089"]).unwrap();
        assert_eq!(row.imdb_id, "tt0000001");
        assert!((row.average_rating - 5.7).abs() < f64::EPSILON);
        assert_eq!(row.num_votes, 2089);

        let err = RatingRow::from_fields(&["tt1", "5.7", "\\N"]).unwrap_err();
        assert_eq!(err.column, "numVotes");
    }

    #[test]
    fn test_basics_row_sentinels() {
        let row = BasicsRow::from_fields(&[
            "tt0000001",
            "short",
            "Carmencita",
            "Carmencita",
            "0",
            "1894",
            "\\N",
            "1",
            "Documentary,Short",
        ])
        .unwrap();
        assert_eq!(row.title_type.as_deref(), Some("short"));
        assert_eq!(row.primary_title.as_deref(), Some("Carmencita"));
        assert_eq!(row.start_year, Some(1894));
        assert_eq!(row.end_year, None);
        assert_eq!(row.runtime_minutes, Some(1));
        assert_eq!(row.genres, vec!["Documentary", "Short"]);

        let bare = BasicsRow::from_fields(&[
            "tt2", "\\N", "\\N", "\\N", "\\N", "\\N", "\\N", "\\N", "\\N",
        ])
        .unwrap();
        assert!(bare.title_type.is_none());
        assert!(bare.primary_title.is_none());
        assert!(bare.genres.is_empty());
    }

    #[test]
    fn test_basics_row_unparsable_optional_field() {
        let row = BasicsRow::from_fields(&[
            "tt3", "movie", "Odd Year", "Odd Year", "0", "abc", "\\N", "90", "Drama",
        ])
        .unwrap();
        assert!(row.start_year.is_none());
        assert_eq!(row.runtime_minutes, Some(90));
        assert_eq!(row.primary_title.as_deref(), Some("Odd Year"));
    }

    #[test]
    fn test_episode_row() {
        let row = EpisodeRow::from_fields(&["tt0041951", "tt0041038", "1", "9"]).unwrap();
        assert_eq!(row.parent_imdb_id, "tt0041038");
        assert_eq!(row.season, Some(1));
        assert_eq!(row.episode, Some(9));

        let unnumbered = EpisodeRow::from_fields(&["tt1", "tt2", "\\N", "\\N"]).unwrap();
        assert!(unnumbered.season.is_none());
        assert!(unnumbered.episode.is_none());

        assert!(EpisodeRow::from_fields(&["tt1", "\\N", "1", "1"]).is_err());
    }

    #[test]
    fn test_user_rating_row() {
        let row = UserRatingRow::from_fields(&["tt0111161", "9", "2020-01-31"]).unwrap();
        assert_eq!(row.rating, 9);
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2020, 1, 31).unwrap());

        assert_eq!(
            UserRatingRow::from_fields(&["tt1", "11", "2020-01-31"])
                .unwrap_err()
                .column,
            "rating"
        );
        assert_eq!(
            UserRatingRow::from_fields(&["tt1", "0", "2020-01-31"])
                .unwrap_err()
                .column,
            "rating"
        );
        assert_eq!(
            UserRatingRow::from_fields(&["tt1", "7", "31/01/2020"])
                .unwrap_err()
                .column,
            "date"
        );
    }
}
