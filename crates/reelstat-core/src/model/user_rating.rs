use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::ids::UserId;

/// One user's rating of one title. Unique on `(user_id, imdb_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRating {
    pub user_id: UserId,
    pub imdb_id: String,
    /// Integer score on a 1-10 scale.
    pub rating: u8,
    pub date: NaiveDate,
}

impl UserRating {
    /// Build a rating, rejecting scores outside 1-10.
    pub fn new(
        user_id: UserId,
        imdb_id: impl Into<String>,
        rating: i64,
        date: NaiveDate,
    ) -> Result<Self> {
        let rating = u8::try_from(rating)
            .ok()
            .filter(|r| (1..=10).contains(r))
            .ok_or(Error::RatingOutOfRange(rating))?;
        Ok(Self {
            user_id,
            imdb_id: imdb_id.into(),
            rating,
            date,
        })
    }

    /// Histogram bucket for this rating (`rating - 1`).
    pub fn bucket(&self) -> usize {
        usize::from(self.rating.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, 14).unwrap()
    }

    #[test]
    fn test_user_rating_bounds() {
        let user = UserId::new();
        assert!(UserRating::new(user, "tt1", 1, date()).is_ok());
        assert!(UserRating::new(user, "tt1", 10, date()).is_ok());
        assert!(matches!(
            UserRating::new(user, "tt1", 0, date()),
            Err(Error::RatingOutOfRange(0))
        ));
        assert!(UserRating::new(user, "tt1", 11, date()).is_err());
        assert!(UserRating::new(user, "tt1", -3, date()).is_err());
    }

    #[test]
    fn test_bucket() {
        let rating = UserRating::new(UserId::new(), "tt1", 7, date()).unwrap();
        assert_eq!(rating.bucket(), 6);
    }
}
