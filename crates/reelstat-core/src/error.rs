use thiserror::Error;

/// Errors raised by the stores in this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Genres are persisted as a JSON array.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// A user rating outside the 1-10 scale.
    #[error("rating {0} is outside 1..=10")]
    RatingOutOfRange(i64),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Returns `true` when the error only reports a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Database(rusqlite::Error::QueryReturnedNoRows)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
