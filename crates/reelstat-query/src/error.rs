use thiserror::Error;

/// A failed read, tagged with the operation and its inputs.
#[derive(Debug, Error)]
#[error("{operation}({params}) failed: {source}")]
pub struct QueryError {
    pub operation: &'static str,
    /// Debug rendering of the operation's input parameters.
    pub params: String,
    #[source]
    pub source: reelstat_core::Error,
}

impl QueryError {
    pub fn new(
        operation: &'static str,
        params: &dyn std::fmt::Debug,
        source: reelstat_core::Error,
    ) -> Self {
        Self {
            operation,
            params: format!("{params:?}"),
            source,
        }
    }
}

pub type QueryResult<T> = std::result::Result<T, QueryError>;
