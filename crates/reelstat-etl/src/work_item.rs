use serde::{Deserialize, Serialize};
use std::fmt;
use treadle::WorkItem;

/// One refresh run flowing through the ratings → basics → episodes stages.
///
/// Every run gets a fresh id so the state store never treats a new run as
/// already complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRun {
    id: String,
    /// Whether the run was triggered by hand.
    pub forced: bool,
}

impl RefreshRun {
    #[must_use]
    pub fn new(forced: bool) -> Self {
        Self {
            id: format!("refresh-{}", uuid::Uuid::new_v4()),
            forced,
        }
    }
}

impl WorkItem for RefreshRun {
    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for RefreshRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
