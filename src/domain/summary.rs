//! Batch-level update summary

use super::UpdateResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Overall summary of an update batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateSummary {
    /// When the batch started
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the batch
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
    /// Per-recipe results, ordered by recipe name
    pub results: Vec<UpdateResult>,
}

fn serialize_secs<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(duration.as_secs_f64())
}

impl UpdateSummary {
    /// Creates a new summary; results are sorted by recipe name
    pub fn new(started_at: DateTime<Utc>, duration: Duration, mut results: Vec<UpdateResult>) -> Self {
        results.sort_by(|a, b| a.recipe.cmp(&b.recipe));
        Self {
            started_at,
            duration,
            results,
        }
    }

    /// Number of recipes updated
    pub fn done_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_done()).count()
    }

    /// Number of recipes that failed
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }

    /// Number of recipes skipped
    pub fn skipped_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_skipped()).count()
    }

    /// Returns true if any recipe ended Failed
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| r.is_failed())
    }
}
