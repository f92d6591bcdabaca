//! Status report types

use super::RecipeName;
use crate::version::{LineId, Version};
use serde::Serialize;
use std::fmt;

/// How far a pinned line is from upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Gap {
    /// Pin is at (or ahead of) the latest matching upstream release
    UpToDate,
    /// Upstream has a newer release for this line
    Behind,
    /// The gap could not be determined
    Unknown,
}

impl fmt::Display for Gap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gap::UpToDate => write!(f, "up-to-date"),
            Gap::Behind => write!(f, "behind"),
            Gap::Unknown => write!(f, "unknown"),
        }
    }
}

/// Status of one pinned line of one recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    /// Recipe name
    pub recipe: RecipeName,
    /// Line identifier, `None` when the recipe could not be loaded
    pub line: Option<LineId>,
    /// Latest pinned version of the line
    #[serde(rename = "current_version")]
    pub current: Option<Version>,
    /// Latest matching upstream version
    #[serde(rename = "latest_version")]
    pub latest: Option<Version>,
    /// Gap classification
    pub status: Gap,
    /// Human-readable cause for unknown records or notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StatusRecord {
    /// Record for a line whose upstream was resolved
    pub fn resolved(recipe: RecipeName, line: LineId, current: Version, latest: Version) -> Self {
        let status = if latest > current {
            Gap::Behind
        } else {
            Gap::UpToDate
        };
        Self {
            recipe,
            line: Some(line),
            current: Some(current),
            latest: Some(latest),
            status,
            detail: None,
        }
    }

    /// Record for a line without any matching upstream release
    pub fn no_candidates(recipe: RecipeName, line: LineId, current: Version) -> Self {
        Self {
            recipe,
            line: Some(line),
            current: Some(current),
            latest: None,
            status: Gap::UpToDate,
            detail: Some("no matching upstream release".to_string()),
        }
    }

    /// Record for a line whose upstream lookup failed
    pub fn unknown(
        recipe: RecipeName,
        line: Option<LineId>,
        current: Option<Version>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            recipe,
            line,
            current,
            latest: None,
            status: Gap::Unknown,
            detail: Some(detail.into()),
        }
    }

    /// Returns true if the line can be updated
    pub fn is_behind(&self) -> bool {
        self.status == Gap::Behind
    }
}

/// Totals over every evaluated line, including omitted ones
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    /// Lines at the latest release
    pub up_to_date: usize,
    /// Lines with a newer upstream release
    pub behind: usize,
    /// Lines whose status could not be determined
    pub unknown: usize,
    /// Recipes not evaluated because the run was interrupted
    pub interrupted: usize,
    /// Deprecated recipes, left out of the records
    pub deprecated: usize,
}

impl StatusSummary {
    /// Count a record
    pub fn record(&mut self, gap: Gap) {
        match gap {
            Gap::UpToDate => self.up_to_date += 1,
            Gap::Behind => self.behind += 1,
            Gap::Unknown => self.unknown += 1,
        }
    }

    /// Total number of evaluated lines
    pub fn total(&self) -> usize {
        self.up_to_date + self.behind + self.unknown
    }
}

/// Result of a status batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Records in deterministic order (recipe name, then line)
    pub records: Vec<StatusRecord>,
    /// Totals over all evaluated lines
    pub summary: StatusSummary,
}
