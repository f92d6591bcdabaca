//! Update orchestration result types

use super::RecipeName;
use crate::version::{LineId, Version};
use serde::Serialize;
use std::fmt;

/// States of the per-recipe update state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateState {
    /// Looking up upstream releases for each pinned line
    Resolving,
    /// Applying new releases to the in-memory manifest
    Mutating,
    /// Mutated manifest written, waiting for a test slot
    TestPending,
    /// Build/test runner in progress
    Testing,
    /// Creating the branch, committing and pushing
    Publishing,
    /// Terminal success
    Done,
    /// Terminal failure
    Failed,
    /// Terminal, nothing to do
    Skipped,
}

impl UpdateState {
    /// Returns true for Done, Failed and Skipped
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UpdateState::Done | UpdateState::Failed | UpdateState::Skipped
        )
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UpdateState::Resolving => "resolving",
            UpdateState::Mutating => "mutating",
            UpdateState::TestPending => "test pending",
            UpdateState::Testing => "testing",
            UpdateState::Publishing => "publishing",
            UpdateState::Done => "done",
            UpdateState::Failed => "failed",
            UpdateState::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

/// Category of a failed update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Manifest is malformed
    ParseError,
    /// Upstream lookup failed (transient)
    UpstreamUnavailable,
    /// No adapter understands the recipe's upstream
    UnsupportedUpstream,
    /// Build/test rejected the candidate
    TestFailure,
    /// Target branch already exists and force was not set
    BranchExists,
    /// Branch, commit or push failed
    VcsError,
    /// Local file operation failed
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::ParseError => "parse error",
            FailureKind::UpstreamUnavailable => "upstream unavailable",
            FailureKind::UnsupportedUpstream => "unsupported upstream",
            FailureKind::TestFailure => "test failure",
            FailureKind::BranchExists => "branch exists",
            FailureKind::VcsError => "vcs error",
            FailureKind::Io => "io error",
        };
        f.write_str(label)
    }
}

/// Reason why a recipe update was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Every line is at its latest release
    UpToDate,
    /// No upstream release matches any pinned line
    NoCandidates,
    /// The batch was interrupted before this recipe started
    Interrupted,
    /// The recipe's conanfile is marked deprecated
    Deprecated,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UpToDate => write!(f, "already at latest"),
            SkipReason::NoCandidates => write!(f, "no matching upstream release"),
            SkipReason::Interrupted => write!(f, "interrupted"),
            SkipReason::Deprecated => write!(f, "recipe is deprecated"),
        }
    }
}

/// Terminal outcome of one recipe update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// Manifest updated, tested and published
    Done {
        /// Branch holding the change
        branch: String,
        /// Whether the branch was pushed
        pushed: bool,
    },
    /// Update attempted and failed; the tree was left unchanged
    Failed {
        /// State in which the failure happened
        state: UpdateState,
        /// Failure category
        kind: FailureKind,
    },
    /// Nothing to do
    Skipped {
        /// Why the recipe was skipped
        reason: SkipReason,
    },
}

/// One line moved to a newer release
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineUpdate {
    /// Line identifier
    pub line: LineId,
    /// Previously pinned version (absent when the line is new)
    pub from: Option<Version>,
    /// Newly pinned version
    pub to: Version,
}

impl fmt::Display for LineUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.from {
            Some(from) => write!(f, "{}: {} → {}", self.line, from, self.to.normalized()),
            None => write!(f, "{}: new → {}", self.line, self.to.normalized()),
        }
    }
}

/// Terminal record of one orchestration run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateResult {
    /// Recipe name
    pub recipe: RecipeName,
    /// Outcome
    pub outcome: UpdateOutcome,
    /// Lines that were (or would have been) updated
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub updates: Vec<LineUpdate>,
    /// Human-readable cause for failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl UpdateResult {
    /// Creates a Done result
    pub fn done(
        recipe: RecipeName,
        branch: impl Into<String>,
        pushed: bool,
        updates: Vec<LineUpdate>,
    ) -> Self {
        Self {
            recipe,
            outcome: UpdateOutcome::Done {
                branch: branch.into(),
                pushed,
            },
            updates,
            detail: None,
        }
    }

    /// Creates a Failed result
    pub fn failed(
        recipe: RecipeName,
        state: UpdateState,
        kind: FailureKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            recipe,
            outcome: UpdateOutcome::Failed { state, kind },
            updates: Vec::new(),
            detail: Some(detail.into()),
        }
    }

    /// Creates a Skipped result
    pub fn skipped(recipe: RecipeName, reason: SkipReason) -> Self {
        Self {
            recipe,
            outcome: UpdateOutcome::Skipped { reason },
            updates: Vec::new(),
            detail: None,
        }
    }

    /// Attach the attempted line updates (builder pattern)
    pub fn with_updates(mut self, updates: Vec<LineUpdate>) -> Self {
        self.updates = updates;
        self
    }

    /// Terminal state of the state machine
    pub fn state(&self) -> UpdateState {
        match self.outcome {
            UpdateOutcome::Done { .. } => UpdateState::Done,
            UpdateOutcome::Failed { .. } => UpdateState::Failed,
            UpdateOutcome::Skipped { .. } => UpdateState::Skipped,
        }
    }

    /// Returns true if the update succeeded
    pub fn is_done(&self) -> bool {
        matches!(self.outcome, UpdateOutcome::Done { .. })
    }

    /// Returns true if the update failed
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, UpdateOutcome::Failed { .. })
    }

    /// Returns true if the recipe was skipped
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, UpdateOutcome::Skipped { .. })
    }

    /// Failure category, if failed
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self.outcome {
            UpdateOutcome::Failed { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// Branch name, if done
    pub fn branch(&self) -> Option<&str> {
        match &self.outcome {
            UpdateOutcome::Done { branch, .. } => Some(branch),
            _ => None,
        }
    }
}

impl fmt::Display for UpdateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            UpdateOutcome::Done { branch, pushed } => {
                let push = if *pushed { "pushed" } else { "not pushed" };
                write!(f, "{}: updated in branch {} ({})", self.recipe, branch, push)
            }
            UpdateOutcome::Failed { kind, .. } => {
                write!(f, "{}: failed ({})", self.recipe, kind)?;
                if let Some(detail) = &self.detail {
                    write!(f, ": {}", detail)?;
                }
                Ok(())
            }
            UpdateOutcome::Skipped { reason } => write!(f, "{}: skipped ({})", self.recipe, reason),
        }
    }
}
