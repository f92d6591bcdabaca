//! Core domain models for recipe-bump
//!
//! This module contains the fundamental types used throughout the application:
//! - Recipe names, pinned versions and upstream releases
//! - Status records and report totals
//! - Update state machine states and terminal results
//! - Batch summary

mod recipe;
mod status;
mod summary;
mod update_result;

pub use recipe::{PinnedVersionEntry, RecipeName, SourceRef, UpstreamRelease};
pub use status::{Gap, StatusRecord, StatusReport, StatusSummary};
pub use summary::UpdateSummary;
pub use update_result::{FailureKind, LineUpdate, SkipReason, UpdateOutcome, UpdateResult, UpdateState};
