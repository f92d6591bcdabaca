//! recipe-bump - recipe version status and auto-update library
//!
//! This library provides the core functionality for keeping a repository of
//! package recipes current with upstream releases:
//! - Version parsing and cross-scheme ordering
//! - Upstream release discovery (GitHub tags)
//! - Recipe manifest (config.yml) reading and byte-preserving edits
//! - Status reports and the test-and-commit update workflow

pub mod cli;
pub mod domain;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod fakes;
pub mod logging;
pub mod manifest;
pub mod orchestrator;
pub mod output;
pub mod pool;
pub mod progress;
pub mod runner;
pub mod status;
pub mod upstream;
pub mod vcs;
pub mod version;
