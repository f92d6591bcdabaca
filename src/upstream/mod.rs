//! Upstream release discovery
//!
//! This module provides:
//! - UpstreamSource, the capability that lists releases of an upstream project
//! - HTTP client shared foundation with retry logic
//! - GitHub tags adapter
//! - UpstreamResolver, which caches lookups and picks the newest matching release

mod client;
mod github;
mod resolver;

pub use client::HttpClient;
pub use github::{GitHubRepo, GitHubSource};
pub use resolver::UpstreamResolver;

use crate::domain::UpstreamRelease;
use crate::error::UpstreamError;
use crate::version::{LineId, Scheme, Version};
use async_trait::async_trait;
use std::fmt;

/// Identity of an upstream project, usually its homepage URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpstreamIdentity(String);

impl UpstreamIdentity {
    /// Creates a new identity
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into().trim().to_string())
    }

    /// Returns the identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpstreamIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UpstreamIdentity {
    fn from(identity: &str) -> Self {
        Self::new(identity)
    }
}

/// Which upstream releases a pinned line accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineFilter {
    /// Releases on the same line as the pin
    Exact(Version),
    /// Releases on the same line, or newer releases of the same scheme
    AtLeast(Version),
}

impl LineFilter {
    /// Filter for the line of `pinned`
    pub fn exact(pinned: &Version) -> Self {
        LineFilter::Exact(pinned.clone())
    }

    /// Filter for the line of `pinned` that also follows newer lines
    pub fn at_least(pinned: &Version) -> Self {
        LineFilter::AtLeast(pinned.clone())
    }

    /// The pin this filter was built from
    pub fn pinned(&self) -> &Version {
        match self {
            LineFilter::Exact(v) | LineFilter::AtLeast(v) => v,
        }
    }

    /// Line of the pin
    pub fn line(&self) -> LineId {
        self.pinned().line()
    }

    /// Returns true if `candidate` is acceptable for this line
    ///
    /// Pre-releases only qualify when the pin is itself a pre-release.
    /// Lexical candidates never qualify: their order carries no meaning.
    pub fn matches(&self, candidate: &Version) -> bool {
        let pinned = self.pinned();
        if candidate.scheme() == Scheme::Lexical {
            return false;
        }
        if candidate.is_prerelease() && !pinned.is_prerelease() {
            return false;
        }
        if candidate.line() == pinned.line() {
            return true;
        }
        match self {
            LineFilter::Exact(_) => false,
            LineFilter::AtLeast(_) => {
                candidate.scheme() == pinned.scheme() && candidate > pinned
            }
        }
    }
}

impl fmt::Display for LineFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineFilter::Exact(v) => write!(f, "{}", v.line()),
            LineFilter::AtLeast(v) => write!(f, "{}+", v.line()),
        }
    }
}

/// Capability that lists the releases of an upstream project
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Source name used in logs
    fn name(&self) -> &'static str;

    /// Fetch all releases of `identity`
    async fn fetch_releases(
        &self,
        identity: &UpstreamIdentity,
    ) -> Result<Vec<UpstreamRelease>, UpstreamError>;

    /// sha256 of the release archive, when the source can compute it
    async fn source_digest(
        &self,
        _release: &UpstreamRelease,
    ) -> Result<Option<String>, UpstreamError> {
        Ok(None)
    }
}
