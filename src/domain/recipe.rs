//! Recipe identity, pins and upstream releases

use crate::version::{LineId, Version};
use serde::Serialize;
use std::fmt;

/// Name of a recipe, unique within a recipe repository
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RecipeName(String);

impl RecipeName {
    /// Creates a new recipe name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecipeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Where the sources of a version come from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SourceRef {
    /// Archive URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// sha256 digest of the archive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl SourceRef {
    /// Creates a source reference with only a URL
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            sha256: None,
        }
    }

    /// Sets the digest (builder pattern)
    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }
}

/// A version currently pinned by a recipe manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinnedVersionEntry {
    /// Pinned version (the manifest key)
    pub version: Version,
    /// Recipe folder that builds this version
    pub folder: String,
    /// Source reference recorded for this version
    pub source: SourceRef,
}

impl PinnedVersionEntry {
    /// Returns the line this pin belongs to
    pub fn line(&self) -> LineId {
        self.version.line()
    }
}

/// A release discovered upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamRelease {
    /// Released version; `raw` holds the upstream tag
    pub version: Version,
    /// Where the release sources can be fetched
    pub source: SourceRef,
}

impl UpstreamRelease {
    /// Creates a new upstream release
    pub fn new(version: Version, source: SourceRef) -> Self {
        Self { version, source }
    }

    /// Version string to record in a recipe manifest
    pub fn pin(&self) -> &str {
        self.version.normalized()
    }
}

impl fmt::Display for UpstreamRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version)
    }
}
