//! GitHub tags adapter
//!
//! API: `GET /repos/{owner}/{repo}/tags?per_page=100&page=N`
//! Source archives: `https://github.com/{owner}/{repo}/archive/{tag}.tar.gz`

use super::{HttpClient, UpstreamIdentity, UpstreamSource};
use crate::domain::{SourceRef, UpstreamRelease};
use crate::error::UpstreamError;
use crate::version::Version;
use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Default base URL for the GitHub API
const DEFAULT_API_URL: &str = "https://api.github.com";

/// Base URL for source archives
const ARCHIVE_BASE_URL: &str = "https://github.com";

/// Tags requested per page
const PER_PAGE: usize = 100;

/// Maximum number of pages fetched per repository
const MAX_PAGES: usize = 10;

/// Owner and name of a GitHub repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubRepo {
    pub owner: String,
    pub repo: String,
}

impl GitHubRepo {
    /// Parse `https://github.com/<owner>/<repo>` (trailing `.git` or `/` tolerated)
    pub fn parse(identity: &str) -> Option<Self> {
        let rest = identity
            .trim()
            .strip_prefix("https://")
            .or_else(|| identity.trim().strip_prefix("http://"))?;
        let rest = rest.strip_prefix("www.").unwrap_or(rest);
        let path = rest.strip_prefix("github.com/")?;
        let path = path.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);

        let mut parts = path.split('/');
        let owner = parts.next().filter(|s| !s.is_empty())?;
        let repo = parts.next().filter(|s| !s.is_empty())?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    fn archive_url(&self, tag: &str) -> String {
        format!(
            "{}/{}/{}/archive/{}.tar.gz",
            ARCHIVE_BASE_URL, self.owner, self.repo, tag
        )
    }
}

/// Response item from the tags API
#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

/// Upstream source backed by GitHub tags
pub struct GitHubSource {
    client: HttpClient,
    api_url: String,
}

impl GitHubSource {
    /// Create a new adapter against api.github.com
    pub fn new(client: HttpClient) -> Self {
        Self::with_api_url(client, DEFAULT_API_URL)
    }

    /// Create a new adapter with a custom API base URL
    pub fn with_api_url(client: HttpClient, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    fn tags_url(&self, repo: &GitHubRepo, page: usize) -> String {
        format!(
            "{}/repos/{}/{}/tags?per_page={}&page={}",
            self.api_url, repo.owner, repo.repo, PER_PAGE, page
        )
    }
}

#[async_trait]
impl UpstreamSource for GitHubSource {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn fetch_releases(
        &self,
        identity: &UpstreamIdentity,
    ) -> Result<Vec<UpstreamRelease>, UpstreamError> {
        let repo = GitHubRepo::parse(identity.as_str())
            .ok_or_else(|| UpstreamError::unsupported(identity.as_str()))?;

        let mut releases = Vec::new();
        for page in 1..=MAX_PAGES {
            let url = self.tags_url(&repo, page);
            tracing::debug!(%url, "fetching tags");
            let tags = self
                .client
                .get_json::<Vec<Tag>>(&url, identity.as_str())
                .await?;
            let count = tags.len();

            releases.extend(tags.into_iter().map(|tag| {
                let source = SourceRef::url(repo.archive_url(&tag.name));
                UpstreamRelease::new(Version::parse(&tag.name), source)
            }));

            if count < PER_PAGE {
                break;
            }
        }

        tracing::debug!(upstream = %identity, count = releases.len(), "fetched releases");
        Ok(releases)
    }

    async fn source_digest(
        &self,
        release: &UpstreamRelease,
    ) -> Result<Option<String>, UpstreamError> {
        let Some(url) = release.source.url.as_deref() else {
            return Ok(None);
        };
        let bytes = self.client.get_bytes(url, url).await?;
        Ok(Some(hex::encode(Sha256::digest(&bytes))))
    }
}
