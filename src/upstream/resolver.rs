//! Cached release lookups and latest-release selection

use super::{LineFilter, UpstreamIdentity, UpstreamSource};
use crate::domain::UpstreamRelease;
use crate::error::UpstreamError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

type ReleaseCell = Arc<OnceCell<Result<Arc<Vec<UpstreamRelease>>, UpstreamError>>>;

/// Resolves upstream releases, sharing one lookup per identity
pub struct UpstreamResolver {
    source: Arc<dyn UpstreamSource>,
    cache: Mutex<HashMap<UpstreamIdentity, ReleaseCell>>,
}

impl UpstreamResolver {
    /// Create a resolver over `source`
    pub fn new(source: Arc<dyn UpstreamSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// All releases of `identity`
    ///
    /// Concurrent and repeated calls for the same identity share one fetch,
    /// including its failure.
    pub async fn releases(
        &self,
        identity: &UpstreamIdentity,
    ) -> Result<Arc<Vec<UpstreamRelease>>, UpstreamError> {
        let cell = {
            let mut cache = self
                .cache
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            cache.entry(identity.clone()).or_default().clone()
        };

        cell.get_or_init(|| async {
            tracing::debug!(source = self.source.name(), upstream = %identity, "looking up releases");
            self.source.fetch_releases(identity).await.map(Arc::new)
        })
        .await
        .clone()
    }

    /// Newest release of `identity` accepted by `filter`
    pub async fn latest(
        &self,
        identity: &UpstreamIdentity,
        filter: &LineFilter,
    ) -> Result<UpstreamRelease, UpstreamError> {
        let releases = self.releases(identity).await?;
        releases
            .iter()
            .filter(|release| filter.matches(&release.version))
            .max_by(|a, b| a.version.cmp(&b.version))
            .cloned()
            .ok_or_else(|| UpstreamError::no_candidates(identity.as_str(), filter.to_string()))
    }

    /// sha256 of the release archive, when the source supports it
    pub async fn source_digest(
        &self,
        release: &UpstreamRelease,
    ) -> Result<Option<String>, UpstreamError> {
        self.source.source_digest(release).await
    }
}
