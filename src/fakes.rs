//! In-memory fakes for the external capabilities
//!
//! Provides `FakeUpstream`, `FakeTestRunner` and `FakeVcs`, which satisfy the
//! trait contracts without network, build tools or git. Built for unit tests
//! and, through the `test-support` feature, for the integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{SourceRef, UpstreamRelease};
use crate::error::{RunnerError, UpstreamError, VcsError};
use crate::runner::{TestReport, TestRequest, TestRunner};
use crate::upstream::{UpstreamIdentity, UpstreamSource};
use crate::vcs::{PublishRequest, Published, VcsPublisher};
use crate::version::Version;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Upstream source answering from a fixed table of tags
#[derive(Debug, Default)]
pub struct FakeUpstream {
    releases: HashMap<String, Result<Vec<UpstreamRelease>, UpstreamError>>,
    delays: HashMap<String, Duration>,
    digests: bool,
    fetches: Mutex<HashMap<String, usize>>,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `tags` for `identity`
    pub fn with_releases(mut self, identity: &str, tags: &[&str]) -> Self {
        let releases = tags
            .iter()
            .map(|tag| {
                UpstreamRelease::new(
                    Version::parse(tag),
                    SourceRef::url(format!("{}/archive/{}.tar.gz", identity, tag)),
                )
            })
            .collect();
        self.releases.insert(identity.to_string(), Ok(releases));
        self
    }

    /// Fail every lookup of `identity` with `error`
    pub fn with_error(mut self, identity: &str, error: UpstreamError) -> Self {
        self.releases.insert(identity.to_string(), Err(error));
        self
    }

    /// Answer lookups of `identity` only after `delay`
    pub fn with_delay(mut self, identity: &str, delay: Duration) -> Self {
        self.delays.insert(identity.to_string(), delay);
        self
    }

    /// Report a digest derived from the archive URL
    pub fn with_digests(mut self) -> Self {
        self.digests = true;
        self
    }

    /// Number of fetches made for `identity`
    pub fn fetch_count(&self, identity: &str) -> usize {
        lock(&self.fetches)
            .get(identity)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl UpstreamSource for FakeUpstream {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn fetch_releases(
        &self,
        identity: &UpstreamIdentity,
    ) -> Result<Vec<UpstreamRelease>, UpstreamError> {
        *lock(&self.fetches)
            .entry(identity.as_str().to_string())
            .or_default() += 1;

        // yield so concurrent lookups actually overlap
        match self.delays.get(identity.as_str()) {
            Some(delay) => tokio::time::sleep(*delay).await,
            None => tokio::task::yield_now().await,
        }

        self.releases
            .get(identity.as_str())
            .cloned()
            .unwrap_or_else(|| Err(UpstreamError::unsupported(identity.as_str())))
    }

    async fn source_digest(
        &self,
        release: &UpstreamRelease,
    ) -> Result<Option<String>, UpstreamError> {
        if !self.digests {
            return Ok(None);
        }
        Ok(Some(format!("sha256-of-{}", release.version.raw())))
    }
}

/// Test runner that passes unless told to fail a recipe
#[derive(Debug, Default)]
pub struct FakeTestRunner {
    failures: HashMap<String, String>,
    requests: Mutex<Vec<TestRequest>>,
}

impl FakeTestRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail tests of `recipe` with `output`
    pub fn failing(mut self, recipe: &str, output: &str) -> Self {
        self.failures.insert(recipe.to_string(), output.to_string());
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<TestRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl TestRunner for FakeTestRunner {
    async fn run_test(&self, request: &TestRequest) -> Result<TestReport, RunnerError> {
        lock(&self.requests).push(request.clone());
        let command = format!("fake-test {}/{}", request.recipe, request.version);
        match self.failures.get(request.recipe.as_str()) {
            Some(output) => Ok(TestReport::failure(command, output.clone())),
            None => Ok(TestReport::success(command, "ok")),
        }
    }
}

/// Publisher that records requests instead of running git
#[derive(Debug, Default)]
pub struct FakeVcs {
    local: Mutex<HashSet<String>>,
    remote: HashSet<String>,
    fail_publish: Option<String>,
    published: Mutex<Vec<PublishRequest>>,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `branch` already exists locally
    pub fn with_local_branch(self, branch: &str) -> Self {
        lock(&self.local).insert(branch.to_string());
        self
    }

    /// Pretend `branch` already exists on the remote
    pub fn with_remote_branch(mut self, branch: &str) -> Self {
        self.remote.insert(branch.to_string());
        self
    }

    /// Fail every publish with `stderr`
    pub fn failing(mut self, stderr: &str) -> Self {
        self.fail_publish = Some(stderr.to_string());
        self
    }

    /// Publish requests received so far
    pub fn published(&self) -> Vec<PublishRequest> {
        lock(&self.published).clone()
    }
}

#[async_trait]
impl VcsPublisher for FakeVcs {
    async fn branch_exists(&self, branch: &str, check_remote: bool) -> Result<bool, VcsError> {
        Ok(lock(&self.local).contains(branch)
            || (check_remote && self.remote.contains(branch)))
    }

    async fn publish(&self, request: &PublishRequest) -> Result<Published, VcsError> {
        if let Some(stderr) = &self.fail_publish {
            return Err(VcsError::command_failed("git push", stderr.clone()));
        }
        let mut local = lock(&self.local);
        if local.contains(&request.branch) && !request.force {
            return Err(VcsError::command_failed(
                "git update-ref",
                format!("reference already exists: {}", request.branch),
            ));
        }
        local.insert(request.branch.clone());
        lock(&self.published).push(request.clone());
        Ok(Published {
            commit: format!("fake-{}", request.branch),
            pushed: request.push,
        })
    }
}
