//! Update orchestrator for coordinating the per-recipe update workflow
//!
//! This module provides:
//! - The state machine Resolving → Mutating → TestPending → Testing → Publishing
//! - Rollback of the manifest whenever a recipe ends Failed after writing
//! - Bounded parallelism across recipes with a separate test semaphore
//! - Error handling with partial continuation

use crate::domain::{
    FailureKind, LineUpdate, RecipeName, SkipReason, UpdateResult, UpdateState, UpdateSummary,
    UpstreamRelease,
};
use crate::error::{ManifestError, UpstreamError};
use crate::manifest::{recipe_dir, ManifestRollback, RecipeManifest};
use crate::pool::{default_concurrency, run_bounded, Cancellation};
use crate::progress::Progress;
use crate::runner::{TestRequest, TestRunner};
use crate::status::line_filters;
use crate::upstream::{UpstreamIdentity, UpstreamResolver};
use crate::vcs::{PublishRequest, VcsPublisher};
use chrono::Utc;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Default prefix for update branches
pub const DEFAULT_BRANCH_PREFIX: &str = "rb/";

/// Default number of concurrent test runs
pub const DEFAULT_TEST_CONCURRENCY: usize = 1;

/// Options for an update batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Maximum number of recipes processed at once
    pub concurrency: usize,
    /// Maximum number of test runs at once
    pub test_concurrency: usize,
    /// Run the test command before publishing
    pub run_tests: bool,
    /// Push the branch to the remote
    pub push: bool,
    /// Reset an existing branch instead of failing
    pub force: bool,
    /// Prefix for branch names
    pub branch_prefix: String,
    /// Record the sha256 of new source archives
    pub fetch_digest: bool,
    /// Let the newest line pick up releases of newer lines
    pub follow_new_lines: bool,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            test_concurrency: DEFAULT_TEST_CONCURRENCY,
            run_tests: true,
            push: false,
            force: false,
            branch_prefix: DEFAULT_BRANCH_PREFIX.to_string(),
            fetch_digest: true,
            follow_new_lines: true,
            show_progress: false,
        }
    }
}

/// A line that has a newer upstream release
struct PlannedUpdate {
    update: LineUpdate,
    release: UpstreamRelease,
}

/// Orchestrator for coordinating recipe updates
pub struct UpdateOrchestrator {
    root: PathBuf,
    resolver: Arc<UpstreamResolver>,
    runner: Arc<dyn TestRunner>,
    vcs: Arc<dyn VcsPublisher>,
    options: UpdateOptions,
    /// Serializes test runs across recipes
    test_semaphore: Arc<Semaphore>,
    cancellation: Cancellation,
}

impl UpdateOrchestrator {
    /// Create a new orchestrator over the repository at `root`
    pub fn new(
        root: impl Into<PathBuf>,
        resolver: Arc<UpstreamResolver>,
        runner: Arc<dyn TestRunner>,
        vcs: Arc<dyn VcsPublisher>,
        options: UpdateOptions,
    ) -> Self {
        let test_semaphore = Arc::new(Semaphore::new(options.test_concurrency.max(1)));
        Self {
            root: root.into(),
            resolver,
            runner,
            vcs,
            options,
            test_semaphore,
            cancellation: Cancellation::new(),
        }
    }

    /// Share a cancellation flag
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Options in effect
    pub fn options(&self) -> &UpdateOptions {
        &self.options
    }

    /// Update every named recipe; duplicates are processed once
    pub async fn run(&self, recipes: &[RecipeName]) -> UpdateSummary {
        let started_at = Utc::now();
        let started = Instant::now();
        let unique: Vec<RecipeName> = recipes
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut progress = Progress::new(self.options.show_progress);
        progress.start(unique.len() as u64, "Updating recipes");

        let batch = run_bounded(unique, self.options.concurrency, &self.cancellation, |name| {
            let progress = &progress;
            async move {
                let result = self.update_recipe(&name).await;
                progress.inc(name.as_str());
                result
            }
        })
        .await;
        progress.finish_and_clear();

        let mut results = batch.completed;
        results.extend(batch.undispatched.into_iter().map(|name| {
            let mut result = UpdateResult::skipped(name, SkipReason::Interrupted);
            result.detail = Some("interrupted".to_string());
            result
        }));

        let summary = UpdateSummary::new(started_at, started.elapsed(), results);
        tracing::info!(
            done = summary.done_count(),
            failed = summary.failed_count(),
            skipped = summary.skipped_count(),
            "update batch finished"
        );
        summary
    }

    /// Run the state machine for one recipe
    pub async fn update_recipe(&self, name: &RecipeName) -> UpdateResult {
        // Resolving
        let manifest = match RecipeManifest::load(&recipe_dir(&self.root, name)) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!(recipe = %name, error = %e, "failed to load manifest");
                return UpdateResult::failed(
                    name.clone(),
                    UpdateState::Resolving,
                    FailureKind::ParseError,
                    e.to_string(),
                );
            }
        };

        if manifest.is_deprecated() {
            tracing::info!(recipe = %name, "recipe is deprecated");
            return UpdateResult::skipped(name.clone(), SkipReason::Deprecated);
        }

        let planned = match self.resolve(&manifest).await {
            Ok(Some(planned)) => planned,
            Ok(None) => return self.skip_result(&manifest).await,
            Err(result) => return *result,
        };
        let updates: Vec<LineUpdate> = planned.iter().map(|p| p.update.clone()).collect();
        let fail = |state: UpdateState, kind: FailureKind, detail: String| {
            tracing::warn!(recipe = %name, ?state, %kind, %detail, "update failed");
            UpdateResult::failed(name.clone(), state, kind, detail).with_updates(updates.clone())
        };

        let branch = self.branch_name(name, &planned);
        match self.vcs.branch_exists(&branch, self.options.push).await {
            Ok(true) if !self.options.force => {
                return fail(
                    UpdateState::Resolving,
                    FailureKind::BranchExists,
                    format!("branch already exists: {}", branch),
                );
            }
            Ok(_) => {}
            Err(e) => return fail(UpdateState::Resolving, FailureKind::VcsError, e.to_string()),
        }

        // Mutating
        tracing::debug!(recipe = %name, state = ?UpdateState::Mutating, "applying releases");
        let mut updated = manifest.clone();
        for plan in &planned {
            let mut release = plan.release.clone();
            if self.options.fetch_digest && release.source.sha256.is_none() {
                match self.resolver.source_digest(&release).await {
                    Ok(Some(digest)) => release.source.sha256 = Some(digest),
                    Ok(None) => {}
                    Err(e) => {
                        return fail(UpdateState::Mutating, upstream_failure(&e), e.to_string())
                    }
                }
            }
            updated = match updated.apply_update(&plan.update.line, &release) {
                Ok(next) => next,
                Err(e) => return fail(UpdateState::Mutating, manifest_failure(&e), e.to_string()),
            };
        }

        // TestPending
        let files = updated.files();
        let guards = match files
            .iter()
            .map(ManifestRollback::capture)
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(guards) => guards,
            Err(e) => return fail(UpdateState::TestPending, FailureKind::Io, e.to_string()),
        };
        if let Err(e) = updated.save() {
            restore(guards, name);
            return fail(UpdateState::TestPending, FailureKind::Io, e.to_string());
        }

        // Testing
        if self.options.run_tests {
            if let Err(detail) = self.test(&updated, &planned).await {
                restore(guards, name);
                return fail(UpdateState::Testing, FailureKind::TestFailure, detail);
            }
        }

        // Publishing
        let request = PublishRequest {
            branch: branch.clone(),
            files,
            message: commit_message(name, &planned),
            push: self.options.push,
            force: self.options.force,
        };
        match self.vcs.publish(&request).await {
            Ok(published) => {
                guards.into_iter().for_each(ManifestRollback::commit);
                tracing::info!(recipe = %name, %branch, pushed = published.pushed, "recipe updated");
                UpdateResult::done(name.clone(), branch, published.pushed, updates)
            }
            Err(e) => {
                restore(guards, name);
                fail(UpdateState::Publishing, FailureKind::VcsError, e.to_string())
            }
        }
    }

    /// Lines with a newer release, or None when nothing is newer
    async fn resolve(
        &self,
        manifest: &RecipeManifest,
    ) -> Result<Option<Vec<PlannedUpdate>>, Box<UpdateResult>> {
        let name = manifest.name();
        let Some(upstream) = manifest.upstream() else {
            return Err(Box::new(UpdateResult::failed(
                name.clone(),
                UpdateState::Resolving,
                FailureKind::UnsupportedUpstream,
                "no upstream declared",
            )));
        };
        let identity = UpstreamIdentity::new(upstream);

        let mut planned = Vec::new();
        for (line, filter) in line_filters(manifest, self.options.follow_new_lines) {
            match self.resolver.latest(&identity, &filter).await {
                Ok(release) if release.version > line.latest.version => {
                    tracing::debug!(recipe = %name, line = %line.line, from = %line.latest.version, to = %release.version, "newer release");
                    let from = if release.version.line() == line.line {
                        Some(line.latest.version.clone())
                    } else {
                        None
                    };
                    planned.push(PlannedUpdate {
                        update: LineUpdate {
                            line: line.line,
                            from,
                            to: release.version.clone(),
                        },
                        release,
                    });
                }
                Ok(_) | Err(UpstreamError::NoCandidates { .. }) => {}
                Err(e) => {
                    return Err(Box::new(UpdateResult::failed(
                        name.clone(),
                        UpdateState::Resolving,
                        upstream_failure(&e),
                        e.to_string(),
                    )));
                }
            }
        }

        Ok((!planned.is_empty()).then_some(planned))
    }

    /// Skipped result distinguishing "nothing newer" from "nothing matches"
    async fn skip_result(&self, manifest: &RecipeManifest) -> UpdateResult {
        let mut any_candidates = false;
        if let Some(upstream) = manifest.upstream() {
            let identity = UpstreamIdentity::new(upstream);
            for (_, filter) in line_filters(manifest, self.options.follow_new_lines) {
                if self.resolver.latest(&identity, &filter).await.is_ok() {
                    any_candidates = true;
                    break;
                }
            }
        }
        let reason = if any_candidates {
            SkipReason::UpToDate
        } else {
            SkipReason::NoCandidates
        };
        tracing::info!(recipe = %manifest.name(), %reason, "nothing to update");
        UpdateResult::skipped(manifest.name().clone(), reason)
    }

    /// Run the test command once per updated line
    async fn test(&self, updated: &RecipeManifest, planned: &[PlannedUpdate]) -> Result<(), String> {
        let _permit = self
            .test_semaphore
            .acquire()
            .await
            .map_err(|e| e.to_string())?;

        for plan in planned {
            let pin = plan.release.pin();
            let folder = updated
                .entries()
                .iter()
                .find(|entry| entry.version.normalized() == pin)
                .map(|entry| updated.dir().join(&entry.folder))
                .unwrap_or_else(|| updated.dir().to_path_buf());
            let request = TestRequest {
                recipe: updated.name().clone(),
                version: pin.to_string(),
                folder,
            };

            let report = self.runner.run_test(&request).await.map_err(|e| e.to_string())?;
            if !report.success {
                tracing::debug!(recipe = %request.recipe, output = %report.output, "test output");
                return Err(report.details());
            }
        }
        Ok(())
    }

    /// `<prefix><recipe>-<highest new version>`
    fn branch_name(&self, name: &RecipeName, planned: &[PlannedUpdate]) -> String {
        let highest = planned
            .iter()
            .map(|p| &p.release.version)
            .max()
            .map(|v| v.normalized().to_string())
            .unwrap_or_default();
        format!("{}{}-{}", self.options.branch_prefix, name, highest)
    }
}

fn commit_message(name: &RecipeName, planned: &[PlannedUpdate]) -> String {
    let versions: Vec<&str> = planned.iter().map(|p| p.release.pin()).collect();
    if versions.len() == 1 {
        format!("{}: add version {}", name, versions[0])
    } else {
        format!("{}: add versions {}", name, versions.join(", "))
    }
}

fn restore(guards: Vec<ManifestRollback>, name: &RecipeName) {
    for guard in guards {
        let path = guard.path().to_path_buf();
        if let Err(e) = guard.restore() {
            tracing::error!(recipe = %name, path = %path.display(), error = %e, "failed to restore manifest");
        }
    }
}

fn upstream_failure(error: &UpstreamError) -> FailureKind {
    match error {
        UpstreamError::Unsupported { .. } | UpstreamError::NotFound { .. } => {
            FailureKind::UnsupportedUpstream
        }
        _ => FailureKind::UpstreamUnavailable,
    }
}

fn manifest_failure(error: &ManifestError) -> FailureKind {
    if error.is_parse_error() {
        FailureKind::ParseError
    } else {
        FailureKind::Io
    }
}
