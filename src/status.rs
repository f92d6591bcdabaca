//! Status computation: how far each recipe line is behind upstream
//!
//! Recipes are evaluated in a bounded pool; the report order depends only on
//! recipe names and line order, never on completion order.

use crate::domain::{Gap, RecipeName, StatusRecord, StatusReport, StatusSummary};
use crate::error::UpstreamError;
use crate::manifest::{recipe_dir, PinnedLine, RecipeManifest};
use crate::pool::{run_bounded, Cancellation};
use crate::progress::Progress;
use crate::upstream::{LineFilter, UpstreamIdentity, UpstreamResolver};
use std::path::PathBuf;
use std::sync::Arc;

/// Filters for every pinned line of `manifest`
///
/// Only the newest line may follow newer lines, and only when asked to.
/// Older lines are kept apart so a new major never hides their own gaps.
pub(crate) fn line_filters(
    manifest: &RecipeManifest,
    follow_new_lines: bool,
) -> Vec<(PinnedLine, LineFilter)> {
    let lines = manifest.pinned_lines();
    let newest = lines.len().saturating_sub(1);
    lines
        .into_iter()
        .enumerate()
        .map(|(index, line)| {
            let filter = if follow_new_lines && index == newest {
                LineFilter::at_least(&line.latest.version)
            } else {
                LineFilter::exact(&line.latest.version)
            };
            (line, filter)
        })
        .collect()
}

/// Computes per-line status records for a set of recipes
pub struct StatusEngine {
    root: PathBuf,
    resolver: Arc<UpstreamResolver>,
    follow_new_lines: bool,
    cancellation: Cancellation,
    show_progress: bool,
}

impl StatusEngine {
    /// Create an engine over the repository at `root`
    pub fn new(root: impl Into<PathBuf>, resolver: Arc<UpstreamResolver>) -> Self {
        Self {
            root: root.into(),
            resolver,
            follow_new_lines: true,
            cancellation: Cancellation::new(),
            show_progress: false,
        }
    }

    /// Whether the newest line of each recipe follows newer lines (default on)
    pub fn with_follow_new_lines(mut self, follow: bool) -> Self {
        self.follow_new_lines = follow;
        self
    }

    /// Share a cancellation flag
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Draw a progress bar on stderr
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Compute the status of `recipes`
    ///
    /// Up-to-date records are dropped unless `include_up_to_date` is set, but
    /// they are always counted in the summary. Deprecated recipes are only
    /// counted.
    pub async fn compute(
        &self,
        recipes: &[RecipeName],
        include_up_to_date: bool,
        concurrency: usize,
    ) -> StatusReport {
        let mut progress = Progress::new(self.show_progress);
        progress.start(recipes.len() as u64, "Checking recipes");

        let batch = run_bounded(recipes.to_vec(), concurrency, &self.cancellation, |name| {
            let progress = &progress;
            async move {
                let records = self.recipe_status(&name).await;
                progress.inc(name.as_str());
                (name, records)
            }
        })
        .await;
        progress.finish_and_clear();

        let mut per_recipe = batch.completed;
        per_recipe.sort_by(|a, b| a.0.cmp(&b.0));

        let mut summary = StatusSummary {
            interrupted: batch.undispatched.len(),
            ..StatusSummary::default()
        };
        let mut records = Vec::new();
        for (_, recipe_records) in per_recipe {
            let Some(recipe_records) = recipe_records else {
                summary.deprecated += 1;
                continue;
            };
            for record in recipe_records {
                summary.record(record.status);
                if include_up_to_date || record.status != Gap::UpToDate {
                    records.push(record);
                }
            }
        }

        tracing::info!(
            behind = summary.behind,
            up_to_date = summary.up_to_date,
            unknown = summary.unknown,
            interrupted = summary.interrupted,
            deprecated = summary.deprecated,
            "status computed"
        );

        StatusReport { records, summary }
    }

    /// Records for one recipe, in line order; None for a deprecated recipe
    pub async fn recipe_status(&self, name: &RecipeName) -> Option<Vec<StatusRecord>> {
        let manifest = match RecipeManifest::load(&recipe_dir(&self.root, name)) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!(recipe = %name, error = %e, "failed to load manifest");
                return Some(vec![StatusRecord::unknown(name.clone(), None, None, e.to_string())]);
            }
        };
        if manifest.is_deprecated() {
            tracing::debug!(recipe = %name, "skipping deprecated recipe");
            return None;
        }

        let lines = line_filters(&manifest, self.follow_new_lines);
        let Some(upstream) = manifest.upstream() else {
            let records = lines
                .into_iter()
                .map(|(line, _)| {
                    StatusRecord::unknown(
                        name.clone(),
                        Some(line.line),
                        Some(line.latest.version),
                        "no upstream declared",
                    )
                })
                .collect();
            return Some(records);
        };
        let identity = UpstreamIdentity::new(upstream);

        let mut records = Vec::with_capacity(lines.len());
        for (line, filter) in lines {
            let current = line.latest.version.clone();
            let record = match self.resolver.latest(&identity, &filter).await {
                Ok(release) => {
                    StatusRecord::resolved(name.clone(), line.line, current, release.version)
                }
                Err(UpstreamError::NoCandidates { .. }) => {
                    StatusRecord::no_candidates(name.clone(), line.line, current)
                }
                Err(e) => {
                    tracing::debug!(recipe = %name, error = %e, "upstream lookup failed");
                    StatusRecord::unknown(name.clone(), Some(line.line), Some(current), e.to_string())
                }
            };
            records.push(record);
        }
        Some(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeUpstream;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn add_recipe(root: &Path, name: &str, homepage: &str, versions: &[&str]) {
        let dir = root.join("recipes").join(name);
        fs::create_dir_all(dir.join("all")).unwrap();
        fs::write(
            dir.join("all/conanfile.py"),
            format!("class C(ConanFile):\n    homepage = \"{}\"\n", homepage),
        )
        .unwrap();
        let mut config = String::from("versions:\n");
        for v in versions {
            config.push_str(&format!("  \"{}\":\n    folder: all\n", v));
        }
        fs::write(dir.join("config.yml"), config).unwrap();
    }

    fn engine(root: &Path, fake: FakeUpstream) -> StatusEngine {
        StatusEngine::new(root, Arc::new(UpstreamResolver::new(Arc::new(fake))))
    }

    #[test]
    fn line_filters_only_newest_follows() {
        let tmp = TempDir::new().unwrap();
        add_recipe(tmp.path(), "zlib", "h", &["1.2.0", "2.0.0"]);
        let manifest = RecipeManifest::load(&tmp.path().join("recipes/zlib")).unwrap();

        let filters = line_filters(&manifest, true);
        assert!(matches!(filters[0].1, LineFilter::Exact(_)));
        assert!(matches!(filters[1].1, LineFilter::AtLeast(_)));

        let filters = line_filters(&manifest, false);
        assert!(filters.iter().all(|(_, f)| matches!(f, LineFilter::Exact(_))));
    }

    #[tokio::test]
    async fn reports_per_line_gaps() {
        let tmp = TempDir::new().unwrap();
        add_recipe(tmp.path(), "zlib", "https://github.com/madler/zlib", &["1.2.0", "2.0.0"]);
        let fake = FakeUpstream::new().with_releases(
            "https://github.com/madler/zlib",
            &["v1.2.0", "v1.3.0", "v2.0.0"],
        );

        let report = engine(tmp.path(), fake)
            .compute(&[RecipeName::new("zlib")], true, 2)
            .await;

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].status, Gap::Behind);
        assert_eq!(report.records[0].latest.as_ref().unwrap().raw(), "v1.3.0");
        assert_eq!(report.records[1].status, Gap::UpToDate);
        assert_eq!(report.summary.behind, 1);
        assert_eq!(report.summary.up_to_date, 1);
    }

    #[tokio::test]
    async fn hides_up_to_date_but_counts_them() {
        let tmp = TempDir::new().unwrap();
        add_recipe(tmp.path(), "zlib", "https://github.com/madler/zlib", &["1.3.0"]);
        let fake = FakeUpstream::new().with_releases("https://github.com/madler/zlib", &["v1.3.0"]);

        let report = engine(tmp.path(), fake)
            .compute(&[RecipeName::new("zlib")], false, 2)
            .await;

        assert!(report.records.is_empty());
        assert_eq!(report.summary.up_to_date, 1);
    }

    #[tokio::test]
    async fn unparseable_manifest_is_one_unknown_record() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("recipes/broken");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.yml"), "versions: [\n").unwrap();

        let report = engine(tmp.path(), FakeUpstream::new())
            .compute(&[RecipeName::new("broken")], false, 1)
            .await;

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].status, Gap::Unknown);
        assert!(report.records[0].line.is_none());
    }

    #[tokio::test]
    async fn no_candidates_is_up_to_date_with_detail() {
        let tmp = TempDir::new().unwrap();
        add_recipe(tmp.path(), "zlib", "https://github.com/madler/zlib", &["1.3.0"]);
        let fake = FakeUpstream::new().with_releases("https://github.com/madler/zlib", &["v2.0.0"]);

        let report = engine(tmp.path(), fake)
            .with_follow_new_lines(false)
            .compute(&[RecipeName::new("zlib")], true, 1)
            .await;

        assert_eq!(report.records[0].status, Gap::UpToDate);
        assert!(report.records[0].latest.is_none());
        assert_eq!(
            report.records[0].detail.as_deref(),
            Some("no matching upstream release")
        );
    }

    #[tokio::test]
    async fn newer_major_shows_as_behind() {
        let tmp = TempDir::new().unwrap();
        add_recipe(tmp.path(), "zlib", "https://github.com/madler/zlib", &["1.2.0"]);
        let fake = FakeUpstream::new().with_releases(
            "https://github.com/madler/zlib",
            &["1.2.0", "2.0.0", "3.1.0"],
        );

        let report = engine(tmp.path(), fake)
            .compute(&[RecipeName::new("zlib")], true, 1)
            .await;

        assert_eq!(report.records[0].status, Gap::Behind);
        assert_eq!(report.records[0].latest.as_ref().unwrap().raw(), "3.1.0");
    }

    #[tokio::test]
    async fn lexical_pin_ignores_lexical_tags() {
        let tmp = TempDir::new().unwrap();
        add_recipe(tmp.path(), "zlib", "https://github.com/madler/zlib", &["cci.20200101"]);
        let fake = FakeUpstream::new().with_releases(
            "https://github.com/madler/zlib",
            &["v1.0", "nightly", "stable"],
        );

        let report = engine(tmp.path(), fake)
            .compute(&[RecipeName::new("zlib")], true, 1)
            .await;

        assert_eq!(report.records[0].status, Gap::UpToDate);
        assert!(report.records[0].latest.is_none());
        assert_eq!(
            report.records[0].detail.as_deref(),
            Some("no matching upstream release")
        );
    }

    #[tokio::test]
    async fn deprecated_recipes_are_counted_only() {
        let tmp = TempDir::new().unwrap();
        add_recipe(tmp.path(), "zlib", "https://github.com/madler/zlib", &["1.2.0"]);
        add_recipe(tmp.path(), "old", "https://github.com/madler/zlib", &["1.0.0"]);
        fs::write(
            tmp.path().join("recipes/old/all/conanfile.py"),
            "class C(ConanFile):\n    homepage = \"https://github.com/madler/zlib\"\n    deprecated = True\n",
        )
        .unwrap();
        let fake = FakeUpstream::new().with_releases("https://github.com/madler/zlib", &["1.3.0"]);

        let report = engine(tmp.path(), fake)
            .compute(&[RecipeName::new("old"), RecipeName::new("zlib")], true, 2)
            .await;

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].recipe.as_str(), "zlib");
        assert_eq!(report.summary.deprecated, 1);
        assert_eq!(report.summary.total(), 1);
    }

    #[tokio::test]
    async fn missing_upstream_is_unknown() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("recipes/foo");
        fs::create_dir_all(dir.join("all")).unwrap();
        fs::write(dir.join("all/conanfile.py"), "class Foo: pass\n").unwrap();
        fs::write(dir.join("config.yml"), "versions:\n  \"1.0\":\n    folder: all\n").unwrap();

        let report = engine(tmp.path(), FakeUpstream::new())
            .compute(&[RecipeName::new("foo")], true, 1)
            .await;

        assert_eq!(report.records[0].status, Gap::Unknown);
        assert_eq!(report.records[0].detail.as_deref(), Some("no upstream declared"));
    }

    #[tokio::test]
    async fn cancelled_batch_counts_interrupted() {
        let tmp = TempDir::new().unwrap();
        add_recipe(tmp.path(), "zlib", "https://github.com/madler/zlib", &["1.3.0"]);
        let cancellation = Cancellation::new();
        cancellation.cancel();

        let report = engine(tmp.path(), FakeUpstream::new())
            .with_cancellation(cancellation)
            .compute(&[RecipeName::new("zlib")], true, 1)
            .await;

        assert!(report.records.is_empty());
        assert_eq!(report.summary.interrupted, 1);
    }
}
