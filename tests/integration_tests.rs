//! Integration tests for recipe-bump
//!
//! These tests verify:
//! - Status reports are deterministic and survive partial upstream failures
//! - Manifest edits add pins and preserve every byte outside the new entries
//! - Update workflow outcomes against in-memory upstream, runner and VCS

use recipe_bump::domain::{
    FailureKind, Gap, RecipeName, SkipReason, SourceRef, UpdateOutcome, UpstreamRelease,
};
use recipe_bump::error::UpstreamError;
use recipe_bump::fakes::{FakeTestRunner, FakeUpstream, FakeVcs};
use recipe_bump::manifest::RecipeManifest;
use recipe_bump::orchestrator::{UpdateOptions, UpdateOrchestrator};
use recipe_bump::status::StatusEngine;
use recipe_bump::upstream::UpstreamResolver;
use recipe_bump::version::{LineId, Version};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const ZLIB: &str = "https://github.com/madler/zlib";
const FMT: &str = "https://github.com/fmtlib/fmt";

/// Test fixture directory creation helper
fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Write a recipe with the given config.yml content and a matching conandata.yml
fn write_recipe(root: &Path, name: &str, homepage: &str, config: &str) {
    let dir = root.join("recipes").join(name);
    fs::create_dir_all(dir.join("all")).unwrap();
    fs::write(
        dir.join("all").join("conanfile.py"),
        format!(
            "from conan import ConanFile\n\nclass Recipe(ConanFile):\n    name = \"{}\"\n    homepage = \"{}\"\n",
            name, homepage
        ),
    )
    .unwrap();
    fs::write(dir.join("config.yml"), config).unwrap();
    fs::write(dir.join("all").join("conandata.yml"), conandata_for(config)).unwrap();
}

/// `sources:` entries for every version key of `config`
fn conandata_for(config: &str) -> String {
    let mut data = String::from("sources:\n");
    for line in config.lines() {
        let trimmed = line.trim_start();
        if line.len() - trimmed.len() != 2 || trimmed.starts_with('#') {
            continue;
        }
        let key = trimmed
            .split(':')
            .next()
            .unwrap_or_default()
            .trim_matches(|c| c == '"' || c == '\'');
        data.push_str(&format!(
            "  \"{}\":\n    url: \"https://example.com/{}.tar.gz\"\n",
            key, key
        ));
    }
    data
}

fn config_for(versions: &[&str]) -> String {
    let mut config = String::from("versions:\n");
    for version in versions {
        config.push_str(&format!("  \"{}\":\n    folder: all\n", version));
    }
    config
}

fn upstream() -> FakeUpstream {
    FakeUpstream::new()
        .with_releases(ZLIB, &["v1.2.12", "v1.2.13", "v1.3", "v1.3.1"])
        .with_releases(FMT, &["9.1.0", "10.0.0", "10.2.1", "11.0.0-rc1"])
}

fn resolver(fake: FakeUpstream) -> Arc<UpstreamResolver> {
    Arc::new(UpstreamResolver::new(Arc::new(fake)))
}

mod status_reports {
    use super::*;

    /// The report does not depend on concurrency or completion order
    #[tokio::test]
    async fn test_status_is_deterministic() {
        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "zlib", ZLIB, &config_for(&["1.2.12"]));
        write_recipe(temp_dir.path(), "fmt", FMT, &config_for(&["9.1.0", "10.0.0"]));
        let recipes = vec![RecipeName::new("zlib"), RecipeName::new("fmt")];

        let serial = StatusEngine::new(temp_dir.path(), resolver(upstream()))
            .compute(&recipes, true, 1)
            .await;
        let parallel = StatusEngine::new(temp_dir.path(), resolver(upstream()))
            .compute(&recipes, true, 8)
            .await;

        assert_eq!(serial, parallel);
        let order: Vec<(&str, Option<&str>)> = serial
            .records
            .iter()
            .map(|r| (r.recipe.as_str(), r.line.as_ref().map(|l| l.as_str())))
            .collect();
        assert_eq!(
            order,
            vec![
                ("fmt", Some("9.x")),
                ("fmt", Some("10.x")),
                ("zlib", Some("1.x")),
            ]
        );
    }

    /// Lines are compared within their own line only
    #[tokio::test]
    async fn test_lines_resolve_independently() {
        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "fmt", FMT, &config_for(&["9.1.0", "10.0.0"]));

        let report = StatusEngine::new(temp_dir.path(), resolver(upstream()))
            .compute(&[RecipeName::new("fmt")], true, 2)
            .await;

        assert_eq!(report.records[0].status, Gap::UpToDate);
        assert_eq!(report.records[1].status, Gap::Behind);
        assert_eq!(report.records[1].latest.as_ref().unwrap().raw(), "10.2.1");
        assert_eq!(report.summary.behind, 1);
        assert_eq!(report.summary.up_to_date, 1);
    }

    /// One failing upstream does not affect other recipes
    #[tokio::test]
    async fn test_partial_failure() {
        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "zlib", ZLIB, &config_for(&["1.2.12"]));
        write_recipe(temp_dir.path(), "fmt", FMT, &config_for(&["10.0.0"]));
        let fake = FakeUpstream::new()
            .with_releases(ZLIB, &["v1.3.1"])
            .with_error(FMT, UpstreamError::unavailable(FMT, "503 Service Unavailable"));

        let report = StatusEngine::new(temp_dir.path(), resolver(fake))
            .compute(&[RecipeName::new("zlib"), RecipeName::new("fmt")], true, 4)
            .await;

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].recipe.as_str(), "fmt");
        assert_eq!(report.records[0].status, Gap::Unknown);
        assert!(report.records[0].detail.as_deref().unwrap().contains("503"));
        assert_eq!(report.records[1].status, Gap::Behind);
        assert_eq!(report.summary.unknown, 1);
    }

    /// Slow upstreams finishing last do not reorder the report
    #[tokio::test]
    async fn test_status_order_ignores_completion_order() {
        let temp_dir = create_test_dir();
        let homepages = [
            ("alpha", "https://github.com/o/alpha", 60),
            ("beta", "https://github.com/o/beta", 30),
            ("gamma", "https://github.com/o/gamma", 0),
        ];
        let mut fake = FakeUpstream::new();
        for (name, homepage, delay) in homepages {
            write_recipe(temp_dir.path(), name, homepage, &config_for(&["1.0.0"]));
            fake = fake
                .with_releases(homepage, &["1.0.0", "1.1.0"])
                .with_delay(homepage, Duration::from_millis(delay));
        }
        let recipes = vec![
            RecipeName::new("alpha"),
            RecipeName::new("beta"),
            RecipeName::new("gamma"),
        ];

        let report = StatusEngine::new(temp_dir.path(), resolver(fake))
            .compute(&recipes, true, 3)
            .await;

        let order: Vec<&str> = report.records.iter().map(|r| r.recipe.as_str()).collect();
        assert_eq!(order, vec!["alpha", "beta", "gamma"]);
        assert!(report.records.iter().all(|r| r.status == Gap::Behind));
    }

    /// A failing recipe between two healthy ones only affects itself
    #[tokio::test]
    async fn test_partial_failure_in_the_middle() {
        let temp_dir = create_test_dir();
        let a = "https://github.com/o/a";
        let b = "https://github.com/o/b";
        let c = "https://github.com/o/c";
        write_recipe(temp_dir.path(), "a", a, &config_for(&["1.0.0"]));
        write_recipe(temp_dir.path(), "b", b, &config_for(&["1.0.0"]));
        write_recipe(temp_dir.path(), "c", c, &config_for(&["1.0.0"]));
        let fake = FakeUpstream::new()
            .with_releases(a, &["1.2.0"])
            .with_error(b, UpstreamError::unavailable(b, "HTTP 502"))
            .with_releases(c, &["1.0.0"]);

        let report = StatusEngine::new(temp_dir.path(), resolver(fake))
            .compute(
                &[RecipeName::new("a"), RecipeName::new("b"), RecipeName::new("c")],
                true,
                3,
            )
            .await;

        let statuses: Vec<(&str, Gap)> = report
            .records
            .iter()
            .map(|r| (r.recipe.as_str(), r.status))
            .collect();
        assert_eq!(
            statuses,
            vec![("a", Gap::Behind), ("b", Gap::Unknown), ("c", Gap::UpToDate)]
        );
    }

    /// A recipe behind by a whole major line is reported as behind
    #[tokio::test]
    async fn test_new_major_is_visible() {
        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "zlib", ZLIB, &config_for(&["1.2.0"]));
        let fake = FakeUpstream::new().with_releases(ZLIB, &["1.2.0", "2.0.0", "3.1.0"]);

        let report = StatusEngine::new(temp_dir.path(), resolver(fake))
            .compute(&[RecipeName::new("zlib")], true, 1)
            .await;

        assert_eq!(report.records[0].status, Gap::Behind);
        assert_eq!(report.records[0].latest.as_ref().unwrap().raw(), "3.1.0");
        assert_eq!(report.summary.behind, 1);
    }

    /// Snapshot-style pins never compare against arbitrary tag names
    #[tokio::test]
    async fn test_lexical_pin_is_not_behind() {
        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "zlib", ZLIB, &config_for(&["cci.20200101"]));
        let fake = FakeUpstream::new().with_releases(ZLIB, &["v1.0", "nightly", "stable"]);

        let report = StatusEngine::new(temp_dir.path(), resolver(fake))
            .compute(&[RecipeName::new("zlib")], true, 1)
            .await;

        assert_eq!(report.records[0].status, Gap::UpToDate);
        assert!(report.records[0].latest.is_none());
        assert_eq!(
            report.records[0].detail.as_deref(),
            Some("no matching upstream release")
        );
    }

    /// Upstream is fetched once per identity even when lines share it
    #[tokio::test]
    async fn test_upstream_fetched_once() {
        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "fmt", FMT, &config_for(&["9.1.0", "10.0.0"]));
        let fake = Arc::new(upstream());

        let engine = StatusEngine::new(
            temp_dir.path(),
            Arc::new(UpstreamResolver::new(fake.clone())),
        );
        engine.compute(&[RecipeName::new("fmt")], true, 2).await;

        assert_eq!(fake.fetch_count(FMT), 1);
    }
}

mod manifest_round_trip {
    use super::*;

    const CONFIG: &str = "# maintained by hand\nversions:\n  \"1.3\":\n    folder: all\n  # legacy line\n  \"1.2.13\":\n    folder: all\n";

    /// Loading and saving without changes yields identical bytes
    #[test]
    fn test_unchanged_round_trip() {
        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "zlib", ZLIB, CONFIG);
        let dir = temp_dir.path().join("recipes/zlib");

        let manifest = RecipeManifest::load(&dir).unwrap();
        assert_eq!(manifest.to_yaml_string(), CONFIG);
        manifest.save().unwrap();
        assert_eq!(fs::read_to_string(dir.join("config.yml")).unwrap(), CONFIG);
    }

    /// Adding a pin keeps the older pins and every other byte
    #[test]
    fn test_update_isolation() {
        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "zlib", ZLIB, CONFIG);
        let manifest = RecipeManifest::load(&temp_dir.path().join("recipes/zlib")).unwrap();

        let release = UpstreamRelease::new(
            Version::parse("v1.3.1"),
            SourceRef::url("https://example.com/1.3.1.tar.gz"),
        );
        let updated = manifest
            .apply_update(&LineId::new("1.x"), &release)
            .unwrap();

        let expected = "# maintained by hand\nversions:\n  \"1.3.1\":\n    folder: all\n  \"1.3\":\n    folder: all\n  # legacy line\n  \"1.2.13\":\n    folder: all\n";
        assert_eq!(updated.to_yaml_string(), expected);
        assert_eq!(manifest.to_yaml_string(), CONFIG);

        updated.save().unwrap();
        let data = fs::read_to_string(temp_dir.path().join("recipes/zlib/all/conandata.yml")).unwrap();
        assert!(data.starts_with(
            "sources:\n  \"1.3.1\":\n    url: \"https://example.com/1.3.1.tar.gz\"\n  \"1.3\":\n"
        ));
    }

    /// Updating one line leaves the other line's entries untouched
    #[test]
    fn test_other_line_byte_identical() {
        let config = "versions:\n  \"2.0.0\":\n    folder: all\n  '1.4.0': # keep\n    folder: all\n";
        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "zlib", ZLIB, config);
        let manifest = RecipeManifest::load(&temp_dir.path().join("recipes/zlib")).unwrap();

        let release = UpstreamRelease::new(Version::parse("2.1.0"), SourceRef::default());
        let updated = manifest
            .apply_update(&LineId::new("2.x"), &release)
            .unwrap()
            .to_yaml_string();

        assert!(updated.starts_with("versions:\n  \"2.1.0\":\n    folder: all\n"));
        assert!(updated.ends_with("  '1.4.0': # keep\n    folder: all\n"));
    }

    /// Pinning an existing version is rejected
    #[test]
    fn test_duplicate_pin_rejected() {
        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "zlib", ZLIB, CONFIG);
        let manifest = RecipeManifest::load(&temp_dir.path().join("recipes/zlib")).unwrap();

        let release = UpstreamRelease::new(Version::parse("v1.2.13"), SourceRef::default());
        assert!(manifest
            .apply_update(&LineId::new("1.x"), &release)
            .is_err());
    }
}

mod update_workflow {
    use super::*;

    fn orchestrator(
        root: &Path,
        runner: Arc<FakeTestRunner>,
        vcs: Arc<FakeVcs>,
        options: UpdateOptions,
    ) -> UpdateOrchestrator {
        UpdateOrchestrator::new(root, resolver(upstream().with_digests()), runner, vcs, options)
    }

    /// Behind recipe is updated, tested and committed on a new branch
    #[tokio::test]
    async fn test_done() {
        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "zlib", ZLIB, &config_for(&["1.2.12"]));
        let runner = Arc::new(FakeTestRunner::new());
        let vcs = Arc::new(FakeVcs::new());

        let summary = orchestrator(temp_dir.path(), runner.clone(), vcs.clone(), UpdateOptions::default())
            .run(&[RecipeName::new("zlib")])
            .await;

        let result = &summary.results[0];
        assert!(result.is_done());
        assert_eq!(result.branch(), Some("rb/zlib-1.3.1"));
        assert_eq!(result.updates[0].from.as_ref().unwrap().raw(), "1.2.12");

        let requests = runner.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].version, "1.3.1");
        assert!(requests[0].folder.ends_with("recipes/zlib/all"));

        let dir = temp_dir.path().join("recipes/zlib");
        let published = vcs.published();
        assert_eq!(
            published[0].files,
            vec![dir.join("config.yml"), dir.join("all/conandata.yml")]
        );

        let content = fs::read_to_string(dir.join("config.yml")).unwrap();
        assert_eq!(
            content,
            "versions:\n  \"1.3.1\":\n    folder: all\n  \"1.2.12\":\n    folder: all\n"
        );
        let data = fs::read_to_string(dir.join("all/conandata.yml")).unwrap();
        assert_eq!(
            data,
            "sources:\n  \"1.3.1\":\n    url: \"https://github.com/madler/zlib/archive/v1.3.1.tar.gz\"\n    sha256: \"sha256-of-v1.3.1\"\n  \"1.2.12\":\n    url: \"https://example.com/1.2.12.tar.gz\"\n"
        );
        assert!(!summary.has_failures());
    }

    /// Each behind line of a recipe is updated and tested
    #[tokio::test]
    async fn test_multiple_lines() {
        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "fmt", FMT, &config_for(&["9.0.0", "10.0.0"]));
        let runner = Arc::new(FakeTestRunner::new());
        let vcs = Arc::new(FakeVcs::new());

        let result = orchestrator(temp_dir.path(), runner.clone(), vcs.clone(), UpdateOptions::default())
            .update_recipe(&RecipeName::new("fmt"))
            .await;

        assert!(result.is_done());
        assert_eq!(result.updates.len(), 2);
        assert_eq!(result.branch(), Some("rb/fmt-10.2.1"));
        assert_eq!(runner.requests().len(), 2);
        assert_eq!(vcs.published()[0].message, "fmt: add versions 9.1.0, 10.2.1");
    }

    /// A failing build leaves the manifest byte-identical
    #[tokio::test]
    async fn test_test_failure_restores_manifest() {
        let temp_dir = create_test_dir();
        let config = config_for(&["1.2.12"]);
        write_recipe(temp_dir.path(), "zlib", ZLIB, &config);
        let runner = Arc::new(FakeTestRunner::new().failing(
            "zlib",
            "[HOOK - conan-center.py] pre_export(): ERROR: [LICENSE] license missing",
        ));
        let vcs = Arc::new(FakeVcs::new());

        let summary = orchestrator(temp_dir.path(), runner, vcs.clone(), UpdateOptions::default())
            .run(&[RecipeName::new("zlib")])
            .await;

        let result = &summary.results[0];
        assert_eq!(result.failure_kind(), Some(FailureKind::TestFailure));
        assert!(result.detail.as_deref().unwrap().contains("license missing"));
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("recipes/zlib/config.yml")).unwrap(),
            config
        );
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("recipes/zlib/all/conandata.yml")).unwrap(),
            conandata_for(&config)
        );
        assert!(vcs.published().is_empty());
        assert!(summary.has_failures());
    }

    /// Up-to-date and unmatched recipes are skipped with distinct reasons
    #[tokio::test]
    async fn test_skipped() {
        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "zlib", ZLIB, &config_for(&["1.3.1"]));
        write_recipe(temp_dir.path(), "fmt", FMT, &config_for(&["cci.20230101"]));

        let summary = orchestrator(
            temp_dir.path(),
            Arc::new(FakeTestRunner::new()),
            Arc::new(FakeVcs::new()),
            UpdateOptions::default(),
        )
        .run(&[RecipeName::new("zlib"), RecipeName::new("fmt")])
        .await;

        assert_eq!(
            summary.results[0].outcome,
            UpdateOutcome::Skipped {
                reason: SkipReason::NoCandidates
            }
        );
        assert_eq!(
            summary.results[1].outcome,
            UpdateOutcome::Skipped {
                reason: SkipReason::UpToDate
            }
        );
        assert!(!summary.has_failures());
    }

    /// An existing branch fails the recipe unless forced
    #[tokio::test]
    async fn test_branch_exists() {
        let temp_dir = create_test_dir();
        let config = config_for(&["1.2.12"]);
        write_recipe(temp_dir.path(), "zlib", ZLIB, &config);

        let vcs = Arc::new(FakeVcs::new().with_local_branch("rb/zlib-1.3.1"));
        let result = orchestrator(
            temp_dir.path(),
            Arc::new(FakeTestRunner::new()),
            vcs,
            UpdateOptions::default(),
        )
        .update_recipe(&RecipeName::new("zlib"))
        .await;
        assert_eq!(result.failure_kind(), Some(FailureKind::BranchExists));
        assert_eq!(result.detail.as_deref(), Some("branch already exists: rb/zlib-1.3.1"));
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("recipes/zlib/config.yml")).unwrap(),
            config
        );

        let vcs = Arc::new(FakeVcs::new().with_local_branch("rb/zlib-1.3.1"));
        let options = UpdateOptions {
            force: true,
            ..UpdateOptions::default()
        };
        let result = orchestrator(temp_dir.path(), Arc::new(FakeTestRunner::new()), vcs.clone(), options)
            .update_recipe(&RecipeName::new("zlib"))
            .await;
        assert!(result.is_done());
        assert!(vcs.published()[0].force);
    }

    /// Remote branches only count when pushing
    #[tokio::test]
    async fn test_remote_branch_checked_when_pushing() {
        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "zlib", ZLIB, &config_for(&["1.2.12"]));

        let options = UpdateOptions {
            push: true,
            ..UpdateOptions::default()
        };
        let result = orchestrator(
            temp_dir.path(),
            Arc::new(FakeTestRunner::new()),
            Arc::new(FakeVcs::new().with_remote_branch("rb/zlib-1.3.1")),
            options,
        )
        .update_recipe(&RecipeName::new("zlib"))
        .await;

        assert_eq!(result.failure_kind(), Some(FailureKind::BranchExists));
    }

    /// Upstream errors fail only the affected recipe
    #[tokio::test]
    async fn test_upstream_failure_is_scoped() {
        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "zlib", ZLIB, &config_for(&["1.2.12"]));
        write_recipe(temp_dir.path(), "fmt", FMT, &config_for(&["10.0.0"]));
        write_recipe(temp_dir.path(), "local", "https://example.com/local", &config_for(&["1.0"]));
        let fake = FakeUpstream::new()
            .with_releases(ZLIB, &["v1.3.1"])
            .with_error(FMT, UpstreamError::unavailable(FMT, "timed out"));

        let summary = UpdateOrchestrator::new(
            temp_dir.path(),
            resolver(fake),
            Arc::new(FakeTestRunner::new()),
            Arc::new(FakeVcs::new()),
            UpdateOptions {
                fetch_digest: false,
                ..UpdateOptions::default()
            },
        )
        .run(&[
            RecipeName::new("zlib"),
            RecipeName::new("fmt"),
            RecipeName::new("local"),
        ])
        .await;

        assert_eq!(summary.results[0].failure_kind(), Some(FailureKind::UpstreamUnavailable));
        assert_eq!(summary.results[1].failure_kind(), Some(FailureKind::UnsupportedUpstream));
        assert!(summary.results[2].is_done());
    }

    /// A malformed manifest is a parse failure
    #[tokio::test]
    async fn test_parse_error() {
        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "zlib", ZLIB, "versions: {\"1.0\": {folder: all}}\n");

        let result = orchestrator(
            temp_dir.path(),
            Arc::new(FakeTestRunner::new()),
            Arc::new(FakeVcs::new()),
            UpdateOptions::default(),
        )
        .update_recipe(&RecipeName::new("zlib"))
        .await;

        assert_eq!(result.failure_kind(), Some(FailureKind::ParseError));
    }

    /// A failed update leaves both files with their bytes and permissions
    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_update_keeps_file_modes() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "zlib", ZLIB, &config_for(&["1.2.12"]));
        let dir = temp_dir.path().join("recipes/zlib");
        let files = [dir.join("config.yml"), dir.join("all/conandata.yml")];
        for file in &files {
            fs::set_permissions(file, fs::Permissions::from_mode(0o644)).unwrap();
        }
        let before: Vec<Vec<u8>> = files.iter().map(|f| fs::read(f).unwrap()).collect();

        let result = orchestrator(
            temp_dir.path(),
            Arc::new(FakeTestRunner::new().failing("zlib", "ERROR: broken")),
            Arc::new(FakeVcs::new()),
            UpdateOptions::default(),
        )
        .update_recipe(&RecipeName::new("zlib"))
        .await;

        assert_eq!(result.failure_kind(), Some(FailureKind::TestFailure));
        for (file, bytes) in files.iter().zip(before) {
            assert_eq!(fs::read(file).unwrap(), bytes);
            let mode = fs::metadata(file).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o644, "{}", file.display());
        }
    }

    /// A successful update keeps the files' permissions too
    #[cfg(unix)]
    #[tokio::test]
    async fn test_done_keeps_file_modes() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "zlib", ZLIB, &config_for(&["1.2.12"]));
        let config = temp_dir.path().join("recipes/zlib/config.yml");
        fs::set_permissions(&config, fs::Permissions::from_mode(0o664)).unwrap();

        let result = orchestrator(
            temp_dir.path(),
            Arc::new(FakeTestRunner::new()),
            Arc::new(FakeVcs::new()),
            UpdateOptions::default(),
        )
        .update_recipe(&RecipeName::new("zlib"))
        .await;

        assert!(result.is_done());
        let mode = fs::metadata(&config).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o664);
    }

    /// Snapshot-style pins are skipped instead of rewritten to tag names
    #[tokio::test]
    async fn test_lexical_pin_is_skipped() {
        let temp_dir = create_test_dir();
        let config = config_for(&["cci.20200101"]);
        write_recipe(temp_dir.path(), "zlib", ZLIB, &config);
        let fake = FakeUpstream::new().with_releases(ZLIB, &["v1.0", "nightly", "stable"]);
        let vcs = Arc::new(FakeVcs::new());

        let result = UpdateOrchestrator::new(
            temp_dir.path(),
            resolver(fake),
            Arc::new(FakeTestRunner::new()),
            vcs.clone(),
            UpdateOptions::default(),
        )
        .update_recipe(&RecipeName::new("zlib"))
        .await;

        assert_eq!(
            result.outcome,
            UpdateOutcome::Skipped {
                reason: SkipReason::NoCandidates
            }
        );
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("recipes/zlib/config.yml")).unwrap(),
            config
        );
        assert!(vcs.published().is_empty());
    }

    /// Deprecated recipes are skipped without touching their files
    #[tokio::test]
    async fn test_deprecated_is_skipped() {
        let temp_dir = create_test_dir();
        write_recipe(temp_dir.path(), "zlib", ZLIB, &config_for(&["1.2.12"]));
        let conanfile = temp_dir.path().join("recipes/zlib/all/conanfile.py");
        let mut content = fs::read_to_string(&conanfile).unwrap();
        content.push_str("    deprecated = True\n");
        fs::write(&conanfile, content).unwrap();

        let summary = orchestrator(
            temp_dir.path(),
            Arc::new(FakeTestRunner::new()),
            Arc::new(FakeVcs::new()),
            UpdateOptions::default(),
        )
        .run(&[RecipeName::new("zlib")])
        .await;

        assert_eq!(
            summary.results[0].outcome,
            UpdateOutcome::Skipped {
                reason: SkipReason::Deprecated
            }
        );
        assert!(!summary.has_failures());
    }

    /// Recipes A, B, C with B failing: A and C still complete, in name order
    #[tokio::test]
    async fn test_middle_failure_with_slow_upstreams() {
        let temp_dir = create_test_dir();
        let a = "https://github.com/o/a";
        let b = "https://github.com/o/b";
        let c = "https://github.com/o/c";
        for (name, homepage) in [("a", a), ("b", b), ("c", c)] {
            write_recipe(temp_dir.path(), name, homepage, &config_for(&["1.0.0"]));
        }
        let fake = FakeUpstream::new()
            .with_releases(a, &["1.1.0"])
            .with_delay(a, Duration::from_millis(60))
            .with_releases(b, &["1.1.0"])
            .with_delay(b, Duration::from_millis(30))
            .with_releases(c, &["1.1.0"]);
        let runner = Arc::new(FakeTestRunner::new().failing("b", "ERROR: b does not build"));
        let vcs = Arc::new(FakeVcs::new());

        let summary = UpdateOrchestrator::new(
            temp_dir.path(),
            resolver(fake),
            runner,
            vcs.clone(),
            UpdateOptions {
                concurrency: 3,
                fetch_digest: false,
                ..UpdateOptions::default()
            },
        )
        .run(&[RecipeName::new("c"), RecipeName::new("b"), RecipeName::new("a")])
        .await;

        let names: Vec<&str> = summary.results.iter().map(|r| r.recipe.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(summary.results[0].is_done());
        assert_eq!(summary.results[1].failure_kind(), Some(FailureKind::TestFailure));
        assert!(summary.results[2].is_done());
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("recipes/b/config.yml")).unwrap(),
            config_for(&["1.0.0"])
        );
        assert_eq!(vcs.published().len(), 2);
    }
}
