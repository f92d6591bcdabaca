//! CLI argument parsing module for recipe-bump

use crate::domain::RecipeName;
use crate::error::ConfigError;
use crate::manifest::{list_recipes, RepoSettings};
use crate::orchestrator::{UpdateOptions, DEFAULT_BRANCH_PREFIX, DEFAULT_TEST_CONCURRENCY};
use crate::pool::default_concurrency;
use crate::vcs::DEFAULT_REMOTE;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Keeps package-recipe repositories current with their upstream releases
#[derive(Parser, Debug, Clone)]
#[command(name = "recipe-bump", version, about)]
pub struct Cli {
    /// Root of the recipe repository
    #[arg(long, global = true, env = "RECIPE_BUMP_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors and the final summary
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// GitHub API token used for upstream lookups
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show how far each recipe line is behind upstream
    Status(StatusArgs),
    /// Add the newest upstream releases to recipes, test them and commit
    Update(UpdateArgs),
}

/// Arguments of `status`
#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Only check these recipes (can be specified multiple times)
    #[arg(long = "recipe", value_name = "NAME", action = ArgAction::Append)]
    pub recipes: Vec<String>,

    /// Include up-to-date lines in the report
    #[arg(long)]
    pub all: bool,

    /// Output the report in JSON format
    #[arg(long)]
    pub json: bool,

    /// Number of recipes checked concurrently
    #[arg(short, long, env = "RECIPE_BUMP_JOBS", value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,

    /// Keep the newest line of each recipe on its own major line
    #[arg(long)]
    pub no_new_lines: bool,
}

impl StatusArgs {
    /// Concurrency for the status pool
    pub fn concurrency(&self) -> usize {
        self.jobs.map(usize::from).unwrap_or_else(default_concurrency)
    }

    /// Whether to follow new lines; the flag wins, then the settings file
    pub fn follow_new_lines(&self, settings: &RepoSettings) -> bool {
        !self.no_new_lines && settings.follow_new_lines.unwrap_or(true)
    }
}

/// Arguments of `update`
#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    /// Recipes to update (default: every recipe)
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,

    /// Skip the build/test step
    #[arg(long)]
    pub no_test: bool,

    /// Push the branch to the remote
    #[arg(long)]
    pub push: bool,

    /// Remote to push to
    #[arg(long, requires = "push")]
    pub remote: Option<String>,

    /// Reset existing branches instead of failing
    #[arg(long)]
    pub force: bool,

    /// Number of recipes processed concurrently
    #[arg(short, long, env = "RECIPE_BUMP_JOBS", value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,

    /// Prefix for branch names
    #[arg(long, value_name = "PREFIX")]
    pub branch_prefix: Option<String>,

    /// Do not download archives to record their sha256
    #[arg(long)]
    pub no_digest: bool,

    /// Keep the newest line of each recipe on its own major line
    #[arg(long)]
    pub no_new_lines: bool,

    /// Output the results in JSON format
    #[arg(long)]
    pub json: bool,
}

impl UpdateArgs {
    /// Merge flags with repository settings; flags win
    pub fn options(&self, settings: &RepoSettings, show_progress: bool) -> UpdateOptions {
        UpdateOptions {
            concurrency: self.jobs.map(usize::from).unwrap_or_else(default_concurrency),
            test_concurrency: settings
                .test_concurrency
                .unwrap_or(DEFAULT_TEST_CONCURRENCY),
            run_tests: !self.no_test,
            push: self.push,
            force: self.force,
            branch_prefix: self
                .branch_prefix
                .clone()
                .or_else(|| settings.branch_prefix.clone())
                .unwrap_or_else(|| DEFAULT_BRANCH_PREFIX.to_string()),
            fetch_digest: !self.no_digest,
            follow_new_lines: !self.no_new_lines && settings.follow_new_lines.unwrap_or(true),
            show_progress,
        }
    }

    /// Remote to push to, falling back to the settings file
    pub fn remote(&self, settings: &RepoSettings) -> String {
        self.remote
            .clone()
            .or_else(|| settings.remote.clone())
            .unwrap_or_else(|| DEFAULT_REMOTE.to_string())
    }
}

impl Cli {
    /// Log verbosity: negative when quiet
    pub fn verbosity(&self) -> i8 {
        if self.quiet {
            -1
        } else {
            self.verbose.min(i8::MAX as u8) as i8
        }
    }
}

/// Recipes to process: `names` when given, otherwise every recipe
///
/// Fails when `root` is not a recipe repository.
pub fn select_recipes(root: &Path, names: &[String]) -> Result<Vec<RecipeName>, ConfigError> {
    let all = list_recipes(root)?;
    if names.is_empty() {
        return Ok(all);
    }
    Ok(names.iter().map(|n| RecipeName::new(n.trim())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("recipe-bump").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_status_defaults() {
        let cli = parse(&["status"]);
        assert_eq!(cli.root, PathBuf::from("."));
        assert_eq!(cli.verbosity(), 0);
        let Command::Status(args) = cli.command else {
            panic!("expected status");
        };
        assert!(args.recipes.is_empty());
        assert!(!args.all);
        assert!(!args.json);
        assert!(args.concurrency() >= 1);
    }

    #[test]
    fn test_status_recipes_multiple() {
        let cli = parse(&["status", "--recipe", "zlib", "--recipe", "fmt", "--all", "-j", "4"]);
        let Command::Status(args) = cli.command else {
            panic!("expected status");
        };
        assert_eq!(args.recipes, vec!["zlib", "fmt"]);
        assert!(args.all);
        assert_eq!(args.concurrency(), 4);
    }

    #[test]
    fn test_update_flags() {
        let cli = parse(&[
            "--root", "/repo", "-vv", "update", "zlib", "--no-test", "--push", "--remote",
            "upstream", "--force", "--no-digest",
        ]);
        assert_eq!(cli.root, PathBuf::from("/repo"));
        assert_eq!(cli.verbosity(), 2);
        let Command::Update(args) = cli.command else {
            panic!("expected update");
        };
        assert_eq!(args.names, vec!["zlib"]);

        let options = args.options(&RepoSettings::default(), false);
        assert!(!options.run_tests);
        assert!(options.push);
        assert!(options.force);
        assert!(!options.fetch_digest);
        assert_eq!(args.remote(&RepoSettings::default()), "upstream");
    }

    #[test]
    fn test_new_lines_followed_by_default() {
        let defaults = RepoSettings::default();
        let Command::Status(args) = parse(&["status"]).command else {
            panic!("expected status");
        };
        assert!(args.follow_new_lines(&defaults));
        let Command::Status(args) = parse(&["status", "--no-new-lines"]).command else {
            panic!("expected status");
        };
        assert!(!args.follow_new_lines(&defaults));

        let Command::Update(args) = parse(&["update"]).command else {
            panic!("expected update");
        };
        assert!(args.options(&defaults, false).follow_new_lines);
        let Command::Update(args) = parse(&["update", "--no-new-lines"]).command else {
            panic!("expected update");
        };
        assert!(!args.options(&defaults, false).follow_new_lines);
    }

    #[test]
    fn test_quiet_and_verbose_conflict() {
        let result = Cli::try_parse_from(["recipe-bump", "-q", "-v", "status"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_remote_requires_push() {
        let result = Cli::try_parse_from(["recipe-bump", "update", "--remote", "fork"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_jobs_must_be_positive() {
        let result = Cli::try_parse_from(["recipe-bump", "status", "-j", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_fill_defaults_and_flags_win() {
        let settings = RepoSettings {
            branch_prefix: Some("bump/".to_string()),
            remote: Some("fork".to_string()),
            test_concurrency: Some(2),
            follow_new_lines: Some(false),
            ..RepoSettings::default()
        };

        let Command::Update(args) = parse(&["update"]).command else {
            panic!("expected update");
        };
        let options = args.options(&settings, false);
        assert_eq!(options.branch_prefix, "bump/");
        assert_eq!(options.test_concurrency, 2);
        assert!(!options.follow_new_lines);
        assert_eq!(args.remote(&settings), "fork");

        let Command::Update(args) = parse(&["update", "--branch-prefix", "x/"]).command else {
            panic!("expected update");
        };
        assert_eq!(args.options(&settings, false).branch_prefix, "x/");
    }

    #[test]
    fn test_select_recipes() {
        let tmp = TempDir::new().unwrap();
        for name in ["zlib", "fmt"] {
            let dir = tmp.path().join("recipes").join(name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("config.yml"), "versions:\n").unwrap();
        }

        let all = select_recipes(tmp.path(), &[]).unwrap();
        assert_eq!(all, vec![RecipeName::new("fmt"), RecipeName::new("zlib")]);

        let some = select_recipes(tmp.path(), &["zlib".to_string()]).unwrap();
        assert_eq!(some, vec![RecipeName::new("zlib")]);

        assert!(select_recipes(&tmp.path().join("missing"), &[]).is_err());
    }
}
