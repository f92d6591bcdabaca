//! recipe-bump - keeps package-recipe repositories current with upstream
//!
//! Subcommands:
//! - status: how far each pinned version line is behind upstream
//! - update: pin the newest releases, test them and commit on a branch

use clap::Parser;
use recipe_bump::cli::{select_recipes, Cli, Command, StatusArgs, UpdateArgs};
use recipe_bump::error::AppError;
use recipe_bump::logging::init_logging;
use recipe_bump::manifest::RepoSettings;
use recipe_bump::orchestrator::UpdateOrchestrator;
use recipe_bump::output::{create_formatter, OutputConfig};
use recipe_bump::pool::Cancellation;
use recipe_bump::runner::ConanTestRunner;
use recipe_bump::status::StatusEngine;
use recipe_bump::upstream::{GitHubSource, HttpClient, UpstreamResolver};
use recipe_bump::vcs::GitPublisher;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbosity());

    match run(cli).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Shared state for both subcommands
struct Context {
    settings: RepoSettings,
    resolver: Arc<UpstreamResolver>,
    cancellation: Cancellation,
}

fn setup(cli: &Cli) -> Result<Context, AppError> {
    let settings = RepoSettings::from_dir(&cli.root)?;
    let client = HttpClient::new()?.with_token(cli.github_token.clone());
    let resolver = Arc::new(UpstreamResolver::new(Arc::new(GitHubSource::new(client))));

    let cancellation = Cancellation::new();
    let flag = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; waiting for recipes in progress");
            flag.cancel();
        }
    });

    Ok(Context {
        settings,
        resolver,
        cancellation,
    })
}

/// Main application logic
async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    tracing::debug!(root = %cli.root.display(), "recipe-bump v{}", env!("CARGO_PKG_VERSION"));
    let context = setup(&cli)?;

    match &cli.command {
        Command::Status(args) => status(&cli, args, context).await,
        Command::Update(args) => update(&cli, args, context).await,
    }
}

async fn status(cli: &Cli, args: &StatusArgs, context: Context) -> anyhow::Result<ExitCode> {
    let recipes = select_recipes(&cli.root, &args.recipes)?;
    let engine = StatusEngine::new(&cli.root, context.resolver)
        .with_follow_new_lines(args.follow_new_lines(&context.settings))
        .with_cancellation(context.cancellation)
        .with_progress(!cli.quiet && !args.json);

    let report = engine
        .compute(&recipes, args.all, args.concurrency())
        .await;

    let formatter = create_formatter(OutputConfig::from_cli(args.json, cli.verbose > 0, cli.quiet));
    let mut stdout = io::stdout().lock();
    formatter.format_status(&report, &mut stdout)?;
    stdout.flush()?;

    Ok(ExitCode::SUCCESS)
}

async fn update(cli: &Cli, args: &UpdateArgs, context: Context) -> anyhow::Result<ExitCode> {
    let recipes = select_recipes(&cli.root, &args.names)?;
    let settings = &context.settings;

    let runner = match &settings.test_command {
        Some(command) => ConanTestRunner::new(command.clone()),
        None => ConanTestRunner::default(),
    };
    let vcs = GitPublisher::new(&cli.root, args.remote(settings));
    let options = args.options(settings, !cli.quiet && !args.json);

    let orchestrator = UpdateOrchestrator::new(
        &cli.root,
        context.resolver,
        Arc::new(runner),
        Arc::new(vcs),
        options,
    )
    .with_cancellation(context.cancellation);
    let summary = orchestrator.run(&recipes).await;

    let formatter = create_formatter(OutputConfig::from_cli(args.json, cli.verbose > 0, cli.quiet));
    let mut stdout = io::stdout().lock();
    formatter.format_update(&summary, &mut stdout)?;
    stdout.flush()?;

    if summary.has_failures() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
