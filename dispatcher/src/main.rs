//! Feedstock dispatch bot.
//!
//! `dispatcher run` handles one `repository_dispatch` event inside a GitHub
//! Actions job. The other subcommands run single stages against a local
//! checkout without touching any pull request.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use dispatcher::core::outcome::MutationOutcome;
use dispatcher::core::request::{RepoId, normalize_explicit_version};
use dispatcher::error::DispatchError;
use dispatcher::exit_codes;
use dispatcher::io::config::{DispatchConfig, load_config};
use dispatcher::io::event::load_event;
use dispatcher::io::generator::CommandGenerator;
use dispatcher::io::github::GithubClient;
use dispatcher::io::http::HttpFetcher;
use dispatcher::io::patcher::RecipeUpdater;
use dispatcher::io::publish::Credential;
use dispatcher::io::sources::default_sources;
use dispatcher::io::workspace::WorkingCopy;
use dispatcher::logging;
use dispatcher::pipeline::Pipeline;
use dispatcher::resolve::ResolverChain;
use dispatcher::update::{VersionUpdateExecutor, load_recipe};

#[derive(Parser)]
#[command(
    name = "dispatcher",
    version,
    about = "Rerender and version-update bot for feedstock pull requests"
)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true, env = "DISPATCHER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Handle the dispatch event of the current workflow run.
    Run {
        /// Path to the event payload.
        #[arg(long, env = "GITHUB_EVENT_PATH")]
        event_path: PathBuf,

        /// Name of the triggering event.
        #[arg(long, env = "GITHUB_EVENT_NAME")]
        event_name: String,

        /// Token used for the API and for pushing.
        #[arg(long, env = "INPUT_GITHUB_TOKEN", hide_env_values = true)]
        token: String,

        /// Account the token belongs to.
        #[arg(long, env = "GITHUB_ACTOR", default_value = "x-access-token")]
        actor: String,

        /// Id of the workflow run, linked from comments.
        #[arg(long, env = "GITHUB_RUN_ID")]
        run_id: Option<String>,

        /// Whether the token may push changes to workflow files.
        #[arg(
            long,
            env = "INPUT_CAN_WRITE_WORKFLOWS",
            value_parser = BoolishValueParser::new(),
            default_value = "false"
        )]
        can_write_workflows: bool,
    },
    /// Update the recipe of a local checkout and commit the result.
    UpdateVersion {
        #[arg(long)]
        feedstock_dir: PathBuf,

        /// `owner/name` of the feedstock, used to derive the package name.
        #[arg(long)]
        repo_name: String,

        /// Update to this version instead of the latest upstream one.
        #[arg(long)]
        input_version: Option<String>,
    },
    /// Print the latest upstream version of a local checkout's package.
    Resolve {
        #[arg(long)]
        feedstock_dir: PathBuf,

        #[arg(long)]
        repo_name: String,
    },
}

fn main() {
    logging::init();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!(err = %format!("{err:#}"), "invalid configuration");
            std::process::exit(exit_codes::INVALID);
        }
    };

    let code = match execute(cli.command, &config) {
        Ok(code) => code,
        Err(err) => {
            error!(err = %format!("{err:#}"), "dispatch failed");
            err.exit_code()
        }
    };
    info!(exit_code = code, "exiting");
    std::process::exit(code);
}

fn execute(command: Command, config: &DispatchConfig) -> Result<i32, DispatchError> {
    match command {
        Command::Run {
            event_path,
            event_name,
            token,
            actor,
            run_id,
            can_write_workflows,
        } => cmd_run(
            config,
            &event_name,
            &event_path,
            Credential::new(actor, token, can_write_workflows),
            run_id.as_deref(),
        ),
        Command::UpdateVersion {
            feedstock_dir,
            repo_name,
            input_version,
        } => cmd_update_version(config, &feedstock_dir, &repo_name, input_version.as_deref()),
        Command::Resolve {
            feedstock_dir,
            repo_name,
        } => cmd_resolve(config, &feedstock_dir, &repo_name),
    }
}

fn cmd_run(
    config: &DispatchConfig,
    event_name: &str,
    event_path: &Path,
    credential: Credential,
    run_id: Option<&str>,
) -> Result<i32, DispatchError> {
    let request = load_event(event_name, event_path)?;
    info!(
        action = %request.action(),
        repo = %request.repo(),
        pr = request.pr_number(),
        "dispatch event accepted"
    );

    let fetch = HttpFetcher::new(config.http_timeout())?;
    let resolver = ResolverChain::new(default_sources(&fetch, &config.api_url));
    let patcher = RecipeUpdater::new(&fetch);
    let generator = CommandGenerator::from_config(&config.generator)?;
    let host = GithubClient::new(&config.api_url, credential_token(&credential)?, config.http_timeout())?;

    let pipeline = Pipeline {
        config,
        host: &host,
        generator: &generator,
        resolver: &resolver,
        patcher: &patcher,
        credential: &credential,
        run_id,
    };
    let report = pipeline.run(&request)?;
    Ok(report.exit_code())
}

fn credential_token(credential: &Credential) -> Result<&str> {
    let token = credential.token();
    if token.is_empty() {
        anyhow::bail!("INPUT_GITHUB_TOKEN is empty");
    }
    Ok(token)
}

fn cmd_update_version(
    config: &DispatchConfig,
    feedstock_dir: &Path,
    repo_name: &str,
    input_version: Option<&str>,
) -> Result<i32, DispatchError> {
    let repo = RepoId::parse(repo_name).map_err(|err| DispatchError::InvalidEvent(format!("{err:#}")))?;
    let copy = WorkingCopy::open(feedstock_dir)?;
    let explicit = normalize_explicit_version(input_version);

    let fetch = HttpFetcher::new(config.http_timeout())?;
    let resolver = ResolverChain::new(default_sources(&fetch, &config.api_url));
    let patcher = RecipeUpdater::new(&fetch);
    let outcome = VersionUpdateExecutor::new(&resolver, &patcher).update_version(
        copy.git(),
        repo.package_name(),
        explicit.as_deref(),
    );

    match &outcome {
        MutationOutcome::Changed { .. } => {
            println!("{}", copy.git().head_sha()?);
            Ok(exit_codes::OK)
        }
        MutationOutcome::Unchanged => {
            info!("recipe already up to date");
            Ok(exit_codes::OK)
        }
        MutationOutcome::Errored(err) => {
            error!(kind = err.kind(), err = %err, "version update failed");
            Ok(exit_codes::FAILED)
        }
    }
}

fn cmd_resolve(
    config: &DispatchConfig,
    feedstock_dir: &Path,
    repo_name: &str,
) -> Result<i32, DispatchError> {
    let repo = RepoId::parse(repo_name).map_err(|err| DispatchError::InvalidEvent(format!("{err:#}")))?;
    let copy = WorkingCopy::open(feedstock_dir)?;
    let recipe = load_recipe(copy.git()).context("load recipe")?;

    let fetch = HttpFetcher::new(config.http_timeout())?;
    let resolver = ResolverChain::new(default_sources(&fetch, &config.api_url));
    match resolver.latest(repo.package_name(), &recipe) {
        Ok(candidate) => {
            println!("{}", candidate.version);
            Ok(exit_codes::OK)
        }
        Err(err) => {
            error!(err = %err, "no upstream version");
            Ok(exit_codes::FAILED)
        }
    }
}
