//! `sentinel`: run the prompt safety workflow from a terminal.

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use sentinel_core::{AnalysisReport, AnalysisResult, Command, Step};
use sentinel_runtime::config::SERVICE_ENV;
use sentinel_runtime::{
    AnalysisService, ConfigError, RuntimeConfig, ServiceError, ServiceRegistry, WorkflowDriver,
    WorkflowHandle, WorkflowView,
};

mod interactive;
mod output;

/// Exit code when the pre-analysis gate blocks generation.
const EXIT_BLOCKED: u8 = 2;

/// Prompt safety workflow: scan a prompt, generate, scan the output
#[derive(Parser, Debug)]
#[command(name = "sentinel")]
#[command(version)]
struct Cli {
    /// YAML runtime config
    #[arg(long, global = true, value_name = "FILE", env = "SENTINEL_CONFIG")]
    config: Option<PathBuf>,

    /// Service to use, overriding the config ("mock" or "http")
    #[arg(long, global = true, value_name = "NAME")]
    service: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available agents
    Agents,

    /// Run a pre-analysis on some text and print the report
    Analyze {
        #[arg(long)]
        text: String,

        /// Print the raw result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the whole workflow for one prompt
    Run {
        #[arg(long)]
        prompt: String,

        /// Agent id; defaults to the first listed agent
        #[arg(long)]
        agent: Option<String>,

        /// Print results as JSON instead of reports
        #[arg(long)]
        json: bool,
    },

    /// Line-driven session
    Interactive,

    /// List service backends and their default options
    Services {
        /// Also check that the configured service is reachable
        #[arg(long)]
        check: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli).context("Failed to load config")?;
    let registry = ServiceRegistry::with_defaults();
    let service = registry
        .create(&config.service.provider, &config.service.options)
        .context("Failed to create analysis service")?;
    tracing::debug!(
        service = service.name(),
        timeout = ?config.service.timeout,
        "Analysis service ready"
    );

    match cli.command {
        Commands::Agents => {
            let agents = call(&config, service.list_agents()).await?;
            let selected = agents.first().map(|a| a.id.as_str());
            println!("{}", output::agents(&agents, selected));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Analyze { text, json } => {
            let result = call(&config, service.pre_analyze(&text)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                let report = AnalysisReport::build(&result, Some(&text), false);
                print!("{}", output::report(&report, None));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run {
            prompt,
            agent,
            json,
        } => run(service, &config, prompt, agent, json).await,
        Commands::Interactive => {
            interactive::session(service, &config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Services { check } => {
            print!("{}", output::services(&registry, &config.service.provider));
            if !check {
                return Ok(ExitCode::SUCCESS);
            }
            let healthy = tokio::time::timeout(config.service.timeout, service.health_check())
                .await
                .unwrap_or(false);
            println!("{}", output::health(service.name(), healthy));
            Ok(if healthy {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file, then environment, with `--service` taking precedence over
/// `SENTINEL_SERVICE`.
fn load_config(cli: &Cli) -> Result<RuntimeConfig, ConfigError> {
    RuntimeConfig::load(cli.config.as_deref(), |key| match key {
        SERVICE_ENV if cli.service.is_some() => cli.service.clone(),
        _ => std::env::var(key).ok(),
    })
}

/// One direct service call with the configured timeout.
async fn call<T>(
    config: &RuntimeConfig,
    fut: impl std::future::Future<Output = Result<T, ServiceError>>,
) -> Result<T> {
    let timeout = config.service.timeout;
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ServiceError::Timeout(timeout).into()),
    }
}

#[derive(Serialize)]
struct RunOutput<'a> {
    agent: Option<&'a str>,
    prompt: &'a str,
    blocked: bool,
    pre: Option<&'a AnalysisResult>,
    generated: Option<&'a str>,
    post: Option<&'a AnalysisResult>,
}

impl<'a> RunOutput<'a> {
    fn from_view(view: &'a WorkflowView, blocked: bool) -> Self {
        Self {
            agent: view.state.selected_agent(),
            prompt: view.state.prompt(),
            blocked,
            pre: view.state.pre_result(),
            generated: view.state.generated_text(),
            post: view.state.post_result(),
        }
    }
}

async fn run(
    service: Arc<dyn AnalysisService>,
    config: &RuntimeConfig,
    prompt: String,
    agent: Option<String>,
    json: bool,
) -> Result<ExitCode> {
    let handle = WorkflowDriver::spawn(service, config)?;
    load_agents(&handle).await?;
    if let Some(agent) = agent {
        handle.send(Command::SelectAgent(agent)).await?;
    }
    handle.send(Command::SetPrompt(prompt.clone())).await?;

    handle.send(Command::SubmitPrompt).await?;
    let view = until_idle(&handle, false).await?;
    fail_on_notice(&view)?;
    let pre = view
        .state
        .pre_result()
        .ok_or_else(|| anyhow!("pre-analysis finished without a result"))?;
    if !json {
        let report = AnalysisReport::build(pre, Some(&prompt), false);
        println!("{}", output::report(&report, None));
    }

    if !view.state.can_proceed() {
        if json {
            println!("{}", serde_json::to_string_pretty(&RunOutput::from_view(&view, true))?);
        } else {
            eprintln!("Generation blocked: {}", view.state.proceed_label());
        }
        return Ok(ExitCode::from(EXIT_BLOCKED));
    }

    handle.send(Command::Proceed).await?;
    let view = until_idle(&handle, !json).await?;
    fail_on_notice(&view)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&RunOutput::from_view(&view, false))?);
    } else {
        println!("\n");
        if let (Some(post), Some(text)) = (view.state.post_result(), view.state.generated_text()) {
            let report = AnalysisReport::build(post, Some(text), true);
            print!("{}", output::report(&report, None));
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub(crate) async fn load_agents(handle: &WorkflowHandle) -> Result<WorkflowView> {
    handle.send(Command::LoadAgents).await?;
    let view = handle
        .wait_until(|v| !v.state.agents().is_empty() || v.notice.is_some())
        .await?;
    fail_on_notice(&view)?;
    Ok(view)
}

pub(crate) fn fail_on_notice(view: &WorkflowView) -> Result<()> {
    match &view.notice {
        Some(notice) => bail!("{} failed: {}", notice.step.label(), notice.message),
        None => Ok(()),
    }
}

/// Wait until no service call is in flight, optionally echoing the reveal
/// to stdout as it progresses.
pub(crate) async fn until_idle(handle: &WorkflowHandle, stream: bool) -> Result<WorkflowView> {
    let mut views = handle.subscribe();
    let mut printed = 0;
    loop {
        let view = views.borrow_and_update().clone();
        if stream && view.state.step() >= Step::Generating {
            printed = echo_reveal(&view, printed)?;
        }
        if !view.state.is_busy() || view.notice.is_some() {
            return Ok(view);
        }
        views
            .changed()
            .await
            .map_err(|_| anyhow!("workflow driver stopped"))?;
    }
}

fn echo_reveal(view: &WorkflowView, printed: usize) -> Result<usize> {
    let shown = view.reveal.shown;
    if shown > printed {
        let mut stdout = std::io::stdout().lock();
        let fresh: String = view
            .reveal
            .visible
            .chars()
            .skip(printed)
            .collect();
        stdout.write_all(fresh.as_bytes())?;
        stdout.flush()?;
    }
    Ok(shown.max(printed))
}
