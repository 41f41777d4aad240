//! Line-driven workflow session.
//!
//! Lines starting with `:` are commands; any other line replaces the
//! prompt.

use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use sentinel_core::{render, AnalysisReport, Command, Inspector, Step, WorkflowState};
use sentinel_runtime::{AnalysisService, DriverError, RuntimeConfig, WorkflowDriver, WorkflowHandle};

use crate::{load_agents, output, until_idle};

const HELP: &str = "\
Commands:
  :agents          list agents
  :agent ID        select an agent
  :submit          analyze the prompt
  :proceed         generate and analyze the output
  :edit            back to editing the prompt
  :reset           start over
  :next / :prev    inspect the next/previous highlight
  :status          show progress
  :help            this text
  :quit            leave
Any other line sets the prompt.";

pub async fn session(service: Arc<dyn AnalysisService>, config: &RuntimeConfig) -> Result<()> {
    let handle = WorkflowDriver::spawn(service, config)?;
    let view = load_agents(&handle).await?;
    println!("{}", output::agents(view.state.agents(), view.state.selected_agent()));
    println!("{}", HELP.dimmed());

    let mut inspector = Inspector::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (word, arg) = match line.split_once(' ') {
            Some((word, arg)) => (word, arg.trim()),
            None => (line, ""),
        };

        match word {
            ":quit" | ":q" => break,
            ":help" => println!("{}", HELP),
            ":status" => status(&handle.view().state),
            ":agents" => {
                let state = handle.view().state;
                println!("{}", output::agents(state.agents(), state.selected_agent()));
            }
            ":agent" => {
                apply(&handle, Command::SelectAgent(arg.to_string())).await?;
            }
            ":submit" => {
                if apply(&handle, Command::SubmitPrompt).await? {
                    inspector.clear();
                    settle(&handle, false).await?;
                }
            }
            ":proceed" => {
                if apply(&handle, Command::Proceed).await? {
                    inspector.clear();
                    settle(&handle, true).await?;
                }
            }
            ":edit" | ":reset" => {
                let command = if word == ":edit" {
                    Command::Edit
                } else {
                    Command::Reset
                };
                if apply(&handle, command).await? {
                    inspector.clear();
                    status(&handle.view().state);
                }
            }
            ":next" | ":prev" => inspect(&handle.view().state, &mut inspector, word == ":next"),
            _ if word.starts_with(':') => println!("Unknown command {}; try :help", word),
            _ => {
                apply(&handle, Command::SetPrompt(line.to_string())).await?;
            }
        }
    }
    Ok(())
}

/// Send a command; guard rejections are printed, not fatal.
async fn apply(handle: &WorkflowHandle, command: Command) -> Result<bool> {
    match handle.send(command).await {
        Ok(()) => Ok(true),
        Err(DriverError::Workflow(err)) => {
            println!("{}", err.to_string().yellow());
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

async fn settle(handle: &WorkflowHandle, stream: bool) -> Result<()> {
    if let Some(label) = handle.view().state.busy_label() {
        println!("{}", label.to_string().dimmed());
    }
    let view = until_idle(handle, stream).await?;
    if stream {
        println!();
    }
    if let Some(notice) = &view.notice {
        println!("{} {}", "Error:".red().bold(), notice.message);
    }
    print_current_report(&view.state);
    status(&view.state);
    Ok(())
}

fn status(state: &WorkflowState) {
    println!("{}", output::progress(state));
    match state.step() {
        Step::Input => println!(
            "Agent: {}  Prompt: {}",
            state.selected_agent().unwrap_or("-"),
            state.prompt()
        ),
        Step::PreAnalysis if state.pre_result().is_some() => {
            println!("[{}] :proceed or :edit", state.proceed_label())
        }
        _ => {}
    }
}

/// The text and report a tooltip applies to in the current step.
fn current_report(state: &WorkflowState) -> Option<AnalysisReport<'_>> {
    match state.step() {
        Step::PostAnalysis => Some(AnalysisReport::build(
            state.post_result()?,
            state.generated_text(),
            true,
        )),
        Step::PreAnalysis => Some(AnalysisReport::build(
            state.pre_result()?,
            Some(state.prompt()),
            false,
        )),
        _ => None,
    }
}

fn print_current_report(state: &WorkflowState) {
    if let Some(report) = current_report(state) {
        println!("{}", output::report(&report, None));
    }
}

fn inspect(state: &WorkflowState, inspector: &mut Inspector, forward: bool) {
    let (text, result) = match state.step() {
        Step::PostAnalysis => (state.generated_text(), state.post_result()),
        Step::PreAnalysis => (Some(state.prompt()), state.pre_result()),
        _ => (None, None),
    };
    let (Some(text), Some(result)) = (text, result) else {
        println!("Nothing to inspect yet");
        return;
    };

    let segments = render(text, result.spans());
    let focused = if forward {
        inspector.focus_next(&segments)
    } else {
        inspector.focus_prev(&segments)
    };
    match inspector.tooltip(&segments) {
        Some(tooltip) => {
            println!("{}", output::segments(&segments, focused));
            println!("{}", output::tooltip(&tooltip));
        }
        None => println!("No highlights"),
    }
}
