//! The four-step safety workflow.
//!
//! ```text
//! Input ──submit──▶ PreAnalysis ──proceed──▶ Generating ──(post + reveal)──▶ PostAnalysis
//!   ▲                   │ edit                  │ edit                          │ reset
//!   └───────────────────┴───────────────────────┴───────────────────────────────┘
//! ```
//!
//! [`Workflow::apply`] is the only way to change state. It takes a user
//! [`Command`] or a service/timer [`Event`], replaces the state wholesale and
//! returns the [`Effect`]s the runtime must perform. Nothing here performs
//! I/O; the runtime feeds results back in as events tagged with the
//! [`SessionId`] they were requested under, and events from an abandoned
//! session are discarded.

mod state;

pub use state::{BusyLabel, Phase, SessionId, Step, StepStatus, WorkflowState};

use serde::Serialize;

use crate::error::{ErrorKind, Guard, WorkflowError};
use crate::types::{AgentInfo, AnalysisResult};

/// User intents.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Fetch the agent catalogue
    LoadAgents,
    SelectAgent(String),
    SetPrompt(String),
    SubmitPrompt,
    Proceed,
    Edit,
    Reset,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::LoadAgents => "load_agents",
            Command::SelectAgent(_) => "select_agent",
            Command::SetPrompt(_) => "set_prompt",
            Command::SubmitPrompt => "submit_prompt",
            Command::Proceed => "proceed",
            Command::Edit => "edit",
            Command::Reset => "reset",
        }
    }
}

/// Completions reported by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    AgentsLoaded(Result<Vec<AgentInfo>, WorkflowError>),
    PreAnalysisFinished {
        session: SessionId,
        result: Result<AnalysisResult, WorkflowError>,
    },
    GenerationFinished {
        session: SessionId,
        result: Result<String, WorkflowError>,
    },
    PostAnalysisFinished {
        session: SessionId,
        result: Result<AnalysisResult, WorkflowError>,
    },
    /// The reveal of the generated text completed and settled
    RevealCompleted { session: SessionId },
    /// Post-analysis has been waiting on the reveal for the grace period
    RevealGraceElapsed { session: SessionId },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::AgentsLoaded(_) => "agents_loaded",
            Event::PreAnalysisFinished { .. } => "pre_analysis_finished",
            Event::GenerationFinished { .. } => "generation_finished",
            Event::PostAnalysisFinished { .. } => "post_analysis_finished",
            Event::RevealCompleted { .. } => "reveal_completed",
            Event::RevealGraceElapsed { .. } => "reveal_grace_elapsed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command(Command),
    Event(Event),
}

impl From<Command> for Input {
    fn from(command: Command) -> Self {
        Input::Command(command)
    }
}

impl From<Event> for Input {
    fn from(event: Event) -> Self {
        Input::Event(event)
    }
}

/// Work the runtime performs on behalf of a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    RequestAgents,
    RequestPreAnalysis {
        session: SessionId,
        text: String,
    },
    RequestGeneration {
        session: SessionId,
        agent_id: String,
        prompt: String,
    },
    RequestPostAnalysis {
        session: SessionId,
        text: String,
    },
    StartReveal {
        session: SessionId,
        text: String,
    },
    /// Skip the running reveal to its end
    FinishReveal { session: SessionId },
    CancelReveal,
    /// Start the grace period after which the reveal is fast-forwarded
    ArmRevealGrace { session: SessionId },
    Notify(Notice),
}

/// A user-visible failure report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub kind: ErrorKind,
    pub step: Step,
    pub message: String,
}

impl Notice {
    fn from_error(step: Step, error: &WorkflowError) -> Self {
        Self {
            kind: error.kind(),
            step,
            message: error.to_string(),
        }
    }
}

/// Owner of a [`WorkflowState`].
#[derive(Debug, Clone, Default)]
pub struct Workflow {
    state: WorkflowState,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Apply a command or event.
    ///
    /// Guard failures return [`WorkflowError::GuardRejected`] and leave the
    /// state untouched. Stale events succeed with no effects.
    pub fn apply(&mut self, input: impl Into<Input>) -> Result<Vec<Effect>, WorkflowError> {
        let from = self.state.step();
        let (next, effects) = match input.into() {
            Input::Command(command) => on_command(&self.state, command)?,
            Input::Event(event) => on_event(&self.state, event),
        };
        if let Some(next) = next {
            if next.step() != from {
                tracing::info!(
                    from = %from,
                    to = %next.step(),
                    session = %next.session(),
                    "Workflow step changed"
                );
            }
            self.state = next;
        }
        Ok(effects)
    }
}

type Transition = (Option<WorkflowState>, Vec<Effect>);

fn unchanged() -> Transition {
    (None, Vec::new())
}

fn on_command(state: &WorkflowState, command: Command) -> Result<Transition, WorkflowError> {
    tracing::debug!(command = command.name(), step = %state.step(), "Applying command");
    let mut next = state.clone();
    let effects = match command {
        Command::LoadAgents => return Ok((None, vec![Effect::RequestAgents])),

        Command::SelectAgent(id) => {
            state.check_input_editable("select_agent")?;
            if !state.agents.iter().any(|a| a.id == id) {
                return Err(Guard::UnknownAgent(id).into());
            }
            next.selected_agent = Some(id);
            Vec::new()
        }

        Command::SetPrompt(prompt) => {
            state.check_input_editable("set_prompt")?;
            next.prompt = prompt;
            Vec::new()
        }

        Command::SubmitPrompt => {
            state.check_submit()?;
            next.session = state.session.next();
            next.phase = Phase::PreAnalysis { pre: None };
            next.busy = Some(BusyLabel::AnalyzingPrompt);
            vec![Effect::RequestPreAnalysis {
                session: next.session,
                text: state.prompt.clone(),
            }]
        }

        Command::Proceed => {
            state.check_proceed()?;
            let (pre, agent_id) = match (state.pre_result(), &state.selected_agent) {
                (Some(pre), Some(agent)) => (pre.clone(), agent.clone()),
                _ => return Err(Guard::MissingAnalysis.into()),
            };
            let retry = state.step() == Step::Generating;
            next.session = state.session.next();
            next.phase = Phase::Generating {
                pre,
                generated: None,
                post: None,
                revealed: false,
            };
            next.busy = Some(BusyLabel::Generating);

            let mut effects = Vec::with_capacity(2);
            if retry {
                effects.push(Effect::CancelReveal);
            }
            effects.push(Effect::RequestGeneration {
                session: next.session,
                agent_id,
                prompt: state.prompt.clone(),
            });
            effects
        }

        Command::Edit => {
            state.check_edit()?;
            next.session = state.session.next();
            next.phase = Phase::Input;
            next.busy = None;
            vec![Effect::CancelReveal]
        }

        Command::Reset => {
            state.check_reset()?;
            next.session = state.session.next();
            next.phase = Phase::Input;
            next.prompt.clear();
            next.busy = None;
            vec![Effect::CancelReveal]
        }
    };
    Ok((Some(next), effects))
}

fn on_event(state: &WorkflowState, event: Event) -> Transition {
    let name = event.name();
    match event {
        Event::AgentsLoaded(Ok(agents)) => {
            let mut next = state.clone();
            let keep = next
                .selected_agent
                .as_ref()
                .is_some_and(|id| agents.iter().any(|a| &a.id == id));
            if !keep {
                next.selected_agent = agents.first().map(|a| a.id.clone());
            }
            tracing::info!(
                count = agents.len(),
                selected = next.selected_agent.as_deref().unwrap_or("none"),
                "Agent catalogue loaded"
            );
            next.agents = agents;
            (Some(next), Vec::new())
        }

        Event::AgentsLoaded(Err(error)) => {
            tracing::warn!(error = %error, "Failed to load agents");
            (None, vec![Effect::Notify(Notice::from_error(state.step(), &error))])
        }

        Event::PreAnalysisFinished { session, result } => {
            if !is_current(state, session, name)
                || !matches!(state.phase, Phase::PreAnalysis { pre: None })
            {
                return unchanged();
            }
            let mut next = state.clone();
            next.busy = None;
            match result {
                Ok(pre) => {
                    tracing::info!(
                        risk = %pre.risk_tier(),
                        spans = pre.spans().len(),
                        "Pre-analysis complete"
                    );
                    next.phase = Phase::PreAnalysis { pre: Some(pre) };
                    (Some(next), Vec::new())
                }
                Err(error) => failed(next, &error, "Pre-analysis failed"),
            }
        }

        Event::GenerationFinished { session, result } => {
            let pre = match &state.phase {
                Phase::Generating {
                    pre,
                    generated: None,
                    ..
                } if is_current(state, session, name) => pre.clone(),
                _ => return unchanged(),
            };
            let mut next = state.clone();
            match result {
                Ok(text) => {
                    tracing::info!(chars = text.chars().count(), "Generation complete");
                    next.phase = Phase::Generating {
                        pre,
                        generated: Some(text.clone()),
                        post: None,
                        revealed: false,
                    };
                    next.busy = Some(BusyLabel::AnalyzingOutput);
                    let effects = vec![
                        Effect::StartReveal {
                            session,
                            text: text.clone(),
                        },
                        Effect::RequestPostAnalysis { session, text },
                    ];
                    (Some(next), effects)
                }
                Err(error) => {
                    next.busy = None;
                    failed(next, &error, "Generation failed")
                }
            }
        }

        Event::PostAnalysisFinished { session, result } => {
            let (pre, generated, revealed) = match &state.phase {
                Phase::Generating {
                    pre,
                    generated: Some(generated),
                    post: None,
                    revealed,
                } if is_current(state, session, name) => (pre.clone(), generated.clone(), *revealed),
                _ => return unchanged(),
            };
            let mut next = state.clone();
            match result {
                Ok(post) => {
                    tracing::info!(
                        risk = %post.risk_tier(),
                        spans = post.spans().len(),
                        "Post-analysis complete"
                    );
                    next.phase = Phase::Generating {
                        pre,
                        generated: Some(generated),
                        post: Some(post),
                        revealed,
                    };
                    let effects = if revealed {
                        Vec::new()
                    } else {
                        vec![Effect::ArmRevealGrace { session }]
                    };
                    (Some(complete_if_ready(next)), effects)
                }
                Err(error) => {
                    next.busy = None;
                    failed(next, &error, "Post-analysis failed")
                }
            }
        }

        Event::RevealCompleted { session } => {
            if !is_current(state, session, name) {
                return unchanged();
            }
            let mut next = state.clone();
            match &mut next.phase {
                Phase::Generating {
                    generated: Some(_),
                    revealed,
                    ..
                } if !*revealed => *revealed = true,
                _ => return unchanged(),
            }
            tracing::debug!(session = %session, "Reveal complete");
            (Some(complete_if_ready(next)), Vec::new())
        }

        Event::RevealGraceElapsed { session } => match &state.phase {
            Phase::Generating {
                post: Some(_),
                revealed: false,
                ..
            } if is_current(state, session, name) => {
                tracing::info!(session = %session, "Reveal grace period elapsed, fast-forwarding");
                (None, vec![Effect::FinishReveal { session }])
            }
            _ => unchanged(),
        },
    }
}

fn is_current(state: &WorkflowState, session: SessionId, event: &'static str) -> bool {
    if session == state.session {
        true
    } else {
        tracing::debug!(
            event,
            session = %session,
            current = %state.session,
            "Discarding stale event"
        );
        false
    }
}

fn failed(next: WorkflowState, error: &WorkflowError, message: &'static str) -> Transition {
    tracing::warn!(step = %next.step(), error = %error, "{}", message);
    let notice = Notice::from_error(next.step(), error);
    (Some(next), vec![Effect::Notify(notice)])
}

/// Move to `PostAnalysis` once both the post-analysis result and the reveal
/// are in.
fn complete_if_ready(state: WorkflowState) -> WorkflowState {
    match state.phase {
        Phase::Generating {
            pre,
            generated: Some(generated),
            post: Some(post),
            revealed: true,
        } => WorkflowState {
            phase: Phase::PostAnalysis {
                pre,
                generated,
                post,
            },
            busy: None,
            ..state
        },
        phase => WorkflowState { phase, ..state },
    }
}
