//! Workflow state.
//!
//! The phase is a tagged union: each variant owns exactly the results that
//! exist in that step, so a `PostAnalysis` state without generated text
//! cannot be built.

use serde::Serialize;
use std::fmt;

use crate::error::Guard;
use crate::types::{AgentInfo, AnalysisResult};

/// Workflow step, in sequence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Step {
    Input,
    PreAnalysis,
    Generating,
    PostAnalysis,
}

impl Step {
    pub const ALL: [Step; 4] = [
        Step::Input,
        Step::PreAnalysis,
        Step::Generating,
        Step::PostAnalysis,
    ];

    /// Label for progress indicators.
    pub fn label(self) -> &'static str {
        match self {
            Step::Input => "Input",
            Step::PreAnalysis => "Pre-Analysis",
            Step::Generating => "Generation",
            Step::PostAnalysis => "Post-Analysis",
        }
    }

    /// Progress status of `self` while the workflow is at `current`.
    pub fn status(self, current: Step) -> StepStatus {
        match self.cmp(&current) {
            std::cmp::Ordering::Less => StepStatus::Completed,
            std::cmp::Ordering::Equal => StepStatus::Current,
            std::cmp::Ordering::Greater => StepStatus::Pending,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Current,
    Pending,
}

/// What the workflow is waiting on while busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyLabel {
    AnalyzingPrompt,
    Generating,
    AnalyzingOutput,
}

impl BusyLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            BusyLabel::AnalyzingPrompt => "Analyzing prompt for security risks...",
            BusyLabel::Generating => "Generating AI content...",
            BusyLabel::AnalyzingOutput => "Analyzing generated content...",
        }
    }
}

impl fmt::Display for BusyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one request sequence; bumped by every transition that
/// starts or abandons service calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct SessionId(pub u64);

impl SessionId {
    pub fn next(self) -> Self {
        SessionId(self.0 + 1)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Step together with the data that exists in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Phase {
    Input,
    PreAnalysis {
        pre: Option<AnalysisResult>,
    },
    Generating {
        pre: AnalysisResult,
        generated: Option<String>,
        post: Option<AnalysisResult>,
        /// Reveal of `generated` has completed
        revealed: bool,
    },
    PostAnalysis {
        pre: AnalysisResult,
        generated: String,
        post: AnalysisResult,
    },
}

impl Phase {
    pub fn step(&self) -> Step {
        match self {
            Phase::Input => Step::Input,
            Phase::PreAnalysis { .. } => Step::PreAnalysis,
            Phase::Generating { .. } => Step::Generating,
            Phase::PostAnalysis { .. } => Step::PostAnalysis,
        }
    }
}

/// The single mutable state of a workflow instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowState {
    pub(crate) phase: Phase,
    pub(crate) agents: Vec<AgentInfo>,
    pub(crate) selected_agent: Option<String>,
    pub(crate) prompt: String,
    pub(crate) busy: Option<BusyLabel>,
    pub(crate) session: SessionId,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            phase: Phase::Input,
            agents: Vec::new(),
            selected_agent: None,
            prompt: String::new(),
            busy: None,
            session: SessionId::default(),
        }
    }
}

impl WorkflowState {
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn step(&self) -> Step {
        self.phase.step()
    }

    pub fn agents(&self) -> &[AgentInfo] {
        &self.agents
    }

    pub fn selected_agent(&self) -> Option<&str> {
        self.selected_agent.as_deref()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_some()
    }

    pub fn busy_label(&self) -> Option<BusyLabel> {
        self.busy
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn pre_result(&self) -> Option<&AnalysisResult> {
        match &self.phase {
            Phase::Input => None,
            Phase::PreAnalysis { pre } => pre.as_ref(),
            Phase::Generating { pre, .. } | Phase::PostAnalysis { pre, .. } => Some(pre),
        }
    }

    pub fn generated_text(&self) -> Option<&str> {
        match &self.phase {
            Phase::Generating { generated, .. } => generated.as_deref(),
            Phase::PostAnalysis { generated, .. } => Some(generated),
            _ => None,
        }
    }

    pub fn post_result(&self) -> Option<&AnalysisResult> {
        match &self.phase {
            Phase::Generating { post, .. } => post.as_ref(),
            Phase::PostAnalysis { post, .. } => Some(post),
            _ => None,
        }
    }

    /// Guard for `submit_prompt`. Also legal as a retry after a failed
    /// pre-analysis.
    pub fn check_submit(&self) -> Result<(), Guard> {
        match &self.phase {
            Phase::Input | Phase::PreAnalysis { pre: None } => {}
            other => {
                return Err(Guard::WrongStep {
                    command: "submit_prompt",
                    step: other.step(),
                })
            }
        }
        if self.is_busy() {
            return Err(Guard::Busy);
        }
        if self.prompt.trim().is_empty() {
            return Err(Guard::EmptyPrompt);
        }
        if self.selected_agent.is_none() {
            return Err(Guard::NoAgentSelected);
        }
        Ok(())
    }

    /// Guard for `proceed`. Also legal as a retry after a failed generation
    /// or post-analysis.
    pub fn check_proceed(&self) -> Result<(), Guard> {
        let pre = match &self.phase {
            Phase::PreAnalysis { pre: Some(pre) } | Phase::Generating { pre, .. } => pre,
            Phase::PreAnalysis { pre: None } => return Err(Guard::MissingAnalysis),
            other => {
                return Err(Guard::WrongStep {
                    command: "proceed",
                    step: other.step(),
                })
            }
        };
        if self.is_busy() {
            return Err(Guard::Busy);
        }
        if pre.is_critical() {
            return Err(Guard::CriticalRisk);
        }
        if self.selected_agent.is_none() {
            return Err(Guard::NoAgentSelected);
        }
        Ok(())
    }

    /// Guard for `edit`.
    pub fn check_edit(&self) -> Result<(), Guard> {
        match &self.phase {
            Phase::PreAnalysis { .. } => Ok(()),
            Phase::Generating { .. } if !self.is_busy() => Ok(()),
            Phase::Generating { .. } => Err(Guard::Busy),
            other => Err(Guard::WrongStep {
                command: "edit",
                step: other.step(),
            }),
        }
    }

    /// Guard for `reset`.
    pub fn check_reset(&self) -> Result<(), Guard> {
        match &self.phase {
            Phase::PostAnalysis { .. } => Ok(()),
            other => Err(Guard::WrongStep {
                command: "reset",
                step: other.step(),
            }),
        }
    }

    /// Guard for editing the prompt or the agent selection.
    pub fn check_input_editable(&self, command: &'static str) -> Result<(), Guard> {
        if self.step() != Step::Input {
            return Err(Guard::WrongStep {
                command,
                step: self.step(),
            });
        }
        if self.is_busy() {
            return Err(Guard::Busy);
        }
        Ok(())
    }

    pub fn can_submit(&self) -> bool {
        self.check_submit().is_ok()
    }

    pub fn can_proceed(&self) -> bool {
        self.check_proceed().is_ok()
    }

    pub fn can_edit(&self) -> bool {
        self.check_edit().is_ok()
    }

    pub fn can_reset(&self) -> bool {
        self.check_reset().is_ok()
    }

    /// Caption for the proceed control.
    pub fn proceed_label(&self) -> &'static str {
        match self.pre_result() {
            Some(pre) if pre.is_critical() => "Risk Level Too High",
            _ => "Proceed to Generation",
        }
    }

    /// Progress status of every step.
    pub fn progress(&self) -> [(Step, StepStatus); 4] {
        let current = self.step();
        Step::ALL.map(|step| (step, step.status(current)))
    }
}
