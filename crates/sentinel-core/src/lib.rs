//! # sentinel-core
//!
//! Deterministic annotation and safety workflow engine.
//!
//! This crate holds everything about the prompt safety workflow that does not
//! touch the network or a clock:
//! - Splitting analyzed text into highlighted and plain segments
//! - Formatting severities into labels, color tiers and gauge fills
//! - Tracking a progressive reveal of generated text
//! - The four-step workflow state machine and its guards
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same state and input always produce the same transition
//! 2. **No I/O**: Service calls and timers are requested as effects
//! 3. **Lossless rendering**: Segments always concatenate back to the source text
//! 4. **Stale-safe**: Completions of abandoned requests never change state
//!
//! ## Example
//!
//! ```rust,ignore
//! use sentinel_core::{Command, Effect, Workflow};
//!
//! let mut workflow = Workflow::new();
//! workflow.apply(Command::SetPrompt("contact me at a@b.com".into()))?;
//! for effect in workflow.apply(Command::SubmitPrompt)? {
//!     match effect {
//!         Effect::RequestPreAnalysis { session, text } => { /* call the shield */ }
//!         _ => {}
//!     }
//! }
//! ```

pub mod error;
pub mod inspect;
pub mod render;
pub mod report;
pub mod reveal;
pub mod severity;
pub mod types;
pub mod workflow;

// Re-export main types at crate root
pub use error::{ErrorKind, Guard, WorkflowError};
pub use inspect::{Inspector, Interaction, Tooltip};
pub use render::{render, render_with, CursorClip, OverlapPolicy, Placement, RenderSegment};
pub use report::{AnalysisReport, BiasRow};
pub use reveal::{Advance, RevealState, RevealToken, RevealTracker};
pub use severity::{format, format_ratio, format_score, FormatMode, Severity, Tier};
pub use types::{
    AgentInfo, AnalysisResult, AnalysisStage, BiasMetric, BiasMetrics, FlaggedSpan, RiskTier,
    SpanCategory,
};
pub use workflow::{
    BusyLabel, Command, Effect, Event, Input, Notice, Phase, SessionId, Step, StepStatus,
    Workflow, WorkflowState,
};
