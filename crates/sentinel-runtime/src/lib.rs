//! # sentinel-runtime
//!
//! Async runtime for the Sentinel safety workflow.
//!
//! `sentinel-core` decides what happens; this crate makes it happen:
//! - Calls the shield and agent services (mock or HTTP) with timeouts
//! - Runs the reveal timers
//! - Drives a [`Workflow`](sentinel_core::Workflow) from a single task and
//!   publishes snapshots for front ends
//!
//! ## Example
//!
//! ```rust,ignore
//! use sentinel_core::Command;
//! use sentinel_runtime::{RuntimeConfig, ServiceRegistry, WorkflowDriver};
//!
//! let config = RuntimeConfig::load(None, |key| std::env::var(key).ok())?;
//! let service = ServiceRegistry::with_defaults()
//!     .create(&config.service.provider, &config.service.options)?;
//! let handle = WorkflowDriver::spawn(service, &config)?;
//!
//! handle.send(Command::LoadAgents).await?;
//! handle.wait_until(|v| !v.state.agents().is_empty()).await?;
//! handle.send(Command::SetPrompt("Summarize this article".into())).await?;
//! handle.send(Command::SubmitPrompt).await?;
//! ```

pub mod config;
pub mod driver;
pub mod reveal;
pub mod services;

pub use config::{ConfigError, RevealConfig, RuntimeConfig, ServiceConfig};
pub use driver::{DriverError, WorkflowDriver, WorkflowHandle, WorkflowView};
pub use reveal::{RevealController, RevealSignal, RevealView};
pub use services::{
    AnalysisMode, AnalysisService, MockService, MockServiceFactory, ServiceError, ServiceFactory,
    ServiceRegistry,
};

#[cfg(feature = "http")]
pub use services::{HttpService, HttpServiceFactory};
