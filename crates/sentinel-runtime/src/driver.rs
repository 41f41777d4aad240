//! Workflow driver.
//!
//! The driver is a single task that owns the [`Workflow`] and the
//! [`RevealController`]. Commands from handles, service completions and
//! reveal timer signals all arrive on channels and are applied one at a
//! time, so a transition never races another. Service calls run on spawned
//! tasks with a per-call timeout and report back as session-tagged events.
//!
//! After every applied input the driver publishes a [`WorkflowView`] on a
//! watch channel.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

use sentinel_core::{Command, Effect, Event, Input, Notice, Workflow, WorkflowError, WorkflowState};

use crate::config::{ConfigError, RuntimeConfig};
use crate::reveal::{RevealController, RevealSignal, RevealView};
use crate::services::{AnalysisService, ServiceError};

/// Errors returned to handle callers.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Workflow driver stopped")]
    Stopped,
}

/// Everything a front end renders, published after each transition.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowView {
    pub state: WorkflowState,
    pub reveal: RevealView,

    /// Most recent failure; cleared by the next accepted command
    pub notice: Option<Notice>,

    /// Increments with every publish
    pub revision: u64,
}

struct Request {
    command: Command,
    reply: oneshot::Sender<Result<(), WorkflowError>>,
}

pub struct WorkflowDriver {
    workflow: Workflow,
    service: Arc<dyn AnalysisService>,
    timeout: Duration,
    reveal: RevealController,
    requests: mpsc::Receiver<Request>,
    events_tx: mpsc::UnboundedSender<Event>,
    events: mpsc::UnboundedReceiver<Event>,
    signals: mpsc::UnboundedReceiver<RevealSignal>,
    view: watch::Sender<WorkflowView>,
    notice: Option<Notice>,
    revision: u64,
}

impl WorkflowDriver {
    /// Spawn a driver on the current runtime and return its handle.
    ///
    /// The config is validated first. The driver stops once every handle is
    /// dropped.
    pub fn spawn(
        service: Arc<dyn AnalysisService>,
        config: &RuntimeConfig,
    ) -> Result<WorkflowHandle, DriverError> {
        config.validate()?;
        let (requests_tx, requests) = mpsc::channel(32);
        let (events_tx, events) = mpsc::unbounded_channel();
        let (signals_tx, signals) = mpsc::unbounded_channel();

        let workflow = Workflow::new();
        let reveal = RevealController::new(config.reveal.clone(), signals_tx);
        let (view, view_rx) = watch::channel(WorkflowView {
            state: workflow.state().clone(),
            reveal: reveal.view(),
            notice: None,
            revision: 0,
        });

        let driver = WorkflowDriver {
            workflow,
            service,
            timeout: config.service.timeout,
            reveal,
            requests,
            events_tx,
            events,
            signals,
            view,
            notice: None,
            revision: 0,
        };
        tokio::spawn(driver.run());

        Ok(WorkflowHandle {
            requests: requests_tx,
            view: view_rx,
        })
    }

    async fn run(mut self) {
        tracing::info!(service = self.service.name(), "Workflow driver started");
        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(Request { command, reply }) => {
                        let result = self.apply(command.into());
                        let _ = reply.send(result);
                    }
                    None => break,
                },
                Some(event) = self.events.recv() => {
                    // Events are never rejected; stale ones are dropped inside
                    let _ = self.apply(event.into());
                }
                Some(signal) = self.signals.recv() => {
                    match self.reveal.handle(signal) {
                        Some(event) => {
                            let _ = self.apply(event.into());
                        }
                        None => self.publish(),
                    }
                }
            }
        }
        self.reveal.cancel();
        tracing::info!("Workflow driver stopped");
    }

    fn apply(&mut self, input: Input) -> Result<(), WorkflowError> {
        let is_command = matches!(input, Input::Command(_));
        match self.workflow.apply(input) {
            Ok(effects) => {
                if is_command {
                    self.notice = None;
                }
                for effect in effects {
                    self.perform(effect);
                }
                self.publish();
                Ok(())
            }
            Err(err) => {
                tracing::debug!(error = %err, "Command rejected");
                Err(err)
            }
        }
    }

    fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::RequestAgents => {
                let service = self.service.clone();
                self.spawn_call(
                    async move { service.list_agents().await },
                    Event::AgentsLoaded,
                );
            }
            Effect::RequestPreAnalysis { session, text } => {
                let service = self.service.clone();
                self.spawn_call(
                    async move { service.pre_analyze(&text).await },
                    move |result| Event::PreAnalysisFinished { session, result },
                );
            }
            Effect::RequestGeneration {
                session,
                agent_id,
                prompt,
            } => {
                let service = self.service.clone();
                self.spawn_call(
                    async move { service.generate(&agent_id, &prompt).await },
                    move |result| Event::GenerationFinished { session, result },
                );
            }
            Effect::RequestPostAnalysis { session, text } => {
                let service = self.service.clone();
                self.spawn_call(
                    async move { service.post_analyze(&text).await },
                    move |result| Event::PostAnalysisFinished { session, result },
                );
            }
            Effect::StartReveal { session, text } => self.reveal.start(session, text),
            Effect::FinishReveal { session } => self.reveal.finish(session),
            Effect::CancelReveal => self.reveal.cancel(),
            Effect::ArmRevealGrace { session } => self.reveal.arm_grace(session),
            Effect::Notify(notice) => {
                tracing::warn!(step = %notice.step, kind = ?notice.kind, "{}", notice.message);
                self.notice = Some(notice);
            }
        }
    }

    /// Run a service call with the configured timeout and post its outcome
    /// as an event.
    fn spawn_call<T, F, M>(&self, call: F, into_event: M)
    where
        T: Send + 'static,
        F: Future<Output = Result<T, ServiceError>> + Send + 'static,
        M: FnOnce(Result<T, WorkflowError>) -> Event + Send + 'static,
    {
        let events = self.events_tx.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result.map_err(WorkflowError::from),
                Err(_) => Err(ServiceError::Timeout(timeout).into()),
            };
            let _ = events.send(into_event(result));
        });
    }

    fn publish(&mut self) {
        self.revision += 1;
        self.view.send_replace(WorkflowView {
            state: self.workflow.state().clone(),
            reveal: self.reveal.view(),
            notice: self.notice.clone(),
            revision: self.revision,
        });
    }
}

/// Cloneable handle to a running driver.
#[derive(Clone)]
pub struct WorkflowHandle {
    requests: mpsc::Sender<Request>,
    view: watch::Receiver<WorkflowView>,
}

impl WorkflowHandle {
    /// Apply a command, waiting until the driver has processed it.
    pub async fn send(&self, command: Command) -> Result<(), DriverError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request { command, reply })
            .await
            .map_err(|_| DriverError::Stopped)?;
        response.await.map_err(|_| DriverError::Stopped)??;
        Ok(())
    }

    /// Latest published view.
    pub fn view(&self) -> WorkflowView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowView> {
        self.view.clone()
    }

    /// Wait until a published view satisfies `predicate`.
    pub async fn wait_until(
        &self,
        mut predicate: impl FnMut(&WorkflowView) -> bool,
    ) -> Result<WorkflowView, DriverError> {
        let mut view = self.view.clone();
        let found = view
            .wait_for(|v| predicate(v))
            .await
            .map_err(|_| DriverError::Stopped)?;
        Ok(found.clone())
    }
}

impl std::fmt::Debug for WorkflowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowHandle")
            .field("revision", &self.view.borrow().revision)
            .finish()
    }
}
