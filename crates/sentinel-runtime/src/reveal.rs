//! Timers behind the progressive reveal.
//!
//! [`RevealController`] owns a [`RevealTracker`] and the tasks that drive
//! it. Timer tasks never touch the tracker; they post [`RevealSignal`]s
//! carrying the token they were started with, and the driver feeds the
//! signals back through [`RevealController::handle`]. A signal from a
//! cancelled or restarted session is therefore a no-op.

use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use sentinel_core::{Advance, Event, RevealState, RevealToken, RevealTracker, SessionId};

use crate::config::RevealConfig;

/// Shortest delay between revealed characters.
pub const MIN_REVEAL_SPEED: Duration = Duration::from_millis(1);

/// Timer output, routed through the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealSignal {
    /// Time to show one more character
    Tick(RevealToken),
    /// The settle delay after the last character elapsed
    Settled(RevealToken),
    /// Post-analysis waited on the reveal for the grace period
    GraceElapsed(SessionId),
}

/// Snapshot of the reveal for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RevealView {
    pub state: RevealState,
    pub visible: String,
    pub shown: usize,
    pub total: usize,
    pub cursor_visible: bool,
}

pub struct RevealController {
    config: RevealConfig,
    tracker: RevealTracker,
    session: Option<SessionId>,
    signals: mpsc::UnboundedSender<RevealSignal>,
    ticker: Option<JoinHandle<()>>,
    settle: Option<JoinHandle<()>>,
    grace: Option<JoinHandle<()>>,
}

impl RevealController {
    pub fn new(config: RevealConfig, signals: mpsc::UnboundedSender<RevealSignal>) -> Self {
        Self {
            config,
            tracker: RevealTracker::new(),
            session: None,
            signals,
            ticker: None,
            settle: None,
            grace: None,
        }
    }

    /// Start revealing `text` for `session`, abandoning any running reveal.
    pub fn start(&mut self, session: SessionId, text: impl Into<String>) {
        self.stop_timers();
        let token = self.tracker.start(text);
        self.session = Some(session);
        tracing::debug!(
            session = %session,
            token = token.value(),
            chars = self.tracker.total(),
            "Reveal started"
        );

        if self.tracker.state() == RevealState::Complete {
            self.schedule_settle(token);
            return;
        }

        let speed = self.config.speed.max(MIN_REVEAL_SPEED);
        let signals = self.signals.clone();
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + speed, speed);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if signals.send(RevealSignal::Tick(token)).is_err() {
                    break;
                }
            }
        }));
    }

    /// Abandon the running reveal and return to idle.
    pub fn cancel(&mut self) {
        self.stop_timers();
        self.tracker.cancel();
        self.session = None;
    }

    /// Skip the reveal of `session` to its end.
    pub fn finish(&mut self, session: SessionId) {
        if self.session != Some(session) {
            return;
        }
        let token = self.tracker.token();
        if self.tracker.finish(token) == Advance::Finished {
            tracing::debug!(session = %session, "Reveal fast-forwarded");
            self.on_finished(token);
        }
    }

    /// Start the grace timer for `session`.
    pub fn arm_grace(&mut self, session: SessionId) {
        abort(&mut self.grace);
        let grace = self.config.grace;
        let signals = self.signals.clone();
        self.grace = Some(tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = signals.send(RevealSignal::GraceElapsed(session));
        }));
    }

    /// Apply a timer signal. Returns the workflow event it produces, if any.
    pub fn handle(&mut self, signal: RevealSignal) -> Option<Event> {
        match signal {
            RevealSignal::Tick(token) => {
                if self.tracker.advance(token) == Advance::Finished {
                    self.on_finished(token);
                }
                None
            }
            RevealSignal::Settled(token) => {
                if self.tracker.take_completion(token) {
                    self.session
                        .map(|session| Event::RevealCompleted { session })
                } else {
                    None
                }
            }
            RevealSignal::GraceElapsed(session) => Some(Event::RevealGraceElapsed { session }),
        }
    }

    pub fn view(&self) -> RevealView {
        RevealView {
            state: self.tracker.state(),
            visible: self.tracker.visible().to_string(),
            shown: self.tracker.shown(),
            total: self.tracker.total(),
            cursor_visible: self.tracker.cursor_visible(),
        }
    }

    fn on_finished(&mut self, token: RevealToken) {
        abort(&mut self.ticker);
        self.schedule_settle(token);
    }

    fn schedule_settle(&mut self, token: RevealToken) {
        abort(&mut self.settle);
        let delay = self.config.settle_delay;
        let signals = self.signals.clone();
        self.settle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = signals.send(RevealSignal::Settled(token));
        }));
    }

    fn stop_timers(&mut self) {
        abort(&mut self.ticker);
        abort(&mut self.settle);
        abort(&mut self.grace);
    }
}

impl Drop for RevealController {
    fn drop(&mut self) {
        self.stop_timers();
    }
}

fn abort(task: &mut Option<JoinHandle<()>>) {
    if let Some(task) = task.take() {
        task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> (RevealController, mpsc::UnboundedReceiver<RevealSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = RevealConfig {
            speed: Duration::from_millis(20),
            settle_delay: Duration::from_millis(500),
            grace: Duration::from_secs(15),
        };
        (RevealController::new(config, tx), rx)
    }

    /// Feed signals until one produces an event, or give up after a minute.
    async fn next_event(
        ctrl: &mut RevealController,
        rx: &mut mpsc::UnboundedReceiver<RevealSignal>,
    ) -> Option<Event> {
        let wait = async {
            while let Some(signal) = rx.recv().await {
                if let Some(event) = ctrl.handle(signal) {
                    return Some(event);
                }
            }
            None
        };
        tokio::time::timeout(Duration::from_secs(60), wait)
            .await
            .ok()
            .flatten()
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveal_completes_after_settle() {
        let (mut ctrl, mut rx) = controller();
        let started = Instant::now();
        ctrl.start(SessionId(1), "abc");
        assert!(ctrl.view().cursor_visible);

        let event = next_event(&mut ctrl, &mut rx).await;
        assert_eq!(event, Some(Event::RevealCompleted { session: SessionId(1) }));
        assert!(started.elapsed() >= Duration::from_millis(60 + 500));

        let view = ctrl.view();
        assert_eq!(view.visible, "abc");
        assert_eq!(view.state, RevealState::Complete);
        assert!(!view.cursor_visible);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_abandons_previous_session() {
        let (mut ctrl, mut rx) = controller();
        ctrl.start(SessionId(1), "first reveal");
        tokio::time::sleep(Duration::from_millis(50)).await;
        ctrl.start(SessionId(2), "second");

        let event = next_event(&mut ctrl, &mut rx).await;
        assert_eq!(event, Some(Event::RevealCompleted { session: SessionId(2) }));
        assert_eq!(ctrl.view().visible, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_never_completes() {
        let (mut ctrl, mut rx) = controller();
        ctrl.start(SessionId(1), "abc");
        tokio::time::sleep(Duration::from_millis(30)).await;
        ctrl.cancel();

        assert_eq!(next_event(&mut ctrl, &mut rx).await, None);
        assert_eq!(ctrl.view(), RevealView::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_fast_forwards() {
        let (mut ctrl, mut rx) = controller();
        ctrl.start(SessionId(3), "a fairly long generated paragraph");
        ctrl.finish(SessionId(3));
        assert_eq!(ctrl.view().visible, "a fairly long generated paragraph");

        let event = next_event(&mut ctrl, &mut rx).await;
        assert_eq!(event, Some(Event::RevealCompleted { session: SessionId(3) }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_ignores_other_session() {
        let (mut ctrl, _rx) = controller();
        ctrl.start(SessionId(3), "abc");
        ctrl.finish(SessionId(2));
        assert_eq!(ctrl.view().state, RevealState::Revealing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_signal() {
        let (mut ctrl, mut rx) = controller();
        let started = Instant::now();
        ctrl.arm_grace(SessionId(4));

        let event = next_event(&mut ctrl, &mut rx).await;
        assert_eq!(event, Some(Event::RevealGraceElapsed { session: SessionId(4) }));
        assert!(started.elapsed() >= Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_speed_still_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = RevealConfig {
            speed: Duration::ZERO,
            ..RevealConfig::default()
        };
        let mut ctrl = RevealController::new(config, tx);
        ctrl.start(SessionId(6), "abc");

        let event = next_event(&mut ctrl, &mut rx).await;
        assert_eq!(event, Some(Event::RevealCompleted { session: SessionId(6) }));
        assert_eq!(ctrl.view().visible, "abc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_text_completes_without_ticks() {
        let (mut ctrl, mut rx) = controller();
        ctrl.start(SessionId(5), "");
        let event = next_event(&mut ctrl, &mut rx).await;
        assert_eq!(event, Some(Event::RevealCompleted { session: SessionId(5) }));
    }
}
