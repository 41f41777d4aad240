//! Progressive reveal bookkeeping.
//!
//! A reveal session goes `Idle → Revealing → Complete`. Every `start` or
//! `cancel` bumps a monotonically increasing token; timer callbacks carry
//! the token they were scheduled with and are ignored when it no longer
//! matches, so a tick that was already queued when the session changed does
//! nothing. Timers themselves live in the runtime; this type only decides
//! what a tick means.

use serde::Serialize;

/// Identifies one reveal session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RevealToken(u64);

impl RevealToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealState {
    #[default]
    Idle,
    Revealing,
    Complete,
}

/// Outcome of feeding a tick to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Token from a cancelled or finished session
    Stale,
    /// Characters now visible
    Progress(usize),
    /// Full text visible; the session is now complete
    Finished,
}

/// Reveal state for a single view.
#[derive(Debug, Clone, Default)]
pub struct RevealTracker {
    token: u64,
    text: String,
    boundaries: Vec<usize>,
    shown: usize,
    state: RevealState,
    notified: bool,
}

impl RevealTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin revealing `text`, abandoning any previous session.
    ///
    /// Empty text completes immediately.
    pub fn start(&mut self, text: impl Into<String>) -> RevealToken {
        self.reset();
        self.text = text.into();
        self.boundaries = self
            .text
            .char_indices()
            .map(|(i, _)| i)
            .skip(1)
            .chain(std::iter::once(self.text.len()))
            .collect();
        self.state = if self.text.is_empty() {
            RevealState::Complete
        } else {
            RevealState::Revealing
        };
        RevealToken(self.token)
    }

    /// Abandon the current session and return to `Idle`.
    pub fn cancel(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.token += 1;
        self.text.clear();
        self.boundaries.clear();
        self.shown = 0;
        self.state = RevealState::Idle;
        self.notified = false;
    }

    /// Reveal one more character.
    pub fn advance(&mut self, token: RevealToken) -> Advance {
        if !self.is_current(token) || self.state != RevealState::Revealing {
            return Advance::Stale;
        }
        self.shown += 1;
        if self.shown >= self.total() {
            self.shown = self.total();
            self.state = RevealState::Complete;
            Advance::Finished
        } else {
            Advance::Progress(self.shown)
        }
    }

    /// Skip to the end of the current session.
    pub fn finish(&mut self, token: RevealToken) -> Advance {
        if !self.is_current(token) || self.state != RevealState::Revealing {
            return Advance::Stale;
        }
        self.shown = self.total();
        self.state = RevealState::Complete;
        Advance::Finished
    }

    /// Claim the completion notification. True exactly once per session.
    pub fn take_completion(&mut self, token: RevealToken) -> bool {
        if self.is_current(token) && self.state == RevealState::Complete && !self.notified {
            self.notified = true;
            true
        } else {
            false
        }
    }

    pub fn is_current(&self, token: RevealToken) -> bool {
        token.0 == self.token
    }

    pub fn token(&self) -> RevealToken {
        RevealToken(self.token)
    }

    pub fn state(&self) -> RevealState {
        self.state
    }

    pub fn shown(&self) -> usize {
        self.shown
    }

    /// Length of the session text in characters.
    pub fn total(&self) -> usize {
        self.boundaries.len()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The part of the text revealed so far.
    pub fn visible(&self) -> &str {
        match self.shown {
            0 => "",
            n => &self.text[..self.boundaries[n - 1]],
        }
    }

    /// The typing cursor shows while characters are still arriving.
    pub fn cursor_visible(&self) -> bool {
        self.state == RevealState::Revealing
    }
}
