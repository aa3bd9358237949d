//! Recompute throttling.
//!
//! Settings changes are applied on the next poll; text edits wait until the
//! input has been quiet for the debounce window. The scheduler only decides
//! *when*; the owner re-reads its current state when a recompute fires.

use std::time::{Duration, Instant};

pub const TEXT_DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Free-text edit of the transcript
    Text,
    /// Character name, toggles, line length
    Settings,
}

#[derive(Debug, Clone)]
pub struct RecomputeScheduler {
    text_delay: Duration,
    text_due: Option<Instant>,
    settings_pending: bool,
}

impl Default for RecomputeScheduler {
    fn default() -> Self {
        Self::new(TEXT_DEBOUNCE)
    }
}

impl RecomputeScheduler {
    pub fn new(text_delay: Duration) -> Self {
        Self {
            text_delay,
            text_due: None,
            settings_pending: false,
        }
    }

    /// Record a change at `now`. Each text edit restarts the window.
    pub fn notify(&mut self, change: Change, now: Instant) {
        match change {
            Change::Text => self.text_due = Some(now + self.text_delay),
            Change::Settings => self.settings_pending = true,
        }
    }

    /// When the next recompute becomes due, if any.
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        if self.settings_pending {
            return Some(now);
        }
        self.text_due
    }

    /// True if a recompute should run now. A settings recompute reads the
    /// current text too, so it also settles a pending text change.
    pub fn poll(&mut self, now: Instant) -> bool {
        let due = self.settings_pending || self.text_due.is_some_and(|t| t <= now);
        if due {
            self.settings_pending = false;
            self.text_due = None;
        }
        due
    }
}
