//! Typed-input coalescing
//!
//! Each keystroke re-arms a single deadline; when it passes without further
//! input the latest draft is submitted once. A draft the session accepted is
//! not fired again until the input changes; a rejected draft may fire again.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct Draft {
    text: String,
    deadline: Instant,
}

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: Option<Draft>,
    last_fired: Option<String>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            last_fired: None,
        }
    }

    /// Record the latest draft, restarting the quiet period.
    /// A blank draft disarms the timer.
    pub fn push(&mut self, text: String, now: Instant) {
        if self.last_fired.as_deref() != Some(text.trim()) {
            self.last_fired = None;
        }
        if text.trim().is_empty() {
            self.pending = None;
            return;
        }
        self.pending = Some(Draft {
            text,
            deadline: now + self.window,
        });
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|d| d.deadline)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Take the pending draft after its deadline passed
    pub fn fire(&mut self) -> Option<String> {
        let draft = self.pending.take()?;
        self.distinct(draft.text)
    }

    /// Fire `text` without waiting for the quiet period
    pub fn fire_now(&mut self, text: String) -> Option<String> {
        self.pending = None;
        self.distinct(text)
    }

    /// The session accepted a fired draft
    pub fn fired(&mut self, text: &str) {
        self.last_fired = Some(text.trim().to_string());
    }

    /// The input box was emptied; any draft may fire again
    pub fn input_cleared(&mut self) {
        self.last_fired = None;
    }

    fn distinct(&self, text: String) -> Option<String> {
        (self.last_fired.as_deref() != Some(text.trim())).then_some(text)
    }
}
