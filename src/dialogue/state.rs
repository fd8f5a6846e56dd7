//! Session state types

use super::resolver::ResolvedNode;
use crate::flow::{ChatOption, Graph};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(1000);
const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(600);
const DEFAULT_VISIT_LABEL: &str = "Site visit";
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Single-flight state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionState {
    /// No flow has loaded yet; nothing can be rendered
    #[default]
    AwaitingFlow,
    /// Ready for input
    Idle,
    /// A free-text submission is waiting for the oracle
    Submitting { submission_id: u64 },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::AwaitingFlow => "awaiting_flow",
            SessionState::Idle => "idle",
            SessionState::Submitting { .. } => "submitting",
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, SessionState::Submitting { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Bot,
    User,
}

/// Transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub sender: Sender,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChatOption>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub typing: bool,
}

impl Message {
    pub fn bot(text: impl Into<String>, options: Vec<ChatOption>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Bot,
            options,
            typing: false,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            options: vec![],
            typing: false,
        }
    }

    /// Transient "bot is typing" placeholder
    pub fn typing() -> Self {
        Self {
            text: String::new(),
            sender: Sender::Bot,
            options: vec![],
            typing: true,
        }
    }
}

impl From<ResolvedNode<'_>> for Message {
    fn from(node: ResolvedNode<'_>) -> Self {
        Message::bot(node.text, node.options.to_vec())
    }
}

/// Append-only message log; only typing placeholders are ever removed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Returns the number of placeholders removed
    pub fn clear_typing(&mut self) -> usize {
        let before = self.messages.len();
        self.messages.retain(|m| !m.typing);
        before - self.messages.len()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

/// Tunables for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Pause before `start` is shown again after a `url` option
    pub restart_delay: Duration,
    /// Quiet period before a typed draft is submitted
    pub debounce_window: Duration,
    /// Label of the `visit` metric emitted when a session starts
    pub visit_label: String,
    /// A session with no client command for this long is torn down
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            restart_delay: DEFAULT_RESTART_DELAY,
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            visit_label: DEFAULT_VISIT_LABEL.to_string(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let number = |name: &str| std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok());
        Self {
            restart_delay: number("CHATFLOW_RESTART_DELAY_MS")
                .map_or(defaults.restart_delay, Duration::from_millis),
            debounce_window: number("CHATFLOW_DEBOUNCE_MS")
                .map_or(defaults.debounce_window, Duration::from_millis),
            visit_label: std::env::var("CHATFLOW_VISIT_LABEL").unwrap_or(defaults.visit_label),
            idle_timeout: number("CHATFLOW_IDLE_TIMEOUT_SECS")
                .map_or(defaults.idle_timeout, Duration::from_secs),
        }
    }
}

/// Read-only inputs of a transition
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    /// Installed flow; `None` until the first successful load
    pub graph: Option<Arc<Graph>>,
    pub config: SessionConfig,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            session_id: session_id.into(),
            graph: None,
            config,
        }
    }

    pub fn with_graph(mut self, graph: Arc<Graph>) -> Self {
        self.graph = Some(graph);
        self
    }
}
