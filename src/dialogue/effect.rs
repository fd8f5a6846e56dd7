//! Effects produced by state transitions

use super::state::Message;
use crate::flow::Graph;
use crate::metrics::MetricKind;
use std::sync::Arc;
use std::time::Duration;

/// Effects to be executed after a state transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Replace the session's flow
    InstallGraph(Arc<Graph>),

    /// Append a message to the transcript
    AppendMessage(Message),

    /// Show the transient typing placeholder
    ShowTyping,

    /// Remove any typing placeholder
    ClearTyping,

    /// Tell the client to empty its text input
    ClearInput,

    /// Tell the client to open an external link
    OpenLink { url: String },

    /// Ask the fallback oracle about unresolved text
    ConsultOracle { submission_id: u64, text: String },

    /// Render `start` again after a delay
    ScheduleRestart { delay: Duration },

    /// Fire-and-forget analytics event
    RecordMetric { kind: MetricKind, label: String },

    /// Report a recoverable problem to connected clients
    ReportError { message: String },
}

impl Effect {
    pub fn bot_message(message: Message) -> Self {
        Effect::AppendMessage(message)
    }

    pub fn user_message(text: impl Into<String>) -> Self {
        Effect::AppendMessage(Message::user(text))
    }

    pub fn option_click(label: impl Into<String>) -> Self {
        Effect::RecordMetric {
            kind: MetricKind::OptionClick,
            label: label.into(),
        }
    }

    pub fn report(message: impl Into<String>) -> Self {
        Effect::ReportError {
            message: message.into(),
        }
    }
}
