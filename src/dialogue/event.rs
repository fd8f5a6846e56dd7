//! Events that can occur in a session

use crate::flow::{ChatOption, Graph};
use std::sync::Arc;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Flow store events
    FlowLoaded {
        graph: Arc<Graph>,
    },
    FlowLoadFailed {
        message: String,
    },

    // User events
    OptionClicked {
        option: ChatOption,
    },
    TextSubmitted {
        submission_id: u64,
        text: String,
    },

    // Oracle events
    OracleReplied {
        submission_id: u64,
        step_id: Option<String>,
    },
    OracleFailed {
        submission_id: u64,
        message: String,
    },

    // Timer events
    RestartTimeout,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::FlowLoaded { .. } => "flow_loaded",
            Event::FlowLoadFailed { .. } => "flow_load_failed",
            Event::OptionClicked { .. } => "option_clicked",
            Event::TextSubmitted { .. } => "text_submitted",
            Event::OracleReplied { .. } => "oracle_replied",
            Event::OracleFailed { .. } => "oracle_failed",
            Event::RestartTimeout => "restart_timeout",
        }
    }
}
