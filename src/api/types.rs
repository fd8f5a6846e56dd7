//! API request and response types

use crate::flow::{ChatOption, FlowIssue, Graph};
use crate::metrics::InterestCount;
use serde::{Deserialize, Serialize};

/// Request to click an option
#[derive(Debug, Deserialize)]
pub struct ClickRequest {
    pub option: ChatOption,
}

/// Request carrying input box text (send or keystroke)
#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

/// Response for session creation
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// Response for session commands
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queued: bool,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Request to add a step to the flow
#[derive(Debug, Deserialize)]
pub struct AddStepRequest {
    pub id: String,
}

/// Request to add an option to a step
#[derive(Debug, Deserialize)]
pub struct AddOptionRequest {
    pub option: ChatOption,
}

/// Flow after an edit, with any problems it still has
#[derive(Debug, Serialize)]
pub struct FlowResponse {
    pub flow: Graph,
    pub issues: Vec<FlowIssue>,
}

/// Response for step creation
#[derive(Debug, Serialize)]
pub struct AddStepResponse {
    pub id: String,
    pub issues: Vec<FlowIssue>,
}

#[derive(Debug, Serialize)]
pub struct IssuesResponse {
    pub issues: Vec<FlowIssue>,
}

/// Admin dashboard summary
#[derive(Debug, Serialize)]
pub struct MetricsSummary {
    pub total: usize,
    pub top_interests: Vec<InterestCount>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
