//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same
//! result. All I/O is expressed as `Effect`s for the runtime to execute.

use super::classifier::{classify, Outcome};
use super::resolver::resolve;
use super::state::Message;
use super::{Effect, Event, SessionContext, SessionState};
use crate::flow::{ChatOption, ExternalAction, Graph, OptionKind, DEFAULT_STEP, START_STEP};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("The conversation flow has not loaded yet")]
    FlowNotLoaded,
    #[error("Message is empty")]
    EmptyMessage,
    #[error("A message is already being processed, please wait")]
    SubmissionInFlight,
    #[error("Oracle reply for submission {0} is no longer expected")]
    StaleOracleReply(u64),
}

/// Pure transition function
pub fn transition(
    state: &SessionState,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Flow loading
        // ============================================================

        // First successful load renders the entry point
        (SessionState::AwaitingFlow, Event::FlowLoaded { graph }) => {
            let greeting = render(&graph, START_STEP);
            Ok(TransitionResult::new(SessionState::Idle)
                .with_effect(Effect::InstallGraph(graph))
                .with_effects(greeting))
        }

        // Later loads replace the flow without touching the transcript
        (_, Event::FlowLoaded { graph }) => {
            Ok(TransitionResult::new(*state).with_effect(Effect::InstallGraph(graph)))
        }

        (_, Event::FlowLoadFailed { message }) => {
            let message = format!("Failed to load the conversation flow: {message}");
            Ok(TransitionResult::new(*state).with_effect(Effect::report(message)))
        }

        (
            SessionState::AwaitingFlow,
            Event::OptionClicked { .. } | Event::TextSubmitted { .. } | Event::RestartTimeout,
        ) => Err(TransitionError::FlowNotLoaded),

        // ============================================================
        // Option clicks (never blocked by an outstanding submission)
        // ============================================================
        (_, Event::OptionClicked { option }) => {
            let graph = loaded_graph(context)?;
            Ok(handle_click(*state, graph, option, context))
        }

        // ============================================================
        // Free-text submission (single-flight)
        // ============================================================
        (SessionState::Submitting { .. }, Event::TextSubmitted { .. }) => {
            Err(TransitionError::SubmissionInFlight)
        }

        (SessionState::Idle, Event::TextSubmitted { submission_id, text }) => {
            if text.trim().is_empty() {
                return Err(TransitionError::EmptyMessage);
            }
            let graph = loaded_graph(context)?;
            Ok(handle_submission(graph, submission_id, text))
        }

        // ============================================================
        // Oracle fallback
        // ============================================================
        (
            SessionState::Submitting { submission_id: current },
            Event::OracleReplied { submission_id, step_id },
        ) if *current == submission_id => {
            let graph = loaded_graph(context)?;
            let target = step_id
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty() && graph.contains(key))
                .unwrap_or(DEFAULT_STEP);
            Ok(TransitionResult::new(SessionState::Idle)
                .with_effect(Effect::ClearTyping)
                .with_effects(render(graph, target)))
        }

        (
            SessionState::Submitting { submission_id: current },
            Event::OracleFailed { submission_id, .. },
        ) if *current == submission_id => {
            let graph = loaded_graph(context)?;
            Ok(TransitionResult::new(SessionState::Idle)
                .with_effect(Effect::ClearTyping)
                .with_effects(render(graph, DEFAULT_STEP)))
        }

        (
            _,
            Event::OracleReplied { submission_id, .. } | Event::OracleFailed { submission_id, .. },
        ) => Err(TransitionError::StaleOracleReply(submission_id)),

        // ============================================================
        // Timers
        // ============================================================
        (_, Event::RestartTimeout) => {
            let graph = loaded_graph(context)?;
            Ok(TransitionResult::new(*state).with_effects(render(graph, START_STEP)))
        }
    }
}

fn loaded_graph(context: &SessionContext) -> Result<&Graph, TransitionError> {
    context.graph.as_deref().ok_or(TransitionError::FlowNotLoaded)
}

/// Effects that render `key` as a bot message, or report a malformed flow
fn render(graph: &Graph, key: &str) -> Vec<Effect> {
    match resolve(graph, key) {
        Ok(node) => vec![Effect::bot_message(node.into())],
        Err(e) => vec![Effect::report(e.to_string())],
    }
}

fn handle_click(
    state: SessionState,
    graph: &Graph,
    option: ChatOption,
    context: &SessionContext,
) -> TransitionResult {
    let result = TransitionResult::new(state)
        .with_effect(Effect::option_click(option.label.clone()))
        .with_effect(Effect::user_message(option.label));

    match option.kind {
        OptionKind::Transition { next_step } => result.with_effects(render(graph, &next_step)),
        OptionKind::External(ExternalAction::Url(url)) => result
            .with_effect(Effect::OpenLink { url })
            .with_effect(Effect::ScheduleRestart {
                delay: context.config.restart_delay,
            }),
        OptionKind::External(action @ ExternalAction::Whatsapp(_)) => {
            result.with_effect(Effect::OpenLink { url: action.link() })
        }
    }
}

fn handle_submission(graph: &Graph, submission_id: u64, text: String) -> TransitionResult {
    let outcome = classify(graph, &text);
    let echo = [
        Effect::user_message(text.clone()),
        Effect::ClearInput,
        Effect::ShowTyping,
    ];

    let matched = match outcome {
        Outcome::DirectKeyMatch(key) => {
            return TransitionResult::new(SessionState::Idle)
                .with_effects(echo)
                .with_effect(Effect::ClearTyping)
                .with_effects(render(graph, key));
        }
        Outcome::ExactLabelMatch(option) | Outcome::PartialLabelMatch(option) => option,
        Outcome::Unresolved => {
            return TransitionResult::new(SessionState::Submitting { submission_id })
                .with_effects(echo)
                .with_effect(Effect::ConsultOracle {
                    submission_id,
                    text: text.trim().to_string(),
                });
        }
    };

    let result = TransitionResult::new(SessionState::Idle)
        .with_effects(echo)
        .with_effect(Effect::ClearTyping);

    match &matched.kind {
        OptionKind::Transition { next_step } => result.with_effects(render(graph, next_step)),
        OptionKind::External(action) => result
            .with_effect(Effect::bot_message(Message::bot(
                format!("Opening \"{}\" for you.", matched.label),
                vec![],
            )))
            .with_effect(Effect::OpenLink { url: action.link() }),
    }
}
