//! Admin editing operations on a flow
//!
//! The editor works on an owned `Graph`; persisting the result is the
//! caller's job (see `FlowStore::save`).

use super::types::{ChatOption, Graph, Node, OptionKind, DEFAULT_STEP, START_STEP};
use serde::Serialize;
use thiserror::Error;

/// Errors from editing operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("Step id cannot be empty")]
    EmptyId,
    #[error("Step id \"{0}\" already exists")]
    DuplicateId(String),
    #[error("Unknown step \"{0}\"")]
    UnknownStep(String),
    #[error("Step \"{0}\" cannot be removed")]
    ProtectedStep(String),
    #[error("Step \"{step}\" has no option at position {index}")]
    UnknownOption { step: String, index: usize },
}

/// Problems found by `validate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowIssue {
    MissingStart,
    MissingDefault,
    DanglingNextStep {
        step: String,
        label: String,
        target: String,
    },
    EmptyLabel {
        step: String,
        index: usize,
    },
}

impl FlowIssue {
    /// Blocking issues make a flow unusable and must not be saved
    pub fn is_blocking(&self) -> bool {
        matches!(self, FlowIssue::MissingStart)
    }
}

/// Turn a free-form name into a step id: trimmed, lower-case, whitespace runs as `_`
pub fn normalize_step_id(raw: &str) -> Result<String, EditError> {
    let id = raw
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_");
    if id.is_empty() {
        return Err(EditError::EmptyId);
    }
    Ok(id)
}

/// Append an empty step and return its normalized id
pub fn add_step(graph: &mut Graph, raw_id: &str) -> Result<String, EditError> {
    let id = normalize_step_id(raw_id)?;
    if graph.get(&id).is_some() {
        return Err(EditError::DuplicateId(id));
    }
    graph.insert(id.clone(), Node::default());
    Ok(id)
}

pub fn set_text(graph: &mut Graph, step: &str, text: impl Into<String>) -> Result<(), EditError> {
    let node = graph
        .get_mut(step)
        .ok_or_else(|| EditError::UnknownStep(step.to_string()))?;
    node.text = text.into();
    Ok(())
}

pub fn add_option(graph: &mut Graph, step: &str, option: ChatOption) -> Result<(), EditError> {
    let node = graph
        .get_mut(step)
        .ok_or_else(|| EditError::UnknownStep(step.to_string()))?;
    node.options.push(option);
    Ok(())
}

pub fn remove_option(graph: &mut Graph, step: &str, index: usize) -> Result<ChatOption, EditError> {
    let node = graph
        .get_mut(step)
        .ok_or_else(|| EditError::UnknownStep(step.to_string()))?;
    if index >= node.options.len() {
        return Err(EditError::UnknownOption {
            step: step.to_string(),
            index,
        });
    }
    Ok(node.options.remove(index))
}

/// Remove a step. `start` is protected; options pointing at the removed
/// step are left dangling and fall back at traversal time.
pub fn remove_step(graph: &mut Graph, step: &str) -> Result<Node, EditError> {
    if step == START_STEP {
        return Err(EditError::ProtectedStep(step.to_string()));
    }
    graph
        .remove(step)
        .ok_or_else(|| EditError::UnknownStep(step.to_string()))
}

pub fn validate(graph: &Graph) -> Vec<FlowIssue> {
    let mut issues = Vec::new();
    if graph.get(START_STEP).is_none() {
        issues.push(FlowIssue::MissingStart);
    }
    if graph.get(DEFAULT_STEP).is_none() {
        issues.push(FlowIssue::MissingDefault);
    }

    for (key, node) in graph.iter() {
        for (index, option) in node.options.iter().enumerate() {
            if option.label.trim().is_empty() {
                issues.push(FlowIssue::EmptyLabel {
                    step: key.to_string(),
                    index,
                });
            }
            if let OptionKind::Transition { next_step } = &option.kind {
                if !graph.contains(next_step) {
                    issues.push(FlowIssue::DanglingNextStep {
                        step: key.to_string(),
                        label: option.label.clone(),
                        target: next_step.clone(),
                    });
                }
            }
        }
    }

    issues
}
