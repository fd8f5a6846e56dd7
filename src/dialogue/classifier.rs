//! Free-text classification against the graph
//!
//! Rules, first hit wins, scanning nodes and options in graph order:
//! 1. text equals a step key
//! 2. text equals an option label
//! 3. text is a substring of an option label
//!
//! Input is trimmed and lower-cased; anything shorter than
//! `MIN_MATCH_CHARS` is never matched.

use crate::flow::{ChatOption, Graph};

pub const MIN_MATCH_CHARS: usize = 2;

/// Result of classifying typed text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<'g> {
    /// Text names a step directly (key as stored)
    DirectKeyMatch(&'g str),
    ExactLabelMatch(&'g ChatOption),
    /// First option whose label contains the text
    PartialLabelMatch(&'g ChatOption),
    /// Nothing matched locally; ask the oracle
    Unresolved,
}

pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn candidate(raw: &str) -> Option<String> {
    let text = normalize(raw);
    (text.chars().count() >= MIN_MATCH_CHARS).then_some(text)
}

fn options(graph: &Graph) -> impl Iterator<Item = &ChatOption> {
    graph.iter().flat_map(|(_, node)| node.options.iter())
}

pub fn classify<'g>(graph: &'g Graph, raw: &str) -> Outcome<'g> {
    let Some(text) = candidate(raw) else {
        return Outcome::Unresolved;
    };

    if let Some(key) = graph.keys().find(|key| key.to_lowercase() == text) {
        return Outcome::DirectKeyMatch(key);
    }

    if let Some(option) = options(graph).find(|o| normalize(&o.label) == text) {
        return Outcome::ExactLabelMatch(option);
    }

    if let Some(option) = options(graph).find(|o| normalize(&o.label).contains(&text)) {
        return Outcome::PartialLabelMatch(option);
    }

    Outcome::Unresolved
}

/// Whether the text is exactly some option's label. Used to submit typed
/// input without waiting for the debounce window.
pub fn is_exact_label_match(graph: &Graph, raw: &str) -> bool {
    candidate(raw).is_some_and(|text| options(graph).any(|o| normalize(&o.label) == text))
}
