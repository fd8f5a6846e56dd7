//! Node resolution with the default/start fallback chain

use crate::flow::{ChatOption, Graph, DEFAULT_STEP, START_STEP};
use thiserror::Error;

/// Which rule of the fallback chain produced the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The requested key exists
    Exact,
    /// The requested key is missing; `default` was used
    Default,
    /// Neither the key nor `default` exist; `start` was used
    Start,
}

/// A node ready to be rendered as a bot message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNode<'g> {
    /// Key of the rendered node, as stored in the graph
    pub key: &'g str,
    pub text: &'g str,
    /// Options to attach to the rendered message (not always the node's own)
    pub options: &'g [ChatOption],
    pub resolution: Resolution,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Flow has no \"start\" or \"default\" step")]
    NoStartNode,
}

/// Resolve `key` against `graph`.
///
/// Whenever the rendered node is `default`, `start`'s options are attached
/// instead of `default`'s own, so the visitor can always get back to the
/// main menu.
pub fn resolve<'g>(graph: &'g Graph, key: &str) -> Result<ResolvedNode<'g>, ResolveError> {
    let (found_key, node, resolution) = if let Some((k, n)) = graph.find(key) {
        (k, n, Resolution::Exact)
    } else if let Some((k, n)) = graph.find(DEFAULT_STEP) {
        (k, n, Resolution::Default)
    } else if let Some((k, n)) = graph.find(START_STEP) {
        (k, n, Resolution::Start)
    } else {
        return Err(ResolveError::NoStartNode);
    };

    let is_default = found_key.eq_ignore_ascii_case(DEFAULT_STEP);
    let options = if is_default {
        graph
            .find(START_STEP)
            .map_or(&[][..], |(_, start)| start.options.as_slice())
    } else {
        node.options.as_slice()
    };

    Ok(ResolvedNode {
        key: found_key,
        text: &node.text,
        options,
        resolution,
    })
}
