//! Conversation graph types
//!
//! Wire shape: a JSON object keyed by step id, each value `{text, options[]}`.
//! Key order of the object is kept, since it drives classifier scan order.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Entry point of every usable graph
pub const START_STEP: &str = "start";

/// Fallback-of-last-resort step
pub const DEFAULT_STEP: &str = "default";

const WHATSAPP_LINK_BASE: &str = "https://wa.me/";

/// Wire tag of an external action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTag {
    Url,
    Whatsapp,
}

/// Side effect performed outside the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalAction {
    /// Open a web page
    Url(String),
    /// Open a WhatsApp chat with the given phone number
    Whatsapp(String),
}

impl ExternalAction {
    pub fn tag(&self) -> ActionTag {
        match self {
            ExternalAction::Url(_) => ActionTag::Url,
            ExternalAction::Whatsapp(_) => ActionTag::Whatsapp,
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            ExternalAction::Url(payload) | ExternalAction::Whatsapp(payload) => payload,
        }
    }

    /// Link the client should open for this action
    pub fn link(&self) -> String {
        match self {
            ExternalAction::Url(url) => url.clone(),
            ExternalAction::Whatsapp(phone) => format!("{WHATSAPP_LINK_BASE}{phone}"),
        }
    }
}

/// What selecting an option does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionKind {
    /// Move to another step (the key may not exist)
    Transition { next_step: String },
    /// Leave the conversation through an external link
    External(ExternalAction),
}

/// A user-selectable choice attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOption", into = "RawOption")]
pub struct ChatOption {
    pub label: String,
    pub kind: OptionKind,
}

impl ChatOption {
    pub fn transition(label: impl Into<String>, next_step: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: OptionKind::Transition {
                next_step: next_step.into(),
            },
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: OptionKind::External(ExternalAction::Url(url.into())),
        }
    }

    pub fn whatsapp(label: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: OptionKind::External(ExternalAction::Whatsapp(phone.into())),
        }
    }

    pub fn next_step(&self) -> Option<&str> {
        match &self.kind {
            OptionKind::Transition { next_step } => Some(next_step),
            OptionKind::External(_) => None,
        }
    }
}

/// Flat wire form of an option
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOption {
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<ActionTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<String>,
}

/// Option wire shapes that are neither a transition nor an external action
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionShapeError {
    #[error("option '{0}' has both nextStep and action")]
    Ambiguous(String),
    #[error("option '{0}' has neither nextStep nor action")]
    Empty(String),
    #[error("option '{0}' has an action but no payload")]
    MissingPayload(String),
}

impl TryFrom<RawOption> for ChatOption {
    type Error = OptionShapeError;

    fn try_from(raw: RawOption) -> Result<Self, Self::Error> {
        let next_step = raw.next_step.filter(|s| !s.is_empty());
        let payload = raw.payload.filter(|s| !s.is_empty());

        let kind = match (next_step, raw.action) {
            (Some(_), Some(_)) => return Err(OptionShapeError::Ambiguous(raw.label)),
            (None, None) => return Err(OptionShapeError::Empty(raw.label)),
            (Some(next_step), None) => OptionKind::Transition { next_step },
            (None, Some(tag)) => {
                let Some(payload) = payload else {
                    return Err(OptionShapeError::MissingPayload(raw.label));
                };
                OptionKind::External(match tag {
                    ActionTag::Url => ExternalAction::Url(payload),
                    ActionTag::Whatsapp => ExternalAction::Whatsapp(payload),
                })
            }
        };

        Ok(Self {
            label: raw.label,
            kind,
        })
    }
}

impl From<ChatOption> for RawOption {
    fn from(option: ChatOption) -> Self {
        match option.kind {
            OptionKind::Transition { next_step } => RawOption {
                label: option.label,
                next_step: Some(next_step),
                action: None,
                payload: None,
            },
            OptionKind::External(action) => RawOption {
                label: option.label,
                next_step: None,
                action: Some(action.tag()),
                payload: Some(action.payload().to_string()),
            },
        }
    }
}

/// One step of the dialogue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub options: Vec<ChatOption>,
}

impl Node {
    pub fn new(text: impl Into<String>, options: Vec<ChatOption>) -> Self {
        Self {
            text: text.into(),
            options,
        }
    }
}

/// Ordered keyed collection of nodes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    nodes: Vec<(String, Node)>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `(key, node)` pairs; a repeated key replaces the earlier node
    pub fn from_nodes<K: Into<String>>(nodes: impl IntoIterator<Item = (K, Node)>) -> Self {
        let mut graph = Self::new();
        for (key, node) in nodes {
            graph.insert(key, node);
        }
        graph
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Exact-case lookup
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.nodes.iter().find(|(k, _)| k == key).map(|(_, n)| n)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|(k, _)| k == key).map(|(_, n)| n)
    }

    /// Lookup used during traversal: exact case first, then case-insensitive.
    /// Returns the key as stored.
    pub fn find(&self, key: &str) -> Option<(&str, &Node)> {
        let exact = self.nodes.iter().find(|(k, _)| k == key);
        let entry = exact.or_else(|| {
            let wanted = key.to_lowercase();
            self.nodes.iter().find(|(k, _)| k.to_lowercase() == wanted)
        });
        entry.map(|(k, n)| (k.as_str(), n))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Insert or replace; new keys go to the end
    pub fn insert(&mut self, key: impl Into<String>, node: Node) -> Option<Node> {
        let key = key.into();
        if let Some(existing) = self.get_mut(&key) {
            return Some(std::mem::replace(existing, node));
        }
        self.nodes.push((key, node));
        None
    }

    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let index = self.nodes.iter().position(|(k, _)| k == key)?;
        Some(self.nodes.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.nodes.iter().map(|(k, n)| (k.as_str(), n))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Serialize for Graph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.nodes.len()))?;
        for (key, node) in &self.nodes {
            map.serialize_entry(key, node)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Graph {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GraphVisitor;

        impl<'de> Visitor<'de> for GraphVisitor {
            type Value = Graph;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of step ids to steps")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Graph, A::Error> {
                let mut nodes: Vec<(String, Node)> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, node)) = access.next_entry::<String, Node>()? {
                    if nodes.iter().any(|(k, _)| *k == key) {
                        return Err(de::Error::custom(format!("duplicate step id '{key}'")));
                    }
                    nodes.push((key, node));
                }
                Ok(Graph { nodes })
            }
        }

        deserializer.deserialize_map(GraphVisitor)
    }
}
