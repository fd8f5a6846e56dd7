//! Click analytics
//!
//! Events are emitted fire-and-forget through a `MetricsSink`; the admin
//! summary is computed from the sink's history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Visit,
    OptionClick,
}

/// Analytics event as sent to the sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricEvent {
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub label: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl MetricEvent {
    pub fn new(kind: MetricKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn visit(label: impl Into<String>) -> Self {
        Self::new(MetricKind::Visit, label)
    }
}

/// Click count for one option label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterestCount {
    pub name: String,
    pub value: u64,
}

/// Option clicks counted per label, most clicked first (ties by label)
pub fn top_interests(events: &[MetricEvent]) -> Vec<InterestCount> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for event in events.iter().filter(|e| e.kind == MetricKind::OptionClick) {
        *counts.entry(event.label.as_str()).or_default() += 1;
    }

    let mut top: Vec<InterestCount> = counts
        .into_iter()
        .map(|(name, value)| InterestCount {
            name: name.to_string(),
            value,
        })
        .collect();
    top.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    top
}

pub fn total_interactions(events: &[MetricEvent]) -> usize {
    events.len()
}
