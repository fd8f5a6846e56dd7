//! Local adapters used when no remote backend is configured

use super::error::{BackendError, LoadError, OracleError, SaveError};
use crate::flow::Graph;
use crate::metrics::MetricEvent;
use crate::runtime::{FlowStore, MetricsSink, StepOracle};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Flow store kept in process memory
pub struct InMemoryFlowStore {
    graph: RwLock<Graph>,
}

impl InMemoryFlowStore {
    pub fn new(initial: Graph) -> Self {
        Self {
            graph: RwLock::new(initial),
        }
    }
}

#[async_trait]
impl FlowStore for InMemoryFlowStore {
    async fn load(&self) -> Result<Graph, LoadError> {
        Ok(self.graph.read().await.clone())
    }

    async fn save(&self, graph: &Graph) -> Result<(), SaveError> {
        *self.graph.write().await = graph.clone();
        Ok(())
    }
}

/// Metrics sink that logs events and keeps them for the admin summary
#[derive(Default)]
pub struct TracingMetricsSink {
    events: RwLock<Vec<MetricEvent>>,
}

impl TracingMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricsSink for TracingMetricsSink {
    async fn record(&self, event: &MetricEvent) -> Result<(), BackendError> {
        tracing::info!(kind = ?event.kind, label = %event.label, "Metric recorded");
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn history(&self) -> Result<Vec<MetricEvent>, BackendError> {
        Ok(self.events.read().await.clone())
    }
}

/// Oracle that never knows the answer; every unresolved text renders `default`
pub struct NoOracle;

#[async_trait]
impl StepOracle for NoOracle {
    async fn lookup(&self, _text: &str) -> Result<Option<String>, OracleError> {
        Ok(None)
    }
}
