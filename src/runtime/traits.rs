//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::backend::{BackendError, LoadError, OracleError, SaveError};
use crate::flow::Graph;
use crate::metrics::MetricEvent;
use async_trait::async_trait;
use std::sync::Arc;

/// Storage for the conversation flow
#[async_trait]
pub trait FlowStore: Send + Sync {
    /// Fetch the current flow
    async fn load(&self) -> Result<Graph, LoadError>;

    /// Replace the stored flow
    async fn save(&self, graph: &Graph) -> Result<(), SaveError>;
}

/// Free-text classification service consulted when local matching fails
#[async_trait]
pub trait StepOracle: Send + Sync {
    /// Step id the text should lead to, if the oracle has one
    async fn lookup(&self, text: &str) -> Result<Option<String>, OracleError>;
}

/// Analytics sink
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Record one event. Callers fire and forget.
    async fn record(&self, event: &MetricEvent) -> Result<(), BackendError>;

    /// All recorded events, for the admin summary
    async fn history(&self) -> Result<Vec<MetricEvent>, BackendError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: FlowStore + ?Sized> FlowStore for Arc<T> {
    async fn load(&self) -> Result<Graph, LoadError> {
        (**self).load().await
    }

    async fn save(&self, graph: &Graph) -> Result<(), SaveError> {
        (**self).save(graph).await
    }
}

#[async_trait]
impl<T: StepOracle + ?Sized> StepOracle for Arc<T> {
    async fn lookup(&self, text: &str) -> Result<Option<String>, OracleError> {
        (**self).lookup(text).await
    }
}

#[async_trait]
impl<T: MetricsSink + ?Sized> MetricsSink for Arc<T> {
    async fn record(&self, event: &MetricEvent) -> Result<(), BackendError> {
        (**self).record(event).await
    }

    async fn history(&self) -> Result<Vec<MetricEvent>, BackendError> {
        (**self).history().await
    }
}
