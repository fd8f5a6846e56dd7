//! Adapters for the external collaborators
//!
//! With `CHATFLOW_BACKEND_URL` set, the flow store, metrics sink and oracle
//! all talk to that backend over HTTP. Without it the server runs in local
//! mode: flow in memory (seeded with the default flow), metrics logged, no
//! oracle.

mod error;
mod http;
mod memory;

pub use error::{BackendError, LoadError, OracleError, SaveError};
pub use http::HttpBackend;
pub use memory::{InMemoryFlowStore, NoOracle, TracingMetricsSink};

use crate::flow::default_flow;
use crate::runtime::{FlowStore, MetricsSink, StepOracle};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the external backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the backend; `None` selects local mode
    pub base_url: Option<String>,
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl BackendConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("CHATFLOW_BACKEND_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            request_timeout: std::env::var("CHATFLOW_BACKEND_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map_or(DEFAULT_TIMEOUT, Duration::from_secs),
        }
    }
}

/// The three collaborators a session needs
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn FlowStore>,
    pub oracle: Arc<dyn StepOracle>,
    pub metrics: Arc<dyn MetricsSink>,
}

impl Collaborators {
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        match &config.base_url {
            Some(base_url) => {
                let backend = Arc::new(HttpBackend::new(base_url, config)?);
                tracing::info!(base_url = %base_url, "Using remote backend");
                Ok(Self {
                    store: backend.clone(),
                    oracle: Arc::new(LoggingOracle::new(backend.clone())),
                    metrics: backend,
                })
            }
            None => {
                tracing::info!("No backend configured, running in local mode");
                Ok(Self::local())
            }
        }
    }

    pub fn local() -> Self {
        Self {
            store: Arc::new(InMemoryFlowStore::new(default_flow())),
            oracle: Arc::new(NoOracle),
            metrics: Arc::new(TracingMetricsSink::new()),
        }
    }
}

/// Logging wrapper for oracles
pub struct LoggingOracle {
    inner: Arc<dyn StepOracle>,
}

impl LoggingOracle {
    pub fn new(inner: Arc<dyn StepOracle>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StepOracle for LoggingOracle {
    async fn lookup(&self, text: &str) -> Result<Option<String>, OracleError> {
        let start = std::time::Instant::now();
        let result = self.inner.lookup(text).await;
        let duration = start.elapsed();

        match &result {
            Ok(step_id) => {
                tracing::info!(
                    duration_ms = %duration.as_millis(),
                    step_id = ?step_id,
                    "Oracle lookup completed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    duration_ms = %duration.as_millis(),
                    kind = ?e.0.kind,
                    error = %e,
                    "Oracle lookup failed"
                );
            }
        }

        result
    }
}
