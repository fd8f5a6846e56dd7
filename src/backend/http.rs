//! Remote HTTP backend: flow store, metrics sink and fallback oracle
//!
//! Request bodies are sent as `text/plain` JSON strings; the backend reads
//! them as opaque text.

use super::error::{BackendError, LoadError, OracleError, SaveError};
use super::BackendConfig;
use crate::flow::Graph;
use crate::metrics::MetricEvent;
use crate::runtime::{FlowStore, MetricsSink, StepOracle};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::{json, Value};

const TEXT_PLAIN: &str = "text/plain";

/// One client for every backend endpoint
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(BackendError::from)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn post_text(&self, path: &str, body: String) -> Result<(), BackendError> {
        self.client
            .post(self.endpoint(path))
            .header(CONTENT_TYPE, TEXT_PLAIN)
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Extract `stepId` from an oracle reply; anything but a non-empty string is no answer
pub(crate) fn step_id_from_reply(reply: &Value) -> Option<String> {
    reply
        .get("stepId")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl FlowStore for HttpBackend {
    async fn load(&self) -> Result<Graph, LoadError> {
        let fetch = async {
            let response = self
                .client
                .get(self.endpoint("flow"))
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, BackendError>(response.text().await?)
        };
        let body = fetch.await.map_err(LoadError::Unavailable)?;
        Graph::from_json(&body).map_err(|e| LoadError::Malformed(e.to_string()))
    }

    async fn save(&self, graph: &Graph) -> Result<(), SaveError> {
        let body = graph.to_json().map_err(|e| SaveError::Encode(e.to_string()))?;
        self.post_text("flow", body)
            .await
            .map_err(SaveError::Unavailable)
    }
}

#[async_trait]
impl StepOracle for HttpBackend {
    async fn lookup(&self, text: &str) -> Result<Option<String>, OracleError> {
        let reply: Value = self
            .client
            .get(self.endpoint("aiFallback"))
            .query(&[("text", text)])
            .send()
            .await
            .map_err(BackendError::from)?
            .error_for_status()
            .map_err(BackendError::from)?
            .json()
            .await
            .map_err(BackendError::from)?;
        Ok(step_id_from_reply(&reply))
    }
}

#[async_trait]
impl MetricsSink for HttpBackend {
    async fn record(&self, event: &MetricEvent) -> Result<(), BackendError> {
        let body = json!({ "type": event.kind, "label": event.label }).to_string();
        self.post_text("event", body).await
    }

    async fn history(&self) -> Result<Vec<MetricEvent>, BackendError> {
        let events = self
            .client
            .get(self.endpoint("event"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(events)
    }
}
