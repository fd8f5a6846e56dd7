//! Mock implementations for testing
//!
//! These mocks enable integration testing of the executor without real I/O.

use super::executor::SessionRuntime;
use super::traits::*;
use super::{SequencedUpdate, SessionCommand, SessionSnapshot, SessionUpdate};
use crate::backend::{BackendError, LoadError, OracleError, SaveError};
use crate::dialogue::{SessionConfig, SessionContext};
use crate::flow::{default_flow, Graph};
use crate::metrics::MetricEvent;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Notify};

// ============================================================================
// Mock Flow Store
// ============================================================================

/// Flow store that serves queued load results, then a fixed graph
pub struct MockFlowStore {
    graph: Graph,
    loads: Mutex<VecDeque<Result<Graph, LoadError>>>,
    /// Record of every saved graph
    pub saves: Mutex<Vec<Graph>>,
}

impl MockFlowStore {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            loads: Mutex::new(VecDeque::new()),
            saves: Mutex::new(Vec::new()),
        }
    }

    /// Queue a load result served before the fixed graph
    pub fn queue_load(&self, result: Result<Graph, LoadError>) {
        self.loads.lock().unwrap().push_back(result);
    }
}

impl Default for MockFlowStore {
    fn default() -> Self {
        Self::new(default_flow())
    }
}

#[async_trait]
impl FlowStore for MockFlowStore {
    async fn load(&self) -> Result<Graph, LoadError> {
        self.loads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.graph.clone()))
    }

    async fn save(&self, graph: &Graph) -> Result<(), SaveError> {
        self.saves.lock().unwrap().push(graph.clone());
        Ok(())
    }
}

// ============================================================================
// Mock Oracle
// ============================================================================

/// Oracle that returns queued replies after an optional delay
pub struct MockOracle {
    replies: Mutex<VecDeque<Result<Option<String>, OracleError>>>,
    delay: Duration,
    /// Record of all texts looked up
    pub requests: Mutex<Vec<String>>,
    /// Notified when a lookup starts (for test synchronization)
    pub request_started: Arc<Notify>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            delay,
            requests: Mutex::new(Vec::new()),
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_reply(&self, step_id: Option<&str>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(step_id.map(str::to_string)));
    }

    pub fn queue_error(&self, error: OracleError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StepOracle for MockOracle {
    async fn lookup(&self, text: &str) -> Result<Option<String>, OracleError> {
        self.requests.lock().unwrap().push(text.to_string());
        self.request_started.notify_one();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.replies.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }
}

// ============================================================================
// Recording Metrics Sink
// ============================================================================

#[derive(Default)]
pub struct RecordingMetricsSink {
    pub events: Mutex<Vec<MetricEvent>>,
}

impl RecordingMetricsSink {
    pub fn recorded(&self) -> Vec<MetricEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricsSink for RecordingMetricsSink {
    async fn record(&self, event: &MetricEvent) -> Result<(), BackendError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn history(&self) -> Result<Vec<MetricEvent>, BackendError> {
        Ok(self.recorded())
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

/// Helper for building test runtimes with minimal boilerplate
pub struct TestRuntime {
    pub store: Arc<MockFlowStore>,
    pub oracle: Arc<MockOracle>,
    pub metrics: Arc<RecordingMetricsSink>,
    pub command_tx: mpsc::Sender<SessionCommand>,
    pub update_rx: broadcast::Receiver<SequencedUpdate>,
    pub snapshot_rx: watch::Receiver<SessionSnapshot>,
    runtime_handle: tokio::task::JoinHandle<()>,
}

pub struct TestRuntimeBuilder {
    session_id: String,
    config: SessionConfig,
    store: Option<MockFlowStore>,
    oracle: Option<MockOracle>,
}

impl TestRuntimeBuilder {
    pub fn new() -> Self {
        Self {
            session_id: "test-session".to_string(),
            config: SessionConfig::default(),
            store: None,
            oracle: None,
        }
    }

    pub fn store(mut self, store: MockFlowStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn oracle(mut self, oracle: MockOracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn restart_delay(mut self, delay: Duration) -> Self {
        self.config.restart_delay = delay;
        self
    }

    pub fn debounce_window(mut self, window: Duration) -> Self {
        self.config.debounce_window = window;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn build(self) -> TestRuntime {
        let store = Arc::new(self.store.unwrap_or_default());
        let oracle = Arc::new(self.oracle.unwrap_or_default());
        let metrics = Arc::new(RecordingMetricsSink::default());

        let context = SessionContext::new(self.session_id, self.config);
        let (command_tx, command_rx) = mpsc::channel(32);
        let (update_tx, update_rx) = broadcast::channel(128);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let runtime = SessionRuntime::new(
            context,
            store.clone(),
            oracle.clone(),
            metrics.clone(),
            command_rx,
            update_tx,
            snapshot_tx,
        );

        let runtime_handle = tokio::spawn(async move {
            runtime.run().await;
        });

        TestRuntime {
            store,
            oracle,
            metrics,
            command_tx,
            update_rx,
            snapshot_rx,
            runtime_handle,
        }
    }
}

impl Default for TestRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

const WAIT: Duration = Duration::from_secs(2);

impl TestRuntime {
    /// Create a runtime over the default flow with instant mocks
    pub fn builder() -> TestRuntimeBuilder {
        TestRuntimeBuilder::new()
    }

    pub async fn send(&self, command: SessionCommand) {
        self.command_tx
            .send(command)
            .await
            .expect("Failed to send command");
    }

    pub async fn send_text(&self, text: &str) {
        self.send(SessionCommand::Send {
            text: text.to_string(),
        })
        .await;
    }

    pub async fn type_text(&self, text: &str) {
        self.send(SessionCommand::Type {
            text: text.to_string(),
        })
        .await;
    }

    /// Wait until the snapshot satisfies `pred`, returning it
    pub async fn wait_for(
        &mut self,
        pred: impl FnMut(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        tokio::time::timeout(WAIT, self.snapshot_rx.wait_for(pred))
            .await
            .expect("Timed out waiting for snapshot")
            .expect("Runtime stopped")
            .clone()
    }

    /// Wait until the last visible message has the given text
    pub async fn wait_for_last_text(&mut self, text: &str) -> SessionSnapshot {
        let text = text.to_string();
        self.wait_for(move |s| {
            s.messages
                .iter()
                .rev()
                .find(|m| !m.typing)
                .is_some_and(|m| m.text == text)
        })
        .await
    }

    /// Receive updates until one matches `pred`
    pub async fn wait_for_update(
        &mut self,
        mut pred: impl FnMut(&SessionUpdate) -> bool,
    ) -> SessionUpdate {
        tokio::time::timeout(WAIT, async {
            loop {
                match self.update_rx.recv().await {
                    Ok(sequenced) if pred(&sequenced.update) => return sequenced.update,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("Runtime stopped"),
                }
            }
        })
        .await
        .expect("Timed out waiting for update")
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Drop the command channel and wait for the runtime to stop
    pub async fn shutdown(self) -> SessionSnapshot {
        let TestRuntime {
            command_tx,
            snapshot_rx,
            runtime_handle,
            ..
        } = self;
        drop(command_tx);
        tokio::time::timeout(WAIT, runtime_handle)
            .await
            .expect("Runtime did not stop")
            .expect("Runtime panicked");
        let snapshot = snapshot_rx.borrow().clone();
        snapshot
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::dialogue::{SessionState, Sender};
    use crate::flow::{ChatOption, DEFAULT_STEP, START_STEP};
    use crate::metrics::MetricKind;

    fn text_of(step: &str) -> String {
        default_flow().get(step).unwrap().text.clone()
    }

    async fn eventually(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..100 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_start_rendered_on_load() {
        let mut rt = TestRuntime::builder().build();

        let snapshot = rt.wait_for(|s| s.state == SessionState::Idle).await;
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].text, text_of(START_STEP));
        assert_eq!(snapshot.messages[0].options.len(), 3);

        let metrics = rt.metrics.clone();
        assert!(
            eventually(|| metrics
                .recorded()
                .iter()
                .any(|e| e.kind == MetricKind::Visit))
            .await
        );
    }

    #[tokio::test]
    async fn test_load_failure_then_reload() {
        let store = MockFlowStore::default();
        store.queue_load(Err(LoadError::Unavailable(BackendError::network(
            "connection refused",
        ))));
        let mut rt = TestRuntime::builder().store(store).build();

        rt.wait_for_update(|u| matches!(u, SessionUpdate::Error { .. }))
            .await;
        let snapshot = rt.snapshot();
        assert_eq!(snapshot.state, SessionState::AwaitingFlow);
        assert!(snapshot.messages.is_empty());

        rt.send(SessionCommand::Reload).await;
        rt.wait_for_last_text(&text_of(START_STEP)).await;
    }

    #[tokio::test]
    async fn test_input_rejected_before_flow_loads() {
        let store = MockFlowStore::default();
        store.queue_load(Err(LoadError::Malformed("bad json".to_string())));
        let mut rt = TestRuntime::builder().store(store).build();
        rt.wait_for_update(|u| matches!(u, SessionUpdate::Error { .. }))
            .await;

        rt.send_text("hello").await;
        rt.wait_for_update(|u| matches!(u, SessionUpdate::Error { .. }))
            .await;
        assert!(rt.snapshot().messages.is_empty());
        assert!(rt.oracle.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_click_renders_target() {
        let mut rt = TestRuntime::builder().build();
        rt.wait_for(|s| s.state == SessionState::Idle).await;

        rt.send(SessionCommand::Click {
            option: ChatOption::transition("I want to donate ❤️", "donation"),
        })
        .await;

        let snapshot = rt.wait_for_last_text(&text_of("donation")).await;
        assert_eq!(snapshot.messages.len(), 3);
        assert_eq!(snapshot.messages[1].sender, Sender::User);
        assert_eq!(snapshot.messages[1].text, "I want to donate ❤️");

        let metrics = rt.metrics.clone();
        assert!(
            eventually(|| metrics
                .recorded()
                .iter()
                .any(|e| e.kind == MetricKind::OptionClick && e.label == "I want to donate ❤️"))
            .await
        );
    }

    #[tokio::test]
    async fn test_url_click_restarts_after_delay() {
        let mut rt = TestRuntime::builder()
            .restart_delay(Duration::from_millis(50))
            .build();
        rt.wait_for(|s| s.state == SessionState::Idle).await;

        rt.send(SessionCommand::Click {
            option: ChatOption::url("Fill in the form", "https://google.com/forms"),
        })
        .await;

        let update = rt
            .wait_for_update(|u| matches!(u, SessionUpdate::OpenLink { .. }))
            .await;
        assert!(matches!(
            update,
            SessionUpdate::OpenLink { url } if url == "https://google.com/forms"
        ));

        let snapshot = rt.wait_for(|s| s.messages.len() == 3).await;
        assert_eq!(snapshot.messages[2].text, text_of(START_STEP));
    }

    #[tokio::test]
    async fn test_whatsapp_click_opens_chat_without_restart() {
        let mut rt = TestRuntime::builder()
            .restart_delay(Duration::from_millis(20))
            .build();
        rt.wait_for(|s| s.state == SessionState::Idle).await;

        rt.send(SessionCommand::Click {
            option: ChatOption::whatsapp("Talk on WhatsApp", "5511999999999"),
        })
        .await;

        let update = rt
            .wait_for_update(|u| matches!(u, SessionUpdate::OpenLink { .. }))
            .await;
        assert!(matches!(
            update,
            SessionUpdate::OpenLink { url } if url == "https://wa.me/5511999999999"
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(rt.snapshot().messages.len(), 2);
    }

    #[tokio::test]
    async fn test_oracle_reply_renders_step() {
        let oracle = MockOracle::new();
        oracle.queue_reply(Some("pix"));
        let mut rt = TestRuntime::builder().oracle(oracle).build();
        rt.wait_for(|s| s.state == SessionState::Idle).await;

        rt.send_text("  xyzzy qwerty ").await;

        let snapshot = rt.wait_for_last_text(&text_of("pix")).await;
        assert_eq!(snapshot.state, SessionState::Idle);
        assert!(snapshot.messages.iter().all(|m| !m.typing));
        assert_eq!(rt.oracle.recorded_requests(), vec!["xyzzy qwerty"]);
    }

    #[tokio::test]
    async fn test_oracle_failure_falls_back_to_default() {
        let oracle = MockOracle::new();
        oracle.queue_error(OracleError(BackendError::network("timeout")));
        let mut rt = TestRuntime::builder().oracle(oracle).build();
        rt.wait_for(|s| s.state == SessionState::Idle).await;

        rt.send_text("xyzzy").await;

        let snapshot = rt.wait_for_last_text(&text_of(DEFAULT_STEP)).await;
        let last = snapshot.messages.last().unwrap();
        // default borrows the start options
        assert_eq!(last.options.len(), 3);
        assert_eq!(snapshot.state, SessionState::Idle);
    }

    #[tokio::test]
    async fn test_local_match_skips_oracle() {
        let mut rt = TestRuntime::builder().build();
        rt.wait_for(|s| s.state == SessionState::Idle).await;

        rt.send_text("PIX").await;

        rt.wait_for_last_text(&text_of("pix")).await;
        assert!(rt.oracle.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_second_submission_rejected_while_in_flight() {
        let oracle = MockOracle::with_delay(Duration::from_millis(200));
        let started = oracle.request_started.clone();
        let mut rt = TestRuntime::builder().oracle(oracle).build();
        rt.wait_for(|s| s.state == SessionState::Idle).await;

        rt.send_text("xyzzy one").await;
        started.notified().await;
        assert!(rt.snapshot().state.is_submitting());

        rt.send_text("xyzzy two").await;
        rt.wait_for_update(|u| matches!(u, SessionUpdate::Error { .. }))
            .await;

        rt.wait_for_last_text(&text_of(DEFAULT_STEP)).await;
        assert_eq!(rt.oracle.recorded_requests(), vec!["xyzzy one"]);
        assert!(!rt
            .snapshot()
            .messages
            .iter()
            .any(|m| m.text == "xyzzy two"));
    }

    #[tokio::test]
    async fn test_click_handled_while_oracle_outstanding() {
        let oracle = MockOracle::with_delay(Duration::from_millis(150));
        let started = oracle.request_started.clone();
        let mut rt = TestRuntime::builder().oracle(oracle).build();
        rt.wait_for(|s| s.state == SessionState::Idle).await;

        rt.send_text("xyzzy").await;
        started.notified().await;

        rt.send(SessionCommand::Click {
            option: ChatOption::transition("I want to donate ❤️", "donation"),
        })
        .await;
        let donation = text_of("donation");
        rt.wait_for(|s| s.messages.iter().any(|m| m.text == donation))
            .await;

        let snapshot = rt.wait_for_last_text(&text_of(DEFAULT_STEP)).await;
        let position = |text: &str| snapshot.messages.iter().position(|m| m.text == text);
        assert!(position(&donation) < position(&text_of(DEFAULT_STEP)));
        assert_eq!(snapshot.state, SessionState::Idle);
    }

    #[tokio::test]
    async fn test_typing_is_debounced() {
        let mut rt = TestRuntime::builder()
            .debounce_window(Duration::from_millis(50))
            .build();
        rt.wait_for(|s| s.state == SessionState::Idle).await;

        rt.type_text("xy").await;
        rt.type_text("xyzz").await;
        rt.type_text("xyzzy").await;

        rt.wait_for_last_text(&text_of(DEFAULT_STEP)).await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(rt.oracle.recorded_requests(), vec!["xyzzy"]);
        let user_messages: Vec<_> = rt
            .snapshot()
            .messages
            .into_iter()
            .filter(|m| m.sender == Sender::User)
            .collect();
        assert_eq!(user_messages.len(), 1);
    }

    #[tokio::test]
    async fn test_exact_label_submits_without_waiting() {
        let mut rt = TestRuntime::builder()
            .debounce_window(Duration::from_secs(60))
            .build();
        rt.wait_for(|s| s.state == SessionState::Idle).await;

        rt.type_text("pix key").await;

        rt.wait_for_last_text(&text_of("pix")).await;
        assert!(rt.oracle.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_send_cancels_pending_draft() {
        let mut rt = TestRuntime::builder()
            .debounce_window(Duration::from_millis(50))
            .build();
        rt.wait_for(|s| s.state == SessionState::Idle).await;

        rt.type_text("xyzzy").await;
        rt.send_text("xyzzy").await;

        rt.wait_for_last_text(&text_of(DEFAULT_STEP)).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(rt.oracle.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_send_rejected() {
        let mut rt = TestRuntime::builder().build();
        rt.wait_for(|s| s.state == SessionState::Idle).await;

        rt.send_text("   ").await;
        rt.wait_for_update(|u| matches!(u, SessionUpdate::Error { .. }))
            .await;
        assert_eq!(rt.snapshot().messages.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_discards_late_reply() {
        let oracle = MockOracle::with_delay(Duration::from_millis(100));
        oracle.queue_reply(Some("pix"));
        let started = oracle.request_started.clone();
        let mut rt = TestRuntime::builder().oracle(oracle).build();
        rt.wait_for(|s| s.state == SessionState::Idle).await;

        rt.send_text("xyzzy").await;
        started.notified().await;

        let snapshot = rt.shutdown().await;
        assert!(snapshot.state.is_submitting());
        assert!(!snapshot.messages.iter().any(|m| m.text == text_of("pix")));
    }

    #[tokio::test]
    async fn test_mock_store_serves_queue_first() {
        let store = MockFlowStore::default();
        store.queue_load(Ok(Graph::new()));
        assert!(store.load().await.unwrap().is_empty());
        assert_eq!(store.load().await.unwrap(), default_flow());

        store.save(&Graph::new()).await.unwrap();
        assert_eq!(store.saves.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_draft_rejected_in_flight_fires_later() {
        let oracle = MockOracle::with_delay(Duration::from_millis(200));
        let started = oracle.request_started.clone();
        let mut rt = TestRuntime::builder()
            .oracle(oracle)
            .debounce_window(Duration::from_millis(30))
            .build();
        rt.wait_for(|s| s.state == SessionState::Idle).await;

        rt.send_text("xyzzy one").await;
        started.notified().await;
        // Fires while the first submission is outstanding and is rejected
        rt.type_text("xyzzy two").await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        rt.wait_for_last_text(&text_of(DEFAULT_STEP)).await;
        rt.wait_for(|s| s.state == SessionState::Idle).await;

        rt.type_text("xyzzy two!").await;
        rt.type_text("xyzzy two").await;
        started.notified().await;

        assert_eq!(
            rt.oracle.recorded_requests(),
            vec!["xyzzy one", "xyzzy two"]
        );
    }

    #[tokio::test]
    async fn test_snapshot_tracks_every_update() {
        let mut rt = TestRuntime::builder().build();
        rt.wait_for(|s| s.state == SessionState::Idle).await;

        rt.send(SessionCommand::Click {
            option: ChatOption::transition("I want to donate ❤️", "donation"),
        })
        .await;
        rt.wait_for_last_text(&text_of("donation")).await;
        let snapshot = rt.snapshot();

        let mut updates = Vec::new();
        while updates.last().map_or(0, |u: &SequencedUpdate| u.seq) < snapshot.seq {
            updates.push(rt.update_rx.recv().await.unwrap());
        }
        let seqs: Vec<u64> = updates.iter().map(|u| u.seq).collect();
        assert_eq!(seqs, (1..=snapshot.seq).collect::<Vec<_>>());

        let broadcast_texts: Vec<&str> = updates
            .iter()
            .filter_map(|u| match &u.update {
                SessionUpdate::Message { message } => Some(message.text.as_str()),
                _ => None,
            })
            .collect();
        let snapshot_texts: Vec<&str> = snapshot.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(broadcast_texts, snapshot_texts);
    }

    #[tokio::test]
    async fn test_idle_runtime_stops() {
        let mut rt = TestRuntime::builder()
            .idle_timeout(Duration::from_millis(100))
            .build();
        rt.wait_for(|s| s.state == SessionState::Idle).await;

        // Commands keep the session alive
        for _ in 0..4 {
            rt.send(SessionCommand::Reload).await;
            tokio::time::sleep(Duration::from_millis(40)).await;
        }
        assert!(!rt.runtime_handle.is_finished());

        tokio::time::timeout(WAIT, &mut rt.runtime_handle)
            .await
            .expect("Idle runtime did not stop")
            .expect("Runtime panicked");
        assert!(rt.command_tx.send(SessionCommand::Reload).await.is_err());
    }
}
