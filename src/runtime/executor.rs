//! Session runtime executor
//!
//! Owns one session: runs the pure transition for each event and executes
//! the resulting effects. Everything happens on this task; oracle calls,
//! flow loads and timers run in spawned tasks that report back as events.

use super::debounce::Debouncer;
use super::traits::{FlowStore, MetricsSink, StepOracle};
use super::{SequencedUpdate, SessionCommand, SessionSnapshot, SessionUpdate};
use crate::dialogue::{
    is_exact_label_match, transition, Effect, Event, Message, SessionContext, SessionState,
    Transcript, TransitionError,
};
use crate::metrics::MetricEvent;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;

/// Generic session runtime that can work with any store, oracle and metrics sink
pub struct SessionRuntime<S, O, M>
where
    S: FlowStore + 'static,
    O: StepOracle + 'static,
    M: MetricsSink + 'static,
{
    context: SessionContext,
    state: SessionState,
    transcript: Transcript,
    store: Arc<S>,
    oracle: Arc<O>,
    metrics: Arc<M>,
    command_rx: mpsc::Receiver<SessionCommand>,
    /// Events produced by spawned tasks (loads, oracle replies, timers)
    event_tx: mpsc::Sender<Event>,
    event_rx: mpsc::Receiver<Event>,
    update_tx: broadcast::Sender<SequencedUpdate>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    /// Sequence number of the last broadcast update
    seq: u64,
    debouncer: Debouncer,
    next_submission_id: u64,
    last_command: Instant,
}

impl<S, O, M> SessionRuntime<S, O, M>
where
    S: FlowStore + 'static,
    O: StepOracle + 'static,
    M: MetricsSink + 'static,
{
    pub fn new(
        context: SessionContext,
        store: S,
        oracle: O,
        metrics: M,
        command_rx: mpsc::Receiver<SessionCommand>,
        update_tx: broadcast::Sender<SequencedUpdate>,
        snapshot_tx: watch::Sender<SessionSnapshot>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(32);
        let debouncer = Debouncer::new(context.config.debounce_window);
        Self {
            context,
            state: SessionState::AwaitingFlow,
            transcript: Transcript::new(),
            store: Arc::new(store),
            oracle: Arc::new(oracle),
            metrics: Arc::new(metrics),
            command_rx,
            event_tx,
            event_rx,
            update_tx,
            snapshot_tx,
            seq: 0,
            debouncer,
            next_submission_id: 1,
            last_command: Instant::now(),
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.context.session_id, "Starting session runtime");

        self.record_metric(MetricEvent::visit(&self.context.config.visit_label));
        self.load_flow();

        loop {
            let deadline = self.debouncer.deadline();
            let idle_deadline = self
                .last_command
                .checked_add(self.context.config.idle_timeout);
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => {
                        self.last_command = Instant::now();
                        self.handle_command(command);
                    }
                    // Every handle is gone: the session is torn down
                    None => break,
                },
                Some(event) = self.event_rx.recv() => {
                    self.dispatch(event, true);
                }
                () = sleep_until(deadline) => {
                    if let Some(text) = self.debouncer.fire() {
                        self.submit_draft(text);
                    }
                }
                () = sleep_until(idle_deadline) => {
                    tracing::info!(
                        session_id = %self.context.session_id,
                        idle_secs = self.context.config.idle_timeout.as_secs(),
                        "Session idle, shutting down"
                    );
                    break;
                }
            }
        }

        tracing::info!(session_id = %self.context.session_id, "Session runtime stopped");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Click { option } => {
                self.dispatch(Event::OptionClicked { option }, true);
            }
            SessionCommand::Send { text } => {
                self.debouncer.cancel();
                self.submit(text, true);
            }
            SessionCommand::Type { text } => {
                let exact = self
                    .context
                    .graph
                    .as_deref()
                    .is_some_and(|graph| is_exact_label_match(graph, &text));
                if exact {
                    if let Some(text) = self.debouncer.fire_now(text) {
                        self.submit_draft(text);
                    }
                } else {
                    self.debouncer.push(text, Instant::now());
                }
            }
            SessionCommand::Reload => self.load_flow(),
        }
    }

    fn submit(&mut self, text: String, explicit: bool) -> bool {
        let submission_id = self.next_submission_id;
        self.next_submission_id += 1;
        self.dispatch(Event::TextSubmitted { submission_id, text }, explicit)
    }

    /// Submit a debounced draft; only an accepted draft counts as fired
    fn submit_draft(&mut self, text: String) {
        if self.submit(text.clone(), false) {
            self.debouncer.fired(&text);
        }
    }

    /// Process an event, reporting rejections to clients when `notify` is set.
    /// Returns whether the event was accepted.
    fn dispatch(&mut self, event: Event, notify: bool) -> bool {
        let name = event.name();
        match self.process_event(event) {
            Ok(()) => return true,
            Err(TransitionError::StaleOracleReply(submission_id)) => {
                tracing::debug!(
                    session_id = %self.context.session_id,
                    submission_id,
                    "Discarding stale oracle reply"
                );
            }
            Err(e) => {
                tracing::debug!(
                    session_id = %self.context.session_id,
                    event = name,
                    error = %e,
                    "Event rejected"
                );
                if notify {
                    self.broadcast(SessionUpdate::Error {
                        message: e.to_string(),
                    });
                }
            }
        }
        false
    }

    fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        let result = transition(&self.state, &self.context, event)?;

        let old_state = std::mem::replace(&mut self.state, result.new_state);
        for effect in result.effects {
            self.execute_effect(effect);
        }

        if old_state != self.state {
            tracing::debug!(
                session_id = %self.context.session_id,
                from = old_state.name(),
                to = self.state.name(),
                "State changed"
            );
            self.broadcast(SessionUpdate::StateChange { state: self.state });
        }
        Ok(())
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::InstallGraph(graph) => {
                tracing::info!(
                    session_id = %self.context.session_id,
                    steps = graph.len(),
                    "Flow installed"
                );
                self.context.graph = Some(graph);
            }
            Effect::AppendMessage(message) => {
                self.transcript.push(message.clone());
                self.broadcast(SessionUpdate::Message { message });
            }
            Effect::ShowTyping => {
                self.transcript.push(Message::typing());
                self.broadcast(SessionUpdate::Typing { active: true });
            }
            Effect::ClearTyping => {
                if self.transcript.clear_typing() > 0 {
                    self.broadcast(SessionUpdate::Typing { active: false });
                }
            }
            Effect::ClearInput => {
                self.debouncer.input_cleared();
                self.broadcast(SessionUpdate::InputCleared);
            }
            Effect::OpenLink { url } => {
                tracing::info!(
                    session_id = %self.context.session_id,
                    url = %url,
                    "Opening external link"
                );
                self.broadcast(SessionUpdate::OpenLink { url });
            }
            Effect::ConsultOracle {
                submission_id,
                text,
            } => self.consult_oracle(submission_id, text),
            Effect::ScheduleRestart { delay } => {
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    // Fails only if the session is gone
                    let _ = event_tx.send(Event::RestartTimeout).await;
                });
            }
            Effect::RecordMetric { kind, label } => {
                self.record_metric(MetricEvent::new(kind, label));
            }
            Effect::ReportError { message } => {
                tracing::warn!(
                    session_id = %self.context.session_id,
                    error = %message,
                    "Session error"
                );
                self.broadcast(SessionUpdate::Error { message });
            }
        }
    }

    fn consult_oracle(&self, submission_id: u64, text: String) {
        let oracle = Arc::clone(&self.oracle);
        let event_tx = self.event_tx.clone();
        let session_id = self.context.session_id.clone();

        tokio::spawn(async move {
            let event = match oracle.lookup(&text).await {
                Ok(step_id) => Event::OracleReplied {
                    submission_id,
                    step_id,
                },
                Err(e) => {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %e,
                        "Oracle failed, falling back to default"
                    );
                    Event::OracleFailed {
                        submission_id,
                        message: e.to_string(),
                    }
                }
            };
            if event_tx.send(event).await.is_err() {
                tracing::debug!(
                    session_id = %session_id,
                    submission_id,
                    "Session closed before oracle replied"
                );
            }
        });
    }

    fn load_flow(&self) {
        let store = Arc::clone(&self.store);
        let event_tx = self.event_tx.clone();
        let session_id = self.context.session_id.clone();

        tokio::spawn(async move {
            let event = match store.load().await {
                Ok(graph) => Event::FlowLoaded {
                    graph: Arc::new(graph),
                },
                Err(e) => {
                    tracing::error!(session_id = %session_id, error = %e, "Failed to load flow");
                    Event::FlowLoadFailed {
                        message: e.to_string(),
                    }
                }
            };
            let _ = event_tx.send(event).await;
        });
    }

    /// Fire-and-forget: failures are logged, never surfaced
    fn record_metric(&self, event: MetricEvent) {
        let metrics = Arc::clone(&self.metrics);
        tokio::spawn(async move {
            if let Err(e) = metrics.record(&event).await {
                tracing::warn!(label = %event.label, error = %e, "Failed to record metric");
            }
        });
    }

    /// Publish the snapshot covering `update`, then send it.
    /// A subscriber reading the snapshot after subscribing can skip every
    /// update whose sequence number the snapshot already carries.
    fn broadcast(&mut self, update: SessionUpdate) {
        self.seq += 1;
        self.snapshot_tx.send_replace(SessionSnapshot {
            state: self.state,
            messages: self.transcript.messages().to_vec(),
            seq: self.seq,
        });
        // No subscribers is fine
        let _ = self.update_tx.send(SequencedUpdate {
            seq: self.seq,
            update,
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
