//! Runtime for executing chat sessions
//!
//! Each session runs on its own task. Clients drive it through commands and
//! observe it through a broadcast of updates plus a snapshot of the transcript.

mod debounce;
mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::backend::Collaborators;
use crate::dialogue::{Message, SessionConfig, SessionContext, SessionState};
use crate::flow::ChatOption;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, RwLock};

/// Type alias for production runtime with shared collaborators
pub type ProductionRuntime =
    SessionRuntime<Arc<dyn FlowStore>, Arc<dyn StepOracle>, Arc<dyn MetricsSink>>;

/// Client input to a session
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Click { option: ChatOption },
    /// Explicit send (enter key or send button)
    Send { text: String },
    /// Current contents of the input box
    Type { text: String },
    /// Fetch the flow again
    Reload,
}

/// Events sent to SSE clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionUpdate {
    Message { message: Message },
    Typing { active: bool },
    InputCleared,
    OpenLink { url: String },
    StateChange { state: SessionState },
    Error { message: String },
}

/// An update stamped with its place in the session's update order
#[derive(Debug, Clone)]
pub struct SequencedUpdate {
    pub seq: u64,
    pub update: SessionUpdate,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub messages: Vec<Message>,
    /// Sequence number of the last update this snapshot reflects
    pub seq: u64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Session closed: {0}")]
    Closed(String),
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub command_tx: mpsc::Sender<SessionCommand>,
    pub update_tx: broadcast::Sender<SequencedUpdate>,
    pub snapshot_rx: watch::Receiver<SessionSnapshot>,
}

/// Manager for all session runtimes
pub struct SessionManager {
    collaborators: Collaborators,
    config: SessionConfig,
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionManager {
    pub fn new(collaborators: Collaborators, config: SessionConfig) -> Self {
        Self {
            collaborators,
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Start a new session and return its id.
    /// The session is dropped from the map when its runtime stops.
    pub async fn create(&self) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        let context = SessionContext::new(&session_id, self.config.clone());

        let (command_tx, command_rx) = mpsc::channel(32);
        let (update_tx, _) = broadcast::channel(128);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let runtime: ProductionRuntime = SessionRuntime::new(
            context,
            Arc::clone(&self.collaborators.store),
            Arc::clone(&self.collaborators.oracle),
            Arc::clone(&self.collaborators.metrics),
            command_rx,
            update_tx.clone(),
            snapshot_tx,
        );

        self.sessions.write().await.insert(
            session_id.clone(),
            SessionHandle {
                command_tx,
                update_tx,
                snapshot_rx,
            },
        );

        let sessions = Arc::clone(&self.sessions);
        let id = session_id.clone();
        tokio::spawn(async move {
            runtime.run().await;
            if sessions.write().await.remove(&id).is_some() {
                tracing::info!(session_id = %id, "Session evicted");
            }
        });

        tracing::info!(session_id = %session_id, "Session created");
        session_id
    }

    async fn handle(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Send a command to a session
    pub async fn send(
        &self,
        session_id: &str,
        command: SessionCommand,
    ) -> Result<(), SessionError> {
        let handle = self.handle(session_id).await?;
        handle
            .command_tx
            .send(command)
            .await
            .map_err(|_| SessionError::Closed(session_id.to_string()))
    }

    /// Subscribe to session updates together with the state they apply to.
    /// Updates with a sequence number up to the snapshot's are already in it.
    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<(SessionSnapshot, broadcast::Receiver<SequencedUpdate>), SessionError> {
        let handle = self.handle(session_id).await?;
        // Every update sent after this point is received; earlier ones
        // are covered by the snapshot read below
        let rx = handle.update_tx.subscribe();
        let snapshot = handle.snapshot_rx.borrow().clone();
        Ok((snapshot, rx))
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot, SessionError> {
        let handle = self.handle(session_id).await?;
        let snapshot = handle.snapshot_rx.borrow().clone();
        Ok(snapshot)
    }

    /// Tear down a session. Outstanding oracle replies are discarded.
    pub async fn close(&self, session_id: &str) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .remove(session_id)
            .map(|_| tracing::info!(session_id = %session_id, "Session closed"))
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }
}
