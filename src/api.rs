//! HTTP API for the chat widget and its admin surface

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::backend::Collaborators;
use crate::dialogue::SessionConfig;
use crate::runtime::SessionManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(collaborators: Collaborators, config: SessionConfig) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(collaborators, config)),
        }
    }
}
