//! Chatflow - scripted chat widget server
//!
//! Serves guided conversations over a tree of steps, with free-text
//! matching and an optional remote oracle for input the tree cannot place.

mod api;
mod backend;
mod dialogue;
mod flow;
mod metrics;
mod runtime;

use api::{create_router, AppState};
use backend::{BackendConfig, Collaborators};
use dialogue::SessionConfig;
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatflow=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let port: u16 = std::env::var("CHATFLOW_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let backend_config = BackendConfig::from_env();
    let collaborators = Collaborators::from_config(&backend_config)?;
    let session_config = SessionConfig::from_env();
    tracing::info!(
        restart_delay_ms = %session_config.restart_delay.as_millis(),
        debounce_ms = %session_config.debounce_window.as_millis(),
        idle_timeout_secs = session_config.idle_timeout.as_secs(),
        "Session settings loaded"
    );

    let state = AppState::new(collaborators, session_config);

    // The widget is embedded on third-party pages
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Chatflow server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
