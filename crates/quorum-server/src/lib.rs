//! Quorum Server
//!
//! OpenAI-compatible HTTP gateway in front of the agent panel. This is a
//! library crate — the server is started via `start_server()`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{http::Method, routing::get, Json, Router};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use quorum_core::agents::{AgentCatalog, AgentDirectory};
use quorum_core::ai::client::{AiClient, AiClientConfig};
use quorum_core::ai::CompletionBackend;
use quorum_core::constants;
use quorum_core::rounds::RoundRunner;
use quorum_core::scheduler::Manager;
use quorum_core::task::{TaskResolver, TaskStore};

pub mod error;
pub mod routes;
pub mod streamer;
pub mod types;

/// Model id advertised on the wire.
const DEFAULT_PANEL_MODEL_ID: &str = "quorum-panel";

/// Configuration for starting the server.
pub struct ServerConfig {
    /// Port to listen on (default: 3000).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TaskStore>,
    pub resolver: Arc<TaskResolver>,
    /// None when no credentials are configured; chat requests are rejected
    /// until they are.
    pub runner: Option<Arc<RoundRunner>>,
    /// Model id advertised by /v1/models and stamped on every chunk.
    pub model_name: Arc<String>,
}

/// Build the round runner from configured credentials and env overrides.
fn create_runner() -> Option<Arc<RoundRunner>> {
    let api_key = match std::env::var("QUORUM_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY"))
    {
        Ok(key) => key,
        Err(_) => {
            tracing::warn!(
                "No credentials found; chat API will be unavailable until QUORUM_API_KEY or OPENAI_API_KEY is set"
            );
            return None;
        }
    };

    let base_url = std::env::var("QUORUM_BASE_URL")
        .unwrap_or_else(|_| constants::ai::DEFAULT_BASE_URL.to_string());
    let agent_model =
        std::env::var("QUORUM_MODEL").unwrap_or_else(|_| constants::ai::DEFAULT_MODEL.to_string());
    let manager_model = std::env::var("QUORUM_MANAGER_MODEL")
        .unwrap_or_else(|_| constants::ai::DEFAULT_MANAGER_MODEL.to_string());

    let agent_backend: Arc<dyn CompletionBackend> = Arc::new(AiClient::new(
        AiClientConfig {
            model: agent_model,
            base_url: base_url.clone(),
            ..Default::default()
        },
        api_key.clone(),
    ));
    let manager_backend: Arc<dyn CompletionBackend> = Arc::new(AiClient::new(
        AiClientConfig {
            model: manager_model,
            base_url,
            ..Default::default()
        },
        api_key,
    ));

    let catalog = Arc::new(AgentCatalog::builtin());
    let manager = Manager::new(manager_backend, catalog.names());
    let directory = AgentDirectory::new(catalog, agent_backend);

    Some(Arc::new(RoundRunner::new(manager, directory)))
}

/// Build the Axum router and shared state.
pub fn build_router() -> (Router, AppState) {
    let store = Arc::new(TaskStore::new());
    let resolver = Arc::new(TaskResolver::new(store.clone()));
    let runner = create_runner();
    let model_name = Arc::new(
        std::env::var("QUORUM_MODEL_ID").unwrap_or_else(|_| DEFAULT_PANEL_MODEL_ID.to_string()),
    );

    let state = AppState {
        store,
        resolver,
        runner,
        model_name,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .nest("/v1", routes::api_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    (app, state)
}

/// Start the Quorum server and block until shutdown.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let (app, _state) = build_router();

    tracing::info!("Quorum server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        features: HashMap::from([("chat".to_string(), true), ("models".to_string(), true)]),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    features: HashMap<String, bool>,
}
