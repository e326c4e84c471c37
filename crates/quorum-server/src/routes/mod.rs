//! API routes

use axum::Router;

use crate::AppState;

mod chat;
mod models;

/// Build the API router with all endpoints
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/chat/completions", chat::router())
        .nest("/models", models::router())
}
