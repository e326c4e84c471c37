//! Model listing endpoint
//!
//! The panel is exposed as a single static model; callers pick it by id
//! exactly as they would a real chat-completion model.

use axum::{extract::State, routing::get, Json, Router};

use crate::types::{ModelEntry, ModelsListResponse};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_models))
}

async fn list_models(State(state): State<AppState>) -> Json<ModelsListResponse> {
    Json(ModelsListResponse {
        object: "list",
        data: vec![ModelEntry {
            id: state.model_name.as_ref().clone(),
            object: "model",
            owned_by: "quorum".to_string(),
        }],
    })
}
