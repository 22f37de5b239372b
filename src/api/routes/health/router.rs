//! Router for the health API

use axum::{Json, Router, extract::State, routing::get};

use super::public::HealthResponse;
use crate::api::state::SharedState;

/// Report readiness of each feature along with relay usage
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let (relay, vision) = {
        let shared_state = state.read().expect("Unable to read share state");
        (shared_state.relay.clone(), shared_state.vision.clone())
    };
    let stats = relay.stats();

    Json(HealthResponse {
        status: "online",
        gemini_configured: relay.is_configured(),
        active_users: stats.active_users,
        total_messages: stats.total_messages,
        model: relay.model().to_string(),
        classifier_loaded: vision.is_loaded(),
    })
}

/// Create the health router
pub fn router() -> Router<SharedState> {
    Router::new().route("/health", get(health))
}
