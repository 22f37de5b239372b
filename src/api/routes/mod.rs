//! API routes module

pub mod classify;
pub mod health;
pub mod relay;

use axum::Router;

use crate::api::state::SharedState;

/// Create the combined router. The relay needs the state up front to
/// check credentials before its handlers run.
pub fn router(state: SharedState) -> Router<SharedState> {
    let max_upload_bytes = state
        .read()
        .expect("Unable to read share state")
        .config
        .max_upload_bytes;

    Router::new()
        // Upload form and image classification
        .merge(classify::router(max_upload_bytes))
        // Multi-user chat relay
        .merge(relay::router(state))
        // Liveness
        .merge(health::router())
}
