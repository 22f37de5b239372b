use std::sync::{Arc, RwLock};

use anyhow::Result;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::routes;
use crate::api::state::{AppState, SharedState};
use crate::chat::Relay;
use crate::core::AppConfig;
use crate::gemini::GeminiClient;
use crate::llm::SharedGenerator;
use crate::vision::Vision;

pub fn app(shared_state: SharedState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .merge(routes::router(Arc::clone(&shared_state)))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

/// Default log filter for the server. Install it before reading the
/// config so that config warnings are visible.
pub fn log_filter() -> String {
    // axum logs rejections from built-in extractors with the `axum::rejection`
    // target, at `TRACE` level. `axum::rejection=trace` enables showing those events
    format!(
        "{}=debug,tower_http=debug,axum::rejection=trace",
        env!("CARGO_CRATE_NAME")
    )
}

// Run the server
pub async fn serve(host: String, port: String, config: AppConfig) -> Result<()> {
    // Each dependency is initialized once. Failures are logged and
    // leave the feature disabled, the server still starts.
    let generator = GeminiClient::from_config(&config).map(|c| Arc::new(c) as SharedGenerator);
    match &generator {
        Ok(_) => tracing::info!("Gemini client ready for model {}", config.gemini_model),
        Err(e) => tracing::error!("Chat relay disabled: {}", e),
    }
    let relay = Relay::new(&config, generator)?;
    let vision = Vision::from_config(&config);

    let app_state = AppState::new(config, relay, vision)?;
    let app = app(Arc::new(RwLock::new(app_state)));

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    tracing::debug!("Server started. Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
