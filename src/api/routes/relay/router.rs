//! Router for the multi-user chat relay

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, Request, State, rejection::JsonRejection},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use http::{StatusCode, header};
use subtle::ConstantTimeEq;

use super::public::{
    ChatErrorResponse, ChatRequest, ChatResponse, ClearRequest, ClearResponse, DEFAULT_USER_ID,
    DEFAULT_USER_NAME, HistoryResponse, RelayInfoResponse,
};
use crate::api::public::ErrorResponse;
use crate::api::state::SharedState;
use crate::chat::RelayError;

fn chat_error(status: StatusCode, error: String, response: String) -> Response {
    (
        status,
        Json(ChatErrorResponse {
            error,
            response,
            status: "error",
        }),
    )
        .into_response()
}

/// Send a message on behalf of a user and reply with the model's answer
async fn chat(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            tracing::info!("Rejected chat body: {}", rejection.body_text());
            return chat_error(
                StatusCode::BAD_REQUEST,
                rejection.body_text(),
                "Please enter a message.".to_string(),
            );
        }
    };
    let relay = state.read().expect("Unable to read share state").relay.clone();
    let user_id = payload.user_id.as_deref().unwrap_or(DEFAULT_USER_ID);
    let user_name = payload.user_name.as_deref().unwrap_or(DEFAULT_USER_NAME);

    match relay.submit(user_id, user_name, &payload.message).await {
        Ok(reply) => Json(ChatResponse {
            response: reply.response,
            status: "success",
            message_count: reply.message_count,
        })
        .into_response(),
        Err(RelayError::EmptyMessage) => chat_error(
            StatusCode::BAD_REQUEST,
            "Empty message".to_string(),
            "Please enter a message.".to_string(),
        ),
        Err(RelayError::Unavailable(e)) => {
            tracing::warn!("Rejected chat for {}: {}", user_id, e);
            chat_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "Gemini API key not found. Cannot send messages.".to_string(),
                "Server configuration error. Contact the administrator.".to_string(),
            )
        }
        Err(RelayError::Generation(e)) => {
            tracing::error!("Chat for {} failed: {}", user_id, e);
            chat_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                format!("Sorry, an error occurred: {}", e),
            )
        }
    }
}

/// Forget everything a user has said
async fn clear(
    State(state): State<SharedState>,
    payload: Result<Option<Json<ClearRequest>>, JsonRejection>,
) -> Response {
    let user_id = match payload {
        Ok(payload) => payload.and_then(|Json(p)| p.user_id),
        Err(rejection) => {
            tracing::info!("Rejected clear body: {}", rejection.body_text());
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(rejection.body_text())),
            )
                .into_response();
        }
    };
    let relay = state.read().expect("Unable to read share state").relay.clone();
    relay.clear(user_id.as_deref().unwrap_or(DEFAULT_USER_ID));

    Json(ClearResponse {
        status: "success",
        message: "Conversation cleared",
    })
    .into_response()
}

/// Get the stored turns for a user, oldest first
async fn history(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Json<HistoryResponse> {
    let relay = state.read().expect("Unable to read share state").relay.clone();
    let messages = relay.history(&user_id);

    Json(HistoryResponse {
        status: "success",
        count: messages.len(),
        user_id,
        messages,
    })
}

/// Describe the relay and whether it can take messages
async fn info(State(state): State<SharedState>) -> Json<RelayInfoResponse> {
    let relay = state.read().expect("Unable to read share state").relay.clone();
    let endpoints = BTreeMap::from([
        ("POST /chat", "Send a message to the assistant"),
        ("POST /clear", "Clear a user's conversation"),
        ("GET /history/{user_id}", "Get a user's conversation"),
        ("GET /health", "Check the server status"),
    ]);

    Json(RelayInfoResponse {
        message: "Gemini chat relay",
        version: env!("CARGO_PKG_VERSION"),
        status: if relay.is_configured() {
            "online"
        } else {
            "api_key_missing"
        },
        model: relay.model().to_string(),
        endpoints,
    })
}

/// Constant-time token comparison
fn token_matches(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Reject requests without the configured bearer token. Without a
/// configured key every request passes.
async fn require_api_key(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let expected = state
        .read()
        .expect("Unable to read share state")
        .config
        .relay_api_key
        .clone();
    let Some(expected) = expected else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if provided.is_some_and(|token| token_matches(token, &expected)) {
        return next.run(request).await;
    }

    tracing::warn!("Unauthorized request to {}", request.uri().path());
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("Unauthorized")),
    )
        .into_response()
}

/// Create the relay router
pub fn router(state: SharedState) -> Router<SharedState> {
    let protected = Router::new()
        .route("/chat", post(chat))
        .route("/clear", post(clear))
        .route("/history/{user_id}", get(history))
        .route_layer(middleware::from_fn_with_state(state, require_api_key));

    Router::new().route("/relay", get(info)).merge(protected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_matches() {
        assert!(token_matches("secret", "secret"));
        assert!(!token_matches("secreT", "secret"));
        assert!(!token_matches("secret-longer", "secret"));
        assert!(!token_matches("", "secret"));
    }
}
