//! Public types for the chat relay API
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chat::Turn;

pub const DEFAULT_USER_ID: &str = "anonymous";
pub const DEFAULT_USER_NAME: &str = "User";

#[derive(Debug, Deserialize, Serialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub status: &'static str,
    pub message_count: usize,
}

/// Failed chat submission. `response` is meant to be shown to the
/// end user as is, `error` is the technical reason.
#[derive(Debug, Serialize)]
pub struct ChatErrorResponse {
    pub error: String,
    pub response: String,
    pub status: &'static str,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ClearRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub status: &'static str,
    pub user_id: String,
    pub messages: Vec<Turn>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct RelayInfoResponse {
    pub message: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub model: String,
    pub endpoints: BTreeMap<&'static str, &'static str>,
}
