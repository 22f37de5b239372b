//! Public types for the health API
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub gemini_configured: bool,
    pub active_users: usize,
    pub total_messages: usize,
    pub model: String,
    pub classifier_loaded: bool,
}
