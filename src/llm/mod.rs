//! Provider agnostic interface to text generation.
//!
//! Each provider module (`gemini`, `openai`, `ollama`) implements
//! these traits over its own wire format. Callers only ever see
//! `Turn`s going in and text coming out.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use thiserror::Error;

use crate::chat::models::Turn;

/// Sampling parameters shared by all providers. `None` leaves the
/// provider's own default in place.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GenerationParams {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub max_tokens: Option<u32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub turns: Vec<Turn>,
}

impl GenerationRequest {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            system: None,
            turns,
        }
    }

    /// A request made of one user turn, which is how the relay sends
    /// its fully composed prompt.
    pub fn prompt(text: &str) -> Self {
        Self::new(vec![Turn::user(text)])
    }

    pub fn with_system(mut self, system: &str) -> Self {
        self.system = Some(system.to_string());
        self
    }
}

/// A finite sequence of text fragments produced by one call.
pub type FragmentStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
    fn model(&self) -> &str;
}

#[async_trait]
pub trait StreamingGenerator: Send + Sync {
    async fn generate_stream(&self, request: &GenerationRequest) -> Result<FragmentStream>;
    fn model(&self) -> &str;
}

pub type SharedGenerator = Arc<dyn TextGenerator>;

/// Why a dependency could not be made ready at startup. The feature
/// stays disabled until the process is restarted with a fixed config.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InitError {
    #[error("missing credential {0}")]
    MissingCredential(&'static str),
    #[error("failed to build client: {0}")]
    Client(String),
    #[error("failed to load model {path}: {reason}")]
    Model { path: String, reason: String },
}

/// The result of initializing a dependency once at startup, checked
/// by every handler before use.
pub type Provisioned<T> = std::result::Result<T, InitError>;

/// Build the HTTP client shared by a provider. The timeout applies to
/// the whole request including reading the body.
pub fn http_client(timeout: std::time::Duration) -> Provisioned<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| InitError::Client(e.to_string()))
}

/// Build a client for long-lived streamed responses. `timeout` bounds
/// connecting and each gap between reads, not the whole body.
pub fn streaming_http_client(timeout: std::time::Duration) -> Provisioned<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build()
        .map_err(|e| InitError::Client(e.to_string()))
}
