mod core;
pub use self::core::*;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::AppConfig;
use crate::llm::{
    GenerationParams, GenerationRequest, InitError, Provisioned, TextGenerator, http_client,
};

/// Chat completions against an OpenAI compatible API. The full
/// transcript is sent on every call.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_hostname: String,
    api_key: String,
    model: String,
    params: GenerationParams,
}

impl OpenAiClient {
    pub fn new(
        api_hostname: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Provisioned<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            params: GenerationParams::default(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Provisioned<Self> {
        let api_key = config
            .openai_api_key
            .as_deref()
            .ok_or(InitError::MissingCredential("OPENAI_API_KEY"))?;
        Self::new(
            &config.openai_api_hostname,
            api_key,
            &config.openai_model,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        if let Some(system) = &request.system {
            messages.push(Message::new(Role::System, system));
        }
        messages.extend(request.turns.iter().map(Message::from));

        tracing::debug!("OpenAI request model={} messages={}", self.model, messages.len());
        let resp = completion(
            &self.http,
            &messages,
            &self.params,
            &self.api_hostname,
            &self.api_key,
            &self.model,
        )
        .await?;
        completion_text(&resp)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
