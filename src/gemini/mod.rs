//! Client for the Gemini `generateContent` API.

use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chat::models::{Role, Turn};
use crate::core::AppConfig;
use crate::llm::{
    GenerationParams, GenerationRequest, InitError, Provisioned, TextGenerator, http_client,
};

#[derive(Serialize, Debug)]
struct Part {
    text: String,
}

#[derive(Serialize, Debug)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize, Debug)]
struct ApiErrorDetail {
    message: String,
}

fn role_name(role: Role) -> &'static str {
    // Gemini calls the assistant "model"
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

fn to_contents(turns: &[Turn]) -> Vec<Content> {
    turns
        .iter()
        .map(|t| Content {
            role: Some(role_name(t.role)),
            parts: vec![Part {
                text: t.text.clone(),
            }],
        })
        .collect()
}

fn generation_config(params: &GenerationParams) -> Option<GenerationConfig> {
    if *params == GenerationParams::default() {
        return None;
    }
    Some(GenerationConfig {
        temperature: params.temperature,
        top_p: params.top_p,
        top_k: params.top_k,
        max_output_tokens: params.max_tokens,
    })
}

fn extract_text(resp: GenerateContentResponse) -> Result<String> {
    if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
        bail!("Gemini blocked the prompt: {}", reason);
    }
    let candidate = resp
        .candidates
        .into_iter()
        .next()
        .ok_or(anyhow!("Gemini returned no candidates"))?;
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.is_empty() {
        bail!(
            "Gemini returned no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        );
    }
    Ok(text)
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_hostname: String,
    api_key: String,
    model: String,
    params: GenerationParams,
}

impl GeminiClient {
    pub fn new(
        api_hostname: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Provisioned<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            api_hostname: api_hostname.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            params: GenerationParams::default(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Provisioned<Self> {
        let api_key = config
            .gemini_api_key
            .as_deref()
            .ok_or(InitError::MissingCredential("GEMINI_API_KEY"))?;
        Self::new(
            &config.gemini_api_hostname,
            api_key,
            &config.gemini_model,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let payload = GenerateContentRequest {
            contents: to_contents(&request.turns),
            system_instruction: request.system.as_ref().map(|s| Content {
                role: None,
                parts: vec![Part { text: s.clone() }],
            }),
            generation_config: generation_config(&self.params),
        };
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_hostname, self.model
        );
        tracing::debug!("Gemini request model={} turns={}", self.model, request.turns.len());

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            bail!("Gemini API error {}: {}", status, message);
        }

        let body: GenerateContentResponse = response.json().await?;
        extract_text(body)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
