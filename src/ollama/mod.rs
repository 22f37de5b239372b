//! Client for a local Ollama runner using the `/api/chat` endpoint.
//!
//! Streaming responses are newline delimited JSON objects, one per
//! fragment, ending with an object where `done` is true.

use std::time::Duration;

use anyhow::{Error, Result, anyhow, bail};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::chat::models::Turn;
use crate::core::AppConfig;
use crate::llm::{
    FragmentStream, GenerationParams, GenerationRequest, Provisioned, StreamingGenerator,
    TextGenerator, streaming_http_client,
};

#[derive(Serialize, Debug)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize, Debug, Default, PartialEq)]
struct Options {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Serialize, Debug)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<Options>,
}

#[derive(Deserialize, Debug)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize, Debug)]
struct ChatChunk {
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

fn to_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    let system = request.system.iter().map(|s| ChatMessage {
        role: "system",
        content: s.clone(),
    });
    let turns = request.turns.iter().map(|t: &Turn| ChatMessage {
        role: t.role.as_str(),
        content: t.text.clone(),
    });
    system.chain(turns).collect()
}

fn to_options(params: &GenerationParams) -> Option<Options> {
    let options = Options {
        temperature: params.temperature,
        top_k: params.top_k,
        top_p: params.top_p,
        num_predict: params.max_tokens,
    };
    (options != Options::default()).then_some(options)
}

/// Parse one NDJSON line into the text fragment it carries and
/// whether the stream is finished.
fn parse_chunk(line: &str) -> Result<(String, bool), Error> {
    let chunk: ChatChunk = serde_json::from_str(line)
        .map_err(|e| anyhow!("Invalid chunk from Ollama: {}\nError: {}", line, e))?;
    if let Some(err) = chunk.error {
        bail!("Ollama error: {}", err);
    }
    let text = chunk.message.map(|m| m.content).unwrap_or_default();
    Ok((text, chunk.done))
}

pub struct OllamaClient {
    http: reqwest::Client,
    host: String,
    model: String,
    params: GenerationParams,
}

impl OllamaClient {
    pub fn new(host: &str, model: &str, timeout: Duration) -> Provisioned<Self> {
        Ok(Self {
            http: streaming_http_client(timeout)?,
            host: host.trim_end_matches('/').to_string(),
            model: model.to_string(),
            params: GenerationParams::default(),
        })
    }

    pub fn from_config(config: &AppConfig, model: &str) -> Provisioned<Self> {
        Self::new(
            &config.ollama_host,
            model,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    fn payload(&self, request: &GenerationRequest, stream: bool) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: to_messages(request),
            stream,
            options: to_options(&self.params),
        }
    }

    async fn send(&self, payload: &ChatRequest) -> Result<reqwest::Response> {
        let url = format!("{}/api/chat", self.host);
        let response = self.http.post(url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Ollama API error {}: {}", status, body);
        }
        Ok(response)
    }
}

#[async_trait]
impl StreamingGenerator for OllamaClient {
    async fn generate_stream(&self, request: &GenerationRequest) -> Result<FragmentStream> {
        let payload = self.payload(request, true);
        tracing::debug!("Ollama stream model={} messages={}", self.model, payload.messages.len());
        let response = self.send(&payload).await?;
        let mut bytes = response.bytes_stream();

        Ok(Box::pin(try_stream! {
            // Lines (and multi-byte characters) can be split across
            // network chunks so only complete lines are decoded
            let mut buffer: Vec<u8> = Vec::new();
            'outer: while let Some(chunk) = bytes.next().await {
                buffer.extend_from_slice(&chunk?);

                while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=line_end).collect();
                    let line = std::str::from_utf8(&line)?.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let (text, done) = parse_chunk(line)?;
                    if !text.is_empty() {
                        yield text;
                    }
                    if done {
                        break 'outer;
                    }
                }
            }

            // The final object may arrive without a trailing newline
            let rest = std::str::from_utf8(&buffer)?.trim();
            if !rest.is_empty() {
                let (text, _) = parse_chunk(rest)?;
                if !text.is_empty() {
                    yield text;
                }
            }
        }))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let payload = self.payload(request, false);
        let body = self.send(&payload).await?.text().await?;
        let (text, _) = parse_chunk(&body)?;
        Ok(text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
