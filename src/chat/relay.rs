//! Multi-user chat relay: per-user history in front of a single
//! text generation client.

use std::time::Duration;

use anyhow::{Result, anyhow};
use thiserror::Error;

use super::models::Turn;
use super::prompt::RelayPrompt;
use super::store::{ConversationStore, StoreStats};
use crate::core::AppConfig;
use crate::llm::{GenerationRequest, InitError, Provisioned, SharedGenerator};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Empty message")]
    EmptyMessage,
    #[error("generation client unavailable: {0}")]
    Unavailable(InitError),
    #[error("{0}")]
    Generation(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReply {
    pub response: String,
    pub message_count: usize,
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

pub struct Relay {
    store: ConversationStore,
    prompt: RelayPrompt,
    generator: Provisioned<SharedGenerator>,
    context_window: usize,
    timeout: Duration,
    model: String,
}

impl Relay {
    pub fn new(config: &AppConfig, generator: Provisioned<SharedGenerator>) -> Result<Self> {
        // Report the configured model even when the client is missing
        let model = match &generator {
            Ok(g) => g.model().to_string(),
            Err(_) => config.gemini_model.clone(),
        };
        Ok(Self {
            store: ConversationStore::new(config.max_users, config.history_limit),
            prompt: RelayPrompt::new(&config.system_instruction)?,
            generator,
            context_window: config.context_window,
            timeout: Duration::from_secs(config.request_timeout_secs),
            model,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_ok()
    }

    pub fn init_error(&self) -> Option<&InitError> {
        self.generator.as_ref().err()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one exchange for `user_id`: validate, build the prompt from
    /// recent history, call the generator and store both turns.
    ///
    /// History is only written once the reply is in, so a failed call
    /// leaves the user's conversation exactly as it was.
    pub async fn submit(
        &self,
        user_id: &str,
        user_name: &str,
        message: &str,
    ) -> Result<RelayReply, RelayError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(RelayError::EmptyMessage);
        }
        let generator = self
            .generator
            .as_ref()
            .map_err(|e| RelayError::Unavailable(e.clone()))?;

        let slot = self.store.get_or_create(user_id);
        let _turn = slot.begin_turn().await;

        let user_turn = Turn::user(message);
        let mut context = slot.snapshot();
        context.push(user_turn.clone());
        let window_start = context.len().saturating_sub(self.context_window);
        let prompt = self
            .prompt
            .render(user_name, &context[window_start..])
            .map_err(RelayError::Generation)?;

        tracing::info!(
            "Sending message to {} for {}: {}",
            self.model,
            user_name,
            preview(message, 50)
        );
        let reply = tokio::time::timeout(
            self.timeout,
            generator.generate(&GenerationRequest::prompt(&prompt)),
        )
        .await
        .map_err(|_| {
            RelayError::Generation(anyhow!(
                "Request to {} timed out after {}s",
                self.model,
                self.timeout.as_secs()
            ))
        })?
        .map_err(RelayError::Generation)?;
        tracing::info!("Received reply for {}: {}", user_name, preview(&reply, 50));

        let message_count = slot.commit([user_turn, Turn::assistant(&reply)]);
        Ok(RelayReply {
            response: reply,
            message_count,
        })
    }

    pub fn clear(&self, user_id: &str) -> bool {
        let cleared = self.store.clear(user_id);
        if cleared {
            tracing::info!("Cleared history for user {}", user_id);
        }
        cleared
    }

    pub fn history(&self, user_id: &str) -> Vec<Turn> {
        self.store.history(user_id)
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }
}
