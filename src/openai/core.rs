use anyhow::{Error, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::chat::models::{self, Turn};
use crate::llm::GenerationParams;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

impl From<models::Role> for Role {
    fn from(role: models::Role) -> Self {
        match role {
            models::Role::User => Role::User,
            models::Role::Assistant => Role::Assistant,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: Some(content.to_string()),
        }
    }
}

impl From<&Turn> for Message {
    fn from(turn: &Turn) -> Self {
        Message::new(turn.role.into(), &turn.text)
    }
}

/// Build the chat completions payload. Sampling parameters are only
/// included when set and `top_k` is never sent.
pub fn completion_payload(messages: &[Message], model: &str, params: &GenerationParams) -> Value {
    let mut payload = json!({
        "model": model,
        "messages": messages,
    });
    if let Some(temperature) = params.temperature {
        payload["temperature"] = json!(temperature);
    }
    if let Some(top_p) = params.top_p {
        payload["top_p"] = json!(top_p);
    }
    if let Some(max_tokens) = params.max_tokens {
        payload["max_tokens"] = json!(max_tokens);
    }
    payload
}

pub async fn completion(
    http: &reqwest::Client,
    messages: &[Message],
    params: &GenerationParams,
    api_hostname: &str,
    api_key: &str,
    model: &str,
) -> Result<Value, Error> {
    let payload = completion_payload(messages, model, params);
    let url = format!("{}/v1/chat/completions", api_hostname.trim_end_matches("/"));
    let response = http
        .post(url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .json(&payload)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|b| b["error"]["message"].as_str().map(|m| m.to_string()))
            .unwrap_or(text);
        bail!("OpenAI API error {}: {}", status, message);
    }

    Ok(serde_json::from_str(&text)?)
}

/// Pull the assistant text out of a chat completion response.
pub fn completion_text(resp: &Value) -> Result<String, Error> {
    resp["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or(anyhow!("No message received. Resp:\n\n {}", resp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), r#""system""#);
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            r#""assistant""#
        );
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
    }

    #[test]
    fn test_role_deserialization() {
        let json = r#""system""#;
        assert_eq!(serde_json::from_str::<Role>(json).unwrap(), Role::System);

        let json = r#""assistant""#;
        assert_eq!(serde_json::from_str::<Role>(json).unwrap(), Role::Assistant);

        let json = r#""user""#;
        assert_eq!(serde_json::from_str::<Role>(json).unwrap(), Role::User);
    }

    #[test]
    fn test_message_new() {
        let msg = Message::new(Role::User, "Hello world");
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"role":"user","content":"Hello world"}"#
        );

        let msg = Message::new(Role::Assistant, "I can help!");
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"role":"assistant","content":"I can help!"}"#
        );
    }

    #[test]
    fn test_message_from_turn() {
        let msg = Message::from(&Turn::assistant("hi"));
        assert_eq!(msg, Message::new(Role::Assistant, "hi"));
    }

    #[test]
    fn test_completion_payload_skips_unset_params() {
        let messages = vec![Message::new(Role::User, "hi")];
        let payload = completion_payload(&messages, "gpt-4o-mini", &GenerationParams::default());
        assert_eq!(
            payload,
            json!({"model": "gpt-4o-mini", "messages": [{"role": "user", "content": "hi"}]})
        );

        let params = GenerationParams {
            temperature: Some(0.5),
            top_p: Some(0.75),
            top_k: Some(40),
            max_tokens: Some(128),
        };
        let payload = completion_payload(&messages, "gpt-4o-mini", &params);
        assert_eq!(payload["temperature"], json!(0.5));
        assert_eq!(payload["top_p"], json!(0.75));
        assert_eq!(payload["max_tokens"], json!(128));
        assert!(payload.get("top_k").is_none());
    }

    #[test]
    fn test_completion_text() {
        let resp = json!({"choices": [{"message": {"role": "assistant", "content": "Hello!"}}]});
        assert_eq!(completion_text(&resp).unwrap(), "Hello!");
        assert!(completion_text(&json!({"choices": []})).is_err());
    }
}
