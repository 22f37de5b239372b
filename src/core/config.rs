use std::env;
use std::str::FromStr;

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = r"You are a versatile virtual assistant.
You help {{user_name}} with academic, professional or personal questions, as well as any useful information in different domains.
Answer in a clear, professional and friendly way, adapting to the user's language and context.";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_api_hostname: String,
    pub gemini_model: String,
    pub openai_api_key: Option<String>,
    pub openai_api_hostname: String,
    pub openai_model: String,
    pub ollama_host: String,
    // Handlebars template, `user_name` is the only variable
    pub system_instruction: String,
    pub history_limit: usize,
    pub context_window: usize,
    pub max_users: usize,
    pub relay_api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub classifier_model_path: String,
    pub classifier_classes: Vec<String>,
    pub classifier_input_size: u32,
    pub max_upload_bytes: usize,
}

/// Read an optional secret. Empty values count as missing so that a
/// blank line in `.env` doesn't look like a configured key.
fn secret(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    parse_or(key, env::var(key).ok(), default)
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(v) => v.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value for {}: {}", key, v);
            default
        }),
        None => default,
    }
}

pub fn parse_classes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        let gemini_api_hostname = env::var("GEMINI_API_HOSTNAME")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string());
        let gemini_model = env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string());
        let openai_api_hostname = env::var("OPENAI_API_HOSTNAME")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let openai_model = env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let ollama_host =
            env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost:11434".to_string());
        let system_instruction = env::var("RELAY_SYSTEM_INSTRUCTION")
            .unwrap_or_else(|_| DEFAULT_SYSTEM_INSTRUCTION.to_string());
        let classifier_model_path =
            env::var("CLASSIFIER_MODEL_PATH").unwrap_or_else(|_| "fruits_cnn.onnx".to_string());
        let classifier_classes = parse_classes(
            &env::var("CLASSIFIER_CLASSES").unwrap_or_else(|_| "apple,banana,orange".to_string()),
        );

        Self {
            gemini_api_key: secret("GEMINI_API_KEY"),
            gemini_api_hostname,
            gemini_model,
            openai_api_key: secret("OPENAI_API_KEY"),
            openai_api_hostname,
            openai_model,
            ollama_host,
            system_instruction,
            history_limit: parsed_or("RELAY_HISTORY_LIMIT", 20),
            context_window: parsed_or("RELAY_CONTEXT_WINDOW", 10),
            max_users: parsed_or("RELAY_MAX_USERS", 10_000),
            relay_api_key: secret("RELAY_API_KEY"),
            request_timeout_secs: parsed_or("REQUEST_TIMEOUT_SECS", 60),
            classifier_model_path,
            classifier_classes,
            classifier_input_size: parsed_or("CLASSIFIER_INPUT_SIZE", 32),
            max_upload_bytes: parsed_or("MAX_UPLOAD_BYTES", 2 * 1024 * 1024),
        }
    }
}
