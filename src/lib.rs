pub mod api;
pub mod chat;
pub mod cli;
pub mod core;
pub mod gemini;
pub mod llm;
pub mod ollama;
pub mod openai;
pub mod vision;
