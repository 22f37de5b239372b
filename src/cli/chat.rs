use std::io::{self, Write};

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::chat::{Backend, HistoryMode, Session};
use crate::core::{AppConfig, init_tracing};
use crate::gemini::GeminiClient;
use crate::llm::GenerationParams;
use crate::ollama::OllamaClient;
use crate::openai::OpenAiClient;

const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
const OPENAI_SYSTEM_MESSAGE: &str = "You are a helpful assistant.";
const SESSION_RETENTION: usize = 50;

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum Provider {
    /// Local Ollama runner, replies are streamed unless `--no-stream`
    Ollama,
    /// OpenAI compatible chat completions
    Openai,
    /// Google Gemini, only the latest prompt is sent
    Gemini,
}

fn session(
    mut config: AppConfig,
    provider: Provider,
    model: Option<String>,
    params: GenerationParams,
    stream: bool,
) -> Result<Session> {
    let session = match provider {
        Provider::Ollama => {
            let model = model.as_deref().unwrap_or(DEFAULT_OLLAMA_MODEL);
            let client = OllamaClient::from_config(&config, model)?.with_params(params);
            if stream {
                Session::new(Backend::Streaming(Box::new(client)))
            } else {
                Session::new(Backend::Complete(Box::new(client)))
            }
        }
        Provider::Openai => {
            if let Some(model) = model {
                config.openai_model = model;
            }
            let client = OpenAiClient::from_config(&config)?.with_params(params);
            Session::new(Backend::Complete(Box::new(client))).system(OPENAI_SYSTEM_MESSAGE)
        }
        Provider::Gemini => {
            if let Some(model) = model {
                config.gemini_model = model;
            }
            let client = GeminiClient::from_config(&config)?.with_params(params);
            Session::new(Backend::Complete(Box::new(client))).history_mode(HistoryMode::LatestOnly)
        }
    };
    Ok(session.retention(SESSION_RETENTION))
}

/// Prints only the part of the reply that hasn't been shown yet.
struct Printer {
    shown: usize,
}

impl Printer {
    fn update(&mut self, text: &str) {
        if let Some(rest) = text.get(self.shown..) {
            print!("{}", rest);
            let _ = io::stdout().flush();
        }
        self.shown = text.len();
    }
}

pub async fn run(
    provider: Provider,
    model: Option<String>,
    params: GenerationParams,
    stream: bool,
) -> Result<()> {
    init_tracing(&format!("{}=warn", env!("CARGO_CRATE_NAME")));

    let mut session = session(AppConfig::default(), provider, model, params, stream)?;
    let mut rl = DefaultEditor::new()?;
    println!(
        "Chatting with {} ({:?}). /clear resets the conversation, /history shows it, Ctrl-D exits.",
        session.model(),
        provider
    );

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match line {
                    "/clear" => {
                        session.clear();
                        println!("Conversation cleared");
                    }
                    "/history" => {
                        for turn in session.turns() {
                            println!("{}: {}", turn.role.as_str(), turn.text);
                        }
                    }
                    _ => {
                        let mut printer = Printer { shown: 0 };
                        session.submit(line, |text| printer.update(text)).await;
                        println!();
                    }
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
