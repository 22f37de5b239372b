use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;

pub mod chat;
pub mod convert;
pub mod serve;

use chat::Provider;

use crate::llm::GenerationParams;

#[derive(Subcommand)]
enum Command {
    /// Run the API server (image classifier and chat relay)
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "8000")]
        port: String,
    },
    /// Start an interactive chat session in the terminal
    Chat {
        #[arg(long, value_enum, default_value_t = Provider::Ollama)]
        provider: Provider,

        /// Model name, defaults to the provider's configured model
        #[arg(long)]
        model: Option<String>,

        #[arg(long, default_value_t = 0.7)]
        temperature: f32,

        #[arg(long, default_value_t = 0.9)]
        top_p: f32,

        #[arg(long, default_value_t = 40)]
        top_k: u32,

        /// Maximum number of tokens in each reply
        #[arg(long, default_value_t = 512)]
        max_tokens: u32,

        /// Wait for the whole Ollama reply instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },
    /// Convert an ONNX image classifier to an NNEF archive
    Convert {
        #[arg(long, default_value = "fruits_cnn.onnx")]
        input: PathBuf,

        #[arg(long, default_value = "fruits_cnn.nnef.tar")]
        output: PathBuf,

        /// Width and height of the model's square input
        #[arg(long, default_value_t = 32)]
        input_size: u32,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    // Settings can live in a local .env file
    dotenv().ok();

    // Handle each sub command
    match args.command {
        Some(Command::Serve { host, port }) => {
            serve::run(host, port).await?;
        }
        Some(Command::Chat {
            provider,
            model,
            temperature,
            top_p,
            top_k,
            max_tokens,
            no_stream,
        }) => {
            let params = GenerationParams {
                temperature: Some(temperature),
                top_p: Some(top_p),
                top_k: Some(top_k),
                max_tokens: Some(max_tokens),
            };
            chat::run(provider, model, params, !no_stream).await?;
        }
        Some(Command::Convert {
            input,
            output,
            input_size,
        }) => {
            convert::run(&input, &output, input_size)?;
        }
        None => {}
    }

    Ok(())
}
