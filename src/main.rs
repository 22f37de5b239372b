use anyhow::Result;
use modelrelay::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
