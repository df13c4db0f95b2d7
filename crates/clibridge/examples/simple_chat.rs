//! Simple Chat Example
//!
//! Sends one question to the default provider and prints the answer.
//! Providers are configured from `CODEX_*` / `GEMINI_*` variables.
//!
//! Run with: cargo run --example simple_chat -- "What is 2 + 2?"

use clibridge::{BridgeConfig, BridgeFacade, Completion};
use clibridge_protocol::{ChatTurn, CompletionRequest};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let question = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "What is 2 + 2? Respond with just the answer.".to_string());

    let config = BridgeConfig::from_env()?;
    let facade = BridgeFacade::new(&config)?;

    println!("Asking {}...", config.default_provider);
    let request = CompletionRequest::new(vec![ChatTurn::user(question)]);
    match facade.complete(None, request).await {
        Ok(Completion::Aggregated(completion)) => {
            println!("\n{}", completion.content().unwrap_or_default());
        }
        Ok(Completion::Stream(_)) => unreachable!("streaming was not requested"),
        Err(e) => eprintln!("Request failed ({}): {}", e.status_code(), e),
    }

    facade.shutdown().await?;
    Ok(())
}
