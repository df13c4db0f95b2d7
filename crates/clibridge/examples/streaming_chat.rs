//! Streaming Chat Example
//!
//! Streams an answer fragment by fragment from one provider.
//!
//! Run with: cargo run --example streaming_chat -- gemini "Explain ownership in Rust"

use clibridge::{BridgeConfig, ChatClient, FragmentKind};
use clibridge_protocol::ChatTurn;
use futures::StreamExt;
use std::io::Write;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let provider = args.next().unwrap_or_else(|| "codex".to_string());
    let question = args
        .next()
        .unwrap_or_else(|| "Write a haiku about pipes.".to_string());

    let config = BridgeConfig::from_env()?;
    let Some(provider) = config.provider(&provider) else {
        anyhow::bail!("unknown provider '{}'", provider);
    };
    let client = ChatClient::new(&provider.name, &provider.model, &provider.transport)?;
    println!("Streaming from {} ({} mode)\n", client.provider(), client.mode());

    let mut fragments = client.stream_chat(&[ChatTurn::user(question)])?;
    let mut first = true;
    while let Some(fragment) = fragments.next().await {
        let fragment = fragment?;
        if fragment.kind == FragmentKind::WordGroup && !first {
            print!(" ");
        }
        print!("{}", fragment.text);
        std::io::stdout().flush()?;
        first = false;
    }
    println!();

    client.shutdown().await?;
    Ok(())
}
