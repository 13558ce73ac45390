//! Basic usage example (blocking and streaming generation)
//!
//! This example demonstrates the full client surface against a locally
//! hosted model runner: background warm-up, model listing, cached blocking
//! generation and incremental streaming.
//!
//! The server location is configured via environment variables:
//! - GENGUARD_BASE_URL (defaults to http://localhost:11434)
//! - GENGUARD_MODEL (defaults to llama3)
//!
//! Usage:
//!   GENGUARD_BASE_URL=http://localhost:11434 cargo run --example basic_usage

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use genguard::{GenClient, GenerationRequest};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let base_url =
        std::env::var("GENGUARD_BASE_URL").unwrap_or_else(|_| "http://localhost:11434".into());
    let model = std::env::var("GENGUARD_MODEL").unwrap_or_else(|_| "llama3".into());

    let client = Arc::new(
        GenClient::builder()
            .base_url(&base_url)
            .default_model(&model)
            .timeout(Duration::from_secs(120))
            .build()?,
    );

    // Load model weights in the background while we look around.
    let warmup = client.spawn_warmup();

    match client.list_models().await {
        Ok(models) => println!("Models installed on {base_url}: {models:?}"),
        Err(err) => eprintln!("Warning: could not list models ({err}); is the server running?"),
    }

    warmup.await?;

    // Blocking generation; the identical follow-up call answers from cache.
    let request = GenerationRequest::new("Name three uses for a circuit breaker in software.")
        .system_prompt("You are a concise assistant.")
        .temperature(0.2);

    let response = client.generate(request.clone()).await?;
    println!("\nResponse:\n{}", response.text);

    let cached = client.generate(request).await?;
    assert_eq!(cached.text, response.text);
    println!("\n(second call served from cache)");

    // Streaming generation, printed fragment by fragment.
    println!("\nStreamed:");
    let mut stream = client
        .generate_stream(GenerationRequest::new("Count from one to five, words only."))
        .await?;
    while let Some(fragment) = stream.next().await {
        print!("{}", fragment?);
        std::io::stdout().flush()?;
    }
    println!();

    let signals = client.signals();
    println!(
        "\nSignals: breaker={:?}, cache hits={} misses={} entries={}",
        signals.breaker.state, signals.cache.hits, signals.cache.misses, signals.cache.entries
    );

    Ok(())
}
