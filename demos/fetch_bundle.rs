//! Fetching translation bundles from a live endpoint.
//!
//! Usage: `cargo run --example fetch_bundle -- <base-url> [language] [namespace...]`

use lexifetch::prelude::*;
use lexifetch::telemetry::shared;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let mut args = std::env::args().skip(1);
    let base_url = args.next().unwrap_or_else(|| "http://localhost:8080/api".to_string());
    let language = args.next().unwrap_or_else(|| "en".to_string());
    let mut namespaces: Vec<String> = args.collect();
    if namespaces.is_empty() {
        namespaces.push("common".to_string());
    }

    println!("=== lexifetch: fetch bundles from {base_url} ===\n");

    let config = ClientConfig::builder(base_url)
        .timeout(Duration::from_secs(3))
        .max_retries(2)
        .cache_ttl(Duration::from_secs(60))
        .build()?;
    let client = ResourceClient::builder(config).sink(shared(LogSink)).build()?;

    let languages = client.get_languages().await;
    println!("languages: {:?}", languages);

    let refs: Vec<&str> = namespaces.iter().map(String::as_str).collect();
    for (namespace, bundle) in client.get_resources(&language, &refs).await {
        println!("\n[{language}/{namespace}] {} keys", bundle.len());
        println!("{}", serde_json::to_string_pretty(&bundle)?);
    }

    // served from cache
    let again = client.get_resource(&language, &namespaces[0]).await;
    println!("\nsecond read of {language}/{}: {} keys (cached)", namespaces[0], again.len());
    Ok(())
}
