//! Send one prompt to a running service's `/analyze-sentiment` route.

use anyhow::Context;
use clap::Parser;
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[command(name = "sentiment-client", about = "Query the sentiment analysis endpoint")]
struct Args {
    /// Base URL of the emotion service
    #[arg(long, env = "SENTIMENT_URL", default_value = "http://localhost:7000")]
    url: String,

    /// Text to analyze
    #[arg(default_value = "I feel very happy today!")]
    prompt: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let endpoint = format!("{}/analyze-sentiment", args.url.trim_end_matches('/'));

    let response = reqwest::Client::new()
        .post(&endpoint)
        .json(&json!({ "prompt": args.prompt }))
        .send()
        .await
        .with_context(|| format!("Failed to reach {endpoint}"))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        println!("Error: {} {}", status.as_u16(), body);
        return Ok(());
    }

    let body: Value = response.json().await.context("Response was not JSON")?;
    println!("Response JSON: {body}");
    match body.get("sentiment").and_then(Value::as_str) {
        Some(sentiment) => println!("Sentiment: {sentiment}"),
        None => println!("Sentiment: <missing>"),
    }
    Ok(())
}
