use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use shopping_reminder::config::{self, Config};
use shopping_reminder::dispatch;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Run the shopping reminder once and print the response body"
)]
struct Args {
    /// Path to YAML config file; environment variables are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = match &args.config {
        Some(path) => config::load(Some(path.as_path())),
        None => Config::from_env(),
    };

    let response = dispatch::handle_invocation(cfg).await;
    info!(status = response.status_code, "reminder run finished");
    println!("{}", response.body);

    if response.status_code != 200 {
        bail!("reminder run returned status {}", response.status_code);
    }
    Ok(())
}
