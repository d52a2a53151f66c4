//! Terraform Provider for Aviatrix
//!
//! Speaks the provider protocol on stdin/stdout. Logs go to stderr.

use tokio::io::{self, BufReader};
use tracing::info;

use aviatrix_provider::{server, AviatrixProvider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Aviatrix Terraform Provider");

    let provider = AviatrixProvider::new();
    server::serve(&provider, BufReader::new(io::stdin()), io::stdout()).await?;

    Ok(())
}
