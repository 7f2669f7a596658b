//! Smart Quiz - adaptive quiz service
//!
//! Serves the quiz API and exposes the same flows on the command line.

use smart_quiz::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Rustls 0.23+ needs a process-wide crypto provider for HTTPS
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install Rustls crypto provider"))?;

    // Initialize logging (INFO by default, override with RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    cli::run().await
}
