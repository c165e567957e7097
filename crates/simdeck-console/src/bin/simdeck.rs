//! SimDeck operator console
//!
//! Connect to a simulation engine and serve the operator API.

use std::sync::Arc;

use simdeck_client::HttpControlClient;
use simdeck_console::{Console, ConsoleConfig, ConsoleServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "simdeck=info,simdeck_console=info,simdeck_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ConsoleConfig::from_env()?;
    tracing::info!(
        engine = %config.engine_url,
        poll_ms = config.poll_interval.as_millis() as u64,
        "Starting SimDeck console"
    );

    let client = HttpControlClient::new(&config.engine_url, config.request_timeout)?;
    let console = Console::new(Arc::new(client), config.poll_interval);

    ConsoleServer::new(console).serve(config.listen_addr).await?;

    Ok(())
}
