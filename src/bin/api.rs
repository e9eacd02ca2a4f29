use financial_advice_router::{api::start_server, config::AdvisorConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AdvisorConfig::from_env();

    info!("Financial Advice Router - API Server");
    info!("Port: {}", config.port);

    let orchestrator = Arc::new(config.build_orchestrator()?);

    info!("Routing orchestrator initialized");

    start_server(orchestrator, config.port).await?;

    Ok(())
}
