use bank_assistant_orchestrator::{
    agents::GeminiAgentClient,
    api::start_server,
    engine::OrchestrationEngine,
    store::store_from_env,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let gemini_api_key = std::env::var("GEMINI_API_KEY").unwrap_or_else(|_| {
        eprintln!("GEMINI_API_KEY not set in .env");
        eprintln!("See .env.example for setup instructions");
        String::new()
    });

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("Bank Assistant Orchestrator - API Server");
    info!("Port: {}", api_port);

    // Create components
    let client = Arc::new(GeminiAgentClient::new(gemini_api_key));
    let store = store_from_env();
    let engine = Arc::new(OrchestrationEngine::new(client, store));

    info!("Orchestration engine initialized");
    info!("Starting API server...");

    start_server(engine, api_port).await?;

    Ok(())
}
