use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use askdb_assistant::{
    config::Config,
    db,
    llm::{create_provider, LlmReasoner},
    server::Server,
    workflow::AssistantContext,
    Assistant, Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::load()?;
    info!(
        "Loaded configuration: database={:?}, provider={}, model={}, max_attempts={}",
        config.database.db_type, config.llm.provider, config.llm.model, config.workflow.max_attempts
    );

    // Connect to the database and capture its schema
    let database = db::connect(&config.database).await?;

    // Initialize the reasoning service
    let provider = create_provider(&config.llm)
        .map_err(|e| askdb_assistant::Error::Config(format!("Failed to create LLM provider: {}", e)))?;
    let reasoner = Arc::new(LlmReasoner::new(provider)?);

    let context = AssistantContext::from_database(reasoner, database).await?;
    info!("Schema captured ({} bytes)", context.schema.len());

    let assistant = Arc::new(Assistant::new(context, &config.workflow)?);

    // Start server
    info!("Starting server on {}", config.server.addr);
    Server::new(assistant).start(&config.server.addr).await?;

    Ok(())
}
