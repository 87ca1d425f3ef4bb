mod completion;
mod config;
mod error;
mod model;
mod parser;
mod pipeline;
mod prompt;
mod schema;
mod server;
mod store;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use idea_common::openai::OpenAiClient;

use completion::OpenAiCompletionClient;
use config::Config;
use pipeline::EvaluationPipeline;
use server::AppState;
use store::RedisIdeaStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real deployments set the environment directly.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting idea-validator");

    // 1. Load config from environment
    let config = Config::from_env()?;
    info!(
        base_url = %config.openai.base_url,
        model = %config.openai.model,
        timeout_ms = config.openai.timeout.as_millis(),
        repair_attempts = config.repair_attempts,
        port = config.port,
        "configuration loaded"
    );

    // 2. Completion client and pipeline
    let openai = OpenAiClient::new(config.openai.clone())?;
    let pipeline = EvaluationPipeline::new(Arc::new(OpenAiCompletionClient::new(openai)))
        .with_repair_attempts(config.repair_attempts);

    // 3. Connect to Redis; the store is the system of record, so this is fatal
    let store = Arc::new(RedisIdeaStore::connect(&config.redis_url).await?);

    // 4. Serve HTTP until ctrl-c
    let app = server::router(AppState {
        pipeline: Arc::new(pipeline),
        store: store.clone(),
    });
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "http server error"))?;

    store.close().await;
    info!("idea-validator shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}
