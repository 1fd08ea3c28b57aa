use anyhow::{Context, Result};
use api::config::Settings;
use api::routes::{router, AppState};
use pipeline::{JsonFileSink, PipelineConfig};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    api::logging::init_tracing();

    let settings = Settings::from_env()?;
    let config = PipelineConfig::from_env().context("Invalid pipeline configuration")?;
    let pipeline = api::build_pipeline(&settings, &config).context("Failed to build pipeline")?;

    let state = AppState {
        pipeline: Arc::new(pipeline),
        sink: Arc::new(JsonFileSink::new(&settings.reports_dir)),
    };

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind_addr))?;

    info!(
        addr = %settings.bind_addr,
        reports_dir = %settings.reports_dir.display(),
        query_budget = config.query_budget,
        "Server listening"
    );

    axum::serve(listener, router(state)).await.context("Server error")?;
    Ok(())
}
