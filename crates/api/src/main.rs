use std::env;

use anyhow::Result;
use wayfinder_api::{build_app, ApiConfig};
use wayfinder_observability::init_tracing;
use wayfinder_services::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("wayfinder_api");

    let settings = Settings::load()?;
    let bind = env::var("WAYFINDER_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let app = build_app(&settings, ApiConfig::from_env())?;

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(
        bind = %bind,
        classifier = ?settings.classifier_mode,
        remote_tools = settings.tool_server_url.is_some(),
        "wayfinder api started"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
