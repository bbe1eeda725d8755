use anyhow::Result;
use feasibility_studio::config::{GatewayConfig, ServerConfig};
use feasibility_studio::server::{router, AppState};
use feasibility_studio::tools::OpenRouterClient;
use feasibility_studio::{ModelGateway, RetryPolicy};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("feasibility_studio=debug,graph_flow=info,tower_http=info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let gateway_config = GatewayConfig::from_env();
    let server_config = ServerConfig::from_env();

    if gateway_config.api_key.is_none() {
        warn!("No API key configured; every model call will fail until OPENROUTER_API_KEY is set");
    }

    let retry = RetryPolicy::from_config(&gateway_config);
    let backend = OpenRouterClient::new(gateway_config);
    info!("Using model {}", backend.model());
    let gateway = ModelGateway::new(Arc::new(backend)).with_retry(retry);

    let state = AppState::new(gateway, server_config.feasibility_debounce)
        .with_idle_ttl(server_config.workspace_idle_ttl);
    state.spawn_sweeper(server_config.workspace_sweep_interval);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(server_config.bind_addr.as_str()).await?;
    info!("Feasibility studio running on http://{}", server_config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
