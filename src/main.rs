//! Kaiwa 网关可执行入口 读取环境配置并启动 HTTP 服务

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kaiwa::config::{GatewayConfig, ModelCatalog};
use kaiwa::gateway::{self, AppState};
use kaiwa::http::reqwest::default_dyn_transport;
use kaiwa::registry::AdapterRegistry;
use kaiwa::storage::ChatRepository;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env();
    let transport = default_dyn_transport()?;
    let registry = Arc::new(AdapterRegistry::new(
        transport,
        ModelCatalog::default(),
        config.clone(),
    ));
    let state = AppState {
        registry,
        repository: ChatRepository::new(),
    };

    let listener = TcpListener::bind(&config.bind).await?;
    info!(addr = %config.bind, "kaiwa gateway listening");
    axum::serve(listener, gateway::router(state)).await?;
    Ok(())
}
