use tracing_subscriber::EnvFilter;
use unified_gateway::{app, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("unified_gateway=info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!(environment = %config.environment, "starting gateway");

    let state = AppState::new(config);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
