use tracing::info;
use tracing_subscriber::EnvFilter;

use uow_barrier::adapter::config::AppConfig;
use uow_barrier::adapter::init::AppInitializer;
use uow_barrier::adapter::web::create_router::create_router;
use uow_barrier::error::ApplicationError;

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    let bind_addr = config.bind_addr().to_string();
    let state = AppInitializer::initialize(config).await?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "server running");
    axum::serve(listener, app).await?;

    Ok(())
}
