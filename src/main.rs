use tracing_subscriber::EnvFilter;

use familysphere_api::config::config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL, JWT_SECRET etc. are picked up
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("familysphere_api=info,tower_http=info")),
        )
        .init();

    let config = config().clone();
    tracing::info!("Starting FamilySphere API in {:?} mode", config.environment);

    familysphere_api::serve(config).await
}
