use clap::Args;

use crate::config::config;

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, help = "Port to listen on (overrides PORT)")]
    pub port: Option<u16>,
}

pub async fn handle(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = config().clone();
    if let Some(port) = args.port {
        config.api.port = port;
    }
    tracing::info!("Starting FamilySphere API in {:?} mode", config.environment);
    crate::serve(config).await
}
