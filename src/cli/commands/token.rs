use clap::Args;
use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::utils::{find_user, output_success};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::open_store;

#[derive(Args, Debug)]
pub struct TokenArgs {
    #[arg(help = "Username")]
    pub username: String,

    #[arg(long, help = "Token lifetime in hours (defaults to JWT_EXPIRY_HOURS)")]
    pub hours: Option<u64>,
}

pub async fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config();
    let store = open_store(&config.database).await?;
    let user = find_user(store, &args.username).await?;

    let hours = args.hours.unwrap_or(config.security.jwt_expiry_hours);
    let claims = Claims::for_user(&user, hours)?;
    let token = generate_jwt(&claims, &config.security)?;

    match output_format {
        OutputFormat::Text => println!("{}", token),
        OutputFormat::Json => output_success(
            output_format,
            &format!("Token issued for {}", user.username),
            Some(json!({ "token": token, "expires_at": claims.exp, "family_id": claims.family_id })),
        )?,
    }
    Ok(())
}
