use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::DatabaseManager;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::connect(&config().database).await?;
    let applied = DatabaseManager::migrate(&pool).await?;
    output_success(
        output_format,
        &format!("Applied {} schema statements", applied),
        Some(json!({ "statements": applied })),
    )
}
