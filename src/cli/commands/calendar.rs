use clap::Args;
use serde_json::json;
use std::path::PathBuf;

use crate::calendar::CalendarFilters;
use crate::cli::utils::{find_user, output_success};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::models::fields::parse_day;
use crate::database::open_store;
use crate::middleware::CurrentUser;
use crate::services::CalendarService;
use crate::state::AppState;

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[arg(help = "Username whose family calendar is exported")]
    pub username: String,

    #[arg(long, help = "First day to include (YYYY-MM-DD)")]
    pub start: Option<String>,

    #[arg(long, help = "Last day to include (YYYY-MM-DD)")]
    pub end: Option<String>,

    #[arg(long, help = "Leave out events shared by other families")]
    pub own_only: bool,

    #[arg(short, long, help = "Write to this file instead of the dated default name")]
    pub output: Option<PathBuf>,
}

fn day(raw: Option<&str>, flag: &str) -> anyhow::Result<Option<chrono::NaiveDate>> {
    raw.map(|s| parse_day(s).ok_or_else(|| anyhow::anyhow!("--{} must be YYYY-MM-DD, got '{}'", flag, s)))
        .transpose()
}

pub async fn handle(args: ExportArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config().clone();
    let store = open_store(&config.database).await?;
    let user = find_user(store.clone(), &args.username).await?;
    let family_id = user
        .family_id
        .ok_or_else(|| anyhow::anyhow!("User '{}' has no family", user.username))?;

    let current = CurrentUser {
        id: user.id,
        username: user.username,
        email: user.email,
        role: user.role,
        family_id,
    };
    let filters = CalendarFilters {
        start_date: day(args.start.as_deref(), "start")?,
        end_date: day(args.end.as_deref(), "end")?,
        include_shared: !args.own_only,
        ..Default::default()
    };

    let state = AppState::new(store, config);
    let export = CalendarService::new(&state).export(&current, &filters).await?;
    let path = args.output.unwrap_or_else(|| PathBuf::from(&export.filename));
    std::fs::write(&path, &export.body)?;

    output_success(
        output_format,
        &format!("Wrote {}", path.display()),
        Some(json!({ "path": path.display().to_string(), "bytes": export.body.len() })),
    )
}
