pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sphere")]
#[command(about = "FamilySphere operator CLI")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP API")]
    Serve(commands::serve::ServeArgs),

    #[command(about = "Mint a bearer token for a user")]
    Token(commands::token::TokenArgs),

    #[command(about = "Export a user's family calendar as iCalendar")]
    Export(commands::calendar::ExportArgs),

    #[command(about = "Apply the bundled database schema")]
    Migrate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Serve(args) => commands::serve::handle(args).await,
        Commands::Token(args) => commands::token::handle(args, output_format).await,
        Commands::Export(args) => commands::calendar::handle(args, output_format).await,
        Commands::Migrate => commands::migrate::handle(output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_token_command() {
        let cli = Cli::try_parse_from(["sphere", "--json", "token", "alice", "--hours", "2"]).unwrap();
        assert_eq!(OutputFormat::from_cli(&cli), OutputFormat::Json);
        match cli.command {
            Commands::Token(args) => {
                assert_eq!(args.username, "alice");
                assert_eq!(args.hours, Some(2));
            }
            _ => panic!("expected token command"),
        }
    }

    #[test]
    fn test_export_takes_date_range() {
        let cli = Cli::try_parse_from(["sphere", "export", "bob", "--start", "2025-01-01", "-o", "out.ics"]).unwrap();
        match cli.command {
            Commands::Export(args) => {
                assert_eq!(args.username, "bob");
                assert_eq!(args.start.as_deref(), Some("2025-01-01"));
                assert_eq!(args.output.as_deref(), Some(std::path::Path::new("out.ics")));
            }
            _ => panic!("expected export command"),
        }
    }
}
