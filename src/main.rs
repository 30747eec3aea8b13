//! convlog - conversation log store CLI
//!
//! Main entry point: parses arguments, loads configuration, and dispatches
//! to the command handlers.

use anyhow::Result;

use convlog::cli::{Cli, Commands};
use convlog::commands;
use convlog::config::Config;
use convlog::logging::init_logging;
use convlog::store::QueryFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    init_logging(&config.logging)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Save {
            messages,
            session_id,
            user_id,
            metadata,
        } => {
            tracing::info!("Saving conversation batch");
            commands::handle_save(&config, &messages, session_id, user_id, metadata.as_deref())
                .await
        }
        Commands::Query {
            session_id,
            user_id,
            keyword,
            start_date,
            end_date,
            limit,
            json,
        } => {
            let filter = QueryFilter {
                session_id,
                user_id,
                keyword,
                start_date,
                end_date,
            };
            tracing::debug!(?filter, ?limit, "Querying logs");
            commands::handle_query(&config, filter, limit, json).await
        }
        Commands::Sessions { limit, json } => {
            tracing::debug!(?limit, "Listing sessions");
            commands::handle_sessions(&config, limit, json).await
        }
        Commands::Tools => commands::handle_tools(&config),
        Commands::Serve => {
            tracing::info!("Starting stdio server");
            commands::handle_serve(&config).await
        }
    }
}
