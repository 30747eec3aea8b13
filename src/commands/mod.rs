//! Command handlers for the CLI
//!
//! Each handler builds its own [`LogStore`] from the loaded configuration.
//! Results go to stdout; diagnostics go through `tracing` to stderr.

use crate::config::Config;
use crate::error::{ConvlogError, Result};
use crate::server::McpServer;
use crate::store::{ConversationBatch, LogEntry, LogStore, QueryFilter, SessionSummary};
use crate::tools::ToolRegistry;
use colored::Colorize;
use prettytable::{format, Table};
use std::sync::Arc;
use tokio::io::AsyncReadExt;

const MESSAGE_PREVIEW_CHARS: usize = 60;

/// Build the arguments object accepted by `save_conversation`
///
/// `messages` is a JSON array, or `-` to read that array from stdin.
///
/// # Errors
///
/// Returns [`ConvlogError::Validation`] if either JSON argument does not parse
pub async fn save_arguments(
    messages: &str,
    session_id: Option<String>,
    user_id: Option<String>,
    metadata: Option<&str>,
) -> Result<serde_json::Value> {
    let raw = if messages == "-" {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        messages.to_string()
    };

    let messages: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| ConvlogError::Validation(format!("--messages is not valid JSON: {}", e)))?;

    let mut args = serde_json::json!({
        "messages": messages,
        "session_id": session_id,
        "user_id": user_id,
    });
    if let Some(metadata) = metadata {
        let metadata: serde_json::Value = serde_json::from_str(metadata).map_err(|e| {
            ConvlogError::Validation(format!("--metadata is not valid JSON: {}", e))
        })?;
        args["metadata"] = metadata;
    }
    Ok(args)
}

/// Handle `convlog save`
pub async fn handle_save(
    config: &Config,
    messages: &str,
    session_id: Option<String>,
    user_id: Option<String>,
    metadata: Option<&str>,
) -> Result<()> {
    let args = save_arguments(messages, session_id, user_id, metadata).await?;
    let batch = ConversationBatch::from_value(&args)?;
    let store = LogStore::from_config(config);

    let response = store.save_conversation(batch).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn positive_limit(limit: Option<usize>) -> Result<Option<usize>> {
    match limit {
        Some(0) => Err(ConvlogError::Validation("--limit must be at least 1".to_string()).into()),
        other => Ok(other),
    }
}

/// Handle `convlog query`
pub async fn handle_query(
    config: &Config,
    filter: QueryFilter,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let limit = positive_limit(limit)?;
    let store = LogStore::from_config(config);
    let logs = store.query_logs(&filter, limit).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "count": logs.len(),
                "logs": logs,
            }))?
        );
        return Ok(());
    }

    if logs.is_empty() {
        println!("{}", "No matching log entries found.".yellow());
        return Ok(());
    }

    print_logs_table(&logs);
    println!("{} entries", logs.len());
    Ok(())
}

/// Handle `convlog sessions`
pub async fn handle_sessions(config: &Config, limit: Option<usize>, json: bool) -> Result<()> {
    let limit = positive_limit(limit)?;
    let store = LogStore::from_config(config);
    let sessions = store.list_sessions(limit).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "count": sessions.len(),
                "sessions": sessions,
            }))?
        );
        return Ok(());
    }

    if sessions.is_empty() {
        println!("{}", "No sessions found.".yellow());
        return Ok(());
    }

    print_sessions_table(&sessions);
    Ok(())
}

/// Handle `convlog tools`
pub fn handle_tools(config: &Config) -> Result<()> {
    let registry = ToolRegistry::with_log_store(Arc::new(LogStore::from_config(config)));
    let definitions = serde_json::Value::Array(registry.all_definitions());
    println!("{}", serde_json::to_string_pretty(&definitions)?);
    Ok(())
}

/// Handle `convlog serve`
pub async fn handle_serve(config: &Config) -> Result<()> {
    let store = Arc::new(LogStore::from_config(config));
    tracing::info!(
        log_dir = %store.partitions().dir().display(),
        "Serving tools over stdio"
    );
    let server = McpServer::new(ToolRegistry::with_log_store(store));
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    server.serve(stdin, tokio::io::stdout()).await
}

fn preview(message: &str) -> String {
    let single_line = message.replace('\n', " ");
    if single_line.chars().count() > MESSAGE_PREVIEW_CHARS {
        let cut: String = single_line.chars().take(MESSAGE_PREVIEW_CHARS - 3).collect();
        format!("{}...", cut)
    } else {
        single_line
    }
}

fn print_logs_table(logs: &[LogEntry]) {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "Timestamp".bold(),
        "Session".bold(),
        "Role".bold(),
        "Message".bold(),
        "Tokens".bold()
    ]);

    for entry in logs {
        table.add_row(prettytable::row![
            entry.timestamp,
            entry.session_id.cyan(),
            entry.role.as_str(),
            preview(&entry.message),
            entry.tokens
        ]);
    }

    table.printstd();
}

fn print_sessions_table(sessions: &[SessionSummary]) {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "Session".bold(),
        "User".bold(),
        "Messages".bold(),
        "First Seen".bold(),
        "Last Seen".bold()
    ]);

    for session in sessions {
        let user = session.user_id.as_deref().unwrap_or("-");
        table.add_row(prettytable::row![
            session.session_id.cyan(),
            user,
            session.message_count,
            session.first_timestamp,
            session.last_timestamp
        ]);
    }

    println!("\nSessions:");
    table.printstd();
    println!();
}
