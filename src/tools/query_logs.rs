//! Query logs tool implementation

use crate::error::{ConvlogError, Result};
use crate::store::{parse_limit, LogStore, QueryFilter};
use crate::tools::{ToolExecutor, ToolResult, TOOL_QUERY_LOGS};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Tool wrapping [`LogStore::query_logs`]
pub struct QueryLogsTool {
    store: Arc<LogStore>,
}

impl QueryLogsTool {
    /// Creates a new query tool over `store`
    pub fn new(store: Arc<LogStore>) -> Self {
        Self { store }
    }
}

fn string_arg(args: &Value, key: &str) -> Result<Option<String>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ConvlogError::Validation(format!("{} must be a string", key)).into()),
    }
}

#[async_trait]
impl ToolExecutor for QueryLogsTool {
    fn tool_definition(&self) -> Value {
        serde_json::json!({
            "name": TOOL_QUERY_LOGS,
            "description": "Searches saved conversation messages, newest log files first. All filters are optional and combine with AND.",
            "parameters": {
                "type": "object",
                "properties": {
                    "session_id": {
                        "type": "string",
                        "description": "Only messages from this session"
                    },
                    "user_id": {
                        "type": "string",
                        "description": "Only messages from this user"
                    },
                    "keyword": {
                        "type": "string",
                        "description": "Case-insensitive text the message must contain"
                    },
                    "start_date": {
                        "type": "string",
                        "description": "Inclusive ISO-8601 lower bound on the timestamp"
                    },
                    "end_date": {
                        "type": "string",
                        "description": "Inclusive ISO-8601 upper bound on the timestamp"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Maximum messages to return (default 50)"
                    }
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        if !(args.is_object() || args.is_null()) {
            return Err(ConvlogError::Validation("arguments must be an object".into()).into());
        }

        let filter = QueryFilter {
            session_id: string_arg(&args, "session_id")?,
            user_id: string_arg(&args, "user_id")?,
            keyword: string_arg(&args, "keyword")?,
            start_date: string_arg(&args, "start_date")?,
            end_date: string_arg(&args, "end_date")?,
        };
        let limit = parse_limit(args.get("limit"))?;

        let logs = self.store.query_logs(&filter, limit).await?;
        ToolResult::json(&serde_json::json!({
            "count": logs.len(),
            "logs": logs,
        }))
    }
}
