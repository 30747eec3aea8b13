//! List sessions tool implementation

use crate::error::{ConvlogError, Result};
use crate::store::{parse_limit, LogStore};
use crate::tools::{ToolExecutor, ToolResult, TOOL_LIST_SESSIONS};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Tool wrapping [`LogStore::list_sessions`]
pub struct ListSessionsTool {
    store: Arc<LogStore>,
}

impl ListSessionsTool {
    /// Creates a new session listing tool over `store`
    pub fn new(store: Arc<LogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolExecutor for ListSessionsTool {
    fn tool_definition(&self) -> Value {
        serde_json::json!({
            "name": TOOL_LIST_SESSIONS,
            "description": "Lists conversation sessions with message counts, most recently active first.",
            "parameters": {
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Maximum sessions to return (default 20)"
                    }
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        if !(args.is_object() || args.is_null()) {
            return Err(ConvlogError::Validation("arguments must be an object".into()).into());
        }
        let limit = parse_limit(args.get("limit"))?;
        let sessions = self.store.list_sessions(limit).await?;
        ToolResult::json(&serde_json::json!({
            "count": sessions.len(),
            "sessions": sessions,
        }))
    }
}
