//! Save conversation tool implementation
//!
//! Appends a batch of messages to today's partition.

use crate::error::Result;
use crate::store::{ConversationBatch, LogStore};
use crate::tools::{ToolExecutor, ToolResult, TOOL_SAVE_CONVERSATION};
use async_trait::async_trait;
use std::sync::Arc;

/// Tool wrapping [`LogStore::save_conversation`]
///
/// # Examples
///
/// ```no_run
/// use convlog::store::LogStore;
/// use convlog::tools::{SaveConversationTool, ToolExecutor};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let tool = SaveConversationTool::new(Arc::new(LogStore::new("/tmp/logs")));
/// let result = tool.execute(serde_json::json!({
///     "messages": [{"role": "user", "content": "hi there"}]
/// })).await.unwrap();
/// assert!(result.success);
/// # });
/// ```
pub struct SaveConversationTool {
    store: Arc<LogStore>,
}

impl SaveConversationTool {
    /// Creates a new save tool over `store`
    pub fn new(store: Arc<LogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolExecutor for SaveConversationTool {
    fn tool_definition(&self) -> serde_json::Value {
        serde_json::json!({
            "name": TOOL_SAVE_CONVERSATION,
            "description": "Saves a batch of conversation messages to the log. All messages share one session; a session id is generated when none is given.",
            "parameters": {
                "type": "object",
                "properties": {
                    "messages": {
                        "type": "array",
                        "description": "Messages in the order they were exchanged",
                        "items": {
                            "type": "object",
                            "properties": {
                                "role": {
                                    "type": "string",
                                    "enum": ["user", "assistant"]
                                },
                                "content": {
                                    "type": "string"
                                }
                            },
                            "required": ["role", "content"]
                        }
                    },
                    "session_id": {
                        "type": "string",
                        "description": "Session to append to"
                    },
                    "user_id": {
                        "type": "string",
                        "description": "User the conversation belongs to"
                    },
                    "metadata": {
                        "type": "object",
                        "description": "Extra fields stored with every message; `model` is also copied to the entry"
                    }
                },
                "required": ["messages"]
            }
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult> {
        let batch = ConversationBatch::from_value(&args)?;
        let response = self.store.save_conversation(batch).await?;
        ToolResult::json(&serde_json::json!({
            "session_id": response.session_id,
            "log_file_path": response.log_file_path,
            "timestamp": response.timestamp,
            "message_count": response.message_count,
        }))
    }
}
