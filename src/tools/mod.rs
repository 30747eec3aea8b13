//! Tools module for convlog
//!
//! Each logical operation of the log store is exposed as a tool: a JSON
//! schema describing its arguments plus an executor. The registry's
//! [`ToolRegistry::call`] never fails; every error becomes a failed
//! [`ToolResult`] so one bad request cannot take down the server.

pub mod list_sessions;
pub mod query_logs;
pub mod save_conversation;

use crate::error::{ErrorKind, Result};
use crate::store::LogStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

pub use list_sessions::ListSessionsTool;
pub use query_logs::QueryLogsTool;
pub use save_conversation::SaveConversationTool;

/// Tool name for appending a conversation batch
pub const TOOL_SAVE_CONVERSATION: &str = "save_conversation";
/// Tool name for filtered log search
pub const TOOL_QUERY_LOGS: &str = "query_logs";
/// Tool name for session summaries
pub const TOOL_LIST_SESSIONS: &str = "list_sessions";

/// Metadata key carrying the [`ErrorKind`] of a failed result
pub const METADATA_ERROR_KIND: &str = "error_kind";

/// Tool result structure
///
/// Represents the outcome of a tool execution. Successful outputs are
/// pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// Whether the tool execution succeeded
    pub success: bool,
    /// Output from the tool
    pub output: String,
    /// Error message if execution failed
    pub error: Option<String>,
    /// Additional metadata about the execution
    pub metadata: HashMap<String, String>,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(output: String) -> Self {
        Self {
            success: true,
            output,
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// Create a successful result from a serializable value
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self> {
        Ok(Self::success(serde_json::to_string_pretty(value)?))
    }

    /// Create a failed tool result
    pub fn error(error: String) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error),
            metadata: HashMap::new(),
        }
    }

    /// Create a failed result classified from an error
    pub fn from_error(error: &anyhow::Error) -> Self {
        let kind = ErrorKind::of(error);
        Self::error(format!("{:#}", error))
            .with_metadata(METADATA_ERROR_KIND.to_string(), kind.as_str().to_string())
    }

    /// Add metadata to the result
    ///
    /// # Returns
    ///
    /// Returns self for chaining
    pub fn with_metadata(mut self, key: String, value: String) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Error kind recorded on a failed result
    pub fn error_kind(&self) -> Option<&str> {
        self.metadata.get(METADATA_ERROR_KIND).map(String::as_str)
    }

    /// Convert to the text returned to callers
    pub fn to_message(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            format!(
                "Error: {}",
                self.error.as_deref().unwrap_or("Unknown error")
            )
        }
    }
}

/// Tool executor trait for implementing tool execution logic
///
/// # Examples
///
/// ```no_run
/// use convlog::tools::{ToolExecutor, ToolResult};
/// use convlog::error::Result;
/// use async_trait::async_trait;
/// use serde_json::Value;
///
/// struct MyTool;
///
/// #[async_trait]
/// impl ToolExecutor for MyTool {
///     fn tool_definition(&self) -> Value {
///         serde_json::json!({
///             "name": "my_tool",
///             "description": "Does something useful",
///             "parameters": {
///                 "type": "object",
///                 "properties": {}
///             }
///         })
///     }
///
///     async fn execute(&self, args: Value) -> Result<ToolResult> {
///         Ok(ToolResult::success("Success".to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Returns the tool definition as a JSON value
    ///
    /// ```json
    /// {
    ///   "name": "tool_name",
    ///   "description": "Tool description",
    ///   "parameters": { "type": "object", "properties": { } }
    /// }
    /// ```
    fn tool_definition(&self) -> serde_json::Value;

    /// Executes the tool with the given arguments
    ///
    /// # Errors
    ///
    /// Returns error if the arguments are invalid or the operation fails
    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult>;
}

/// Tool registry for managing available tools
///
/// Tools are kept in name order so definitions are listed deterministically.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolExecutor>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Registry holding the three log store tools
    pub fn with_log_store(store: Arc<LogStore>) -> Self {
        let mut registry = Self::new();
        registry.register(
            TOOL_SAVE_CONVERSATION,
            Arc::new(SaveConversationTool::new(Arc::clone(&store))),
        );
        registry.register(
            TOOL_QUERY_LOGS,
            Arc::new(QueryLogsTool::new(Arc::clone(&store))),
        );
        registry.register(TOOL_LIST_SESSIONS, Arc::new(ListSessionsTool::new(store)));
        registry
    }

    /// Register a tool executor in the registry
    pub fn register(&mut self, name: impl Into<String>, executor: Arc<dyn ToolExecutor>) {
        self.tools.insert(name.into(), executor);
    }

    /// Get a tool executor by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.tools.get(name).cloned()
    }

    /// Get all tool definitions as JSON values
    pub fn all_definitions(&self) -> Vec<serde_json::Value> {
        self.tools
            .values()
            .map(|executor| executor.tool_definition())
            .collect()
    }

    /// Execute `name`, converting every failure into a failed result
    pub async fn call(&self, name: &str, args: serde_json::Value) -> ToolResult {
        let Some(executor) = self.get(name) else {
            tracing::warn!(tool = name, "Unknown tool requested");
            return ToolResult::error(format!("Unknown tool: {}", name)).with_metadata(
                METADATA_ERROR_KIND.to_string(),
                ErrorKind::Validation.as_str().to_string(),
            );
        };

        match executor.execute(args).await {
            Ok(result) => result,
            Err(e) => {
                let result = ToolResult::from_error(&e);
                tracing::warn!(
                    tool = name,
                    kind = result.error_kind().unwrap_or_default(),
                    error = %format!("{:#}", e),
                    "Tool call failed"
                );
                result
            }
        }
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
