//! Conversation log storage and query engine
//!
//! [`LogStore`] is the entry point used by the tool layer and the CLI. It
//! owns a [`PartitionStore`] and the configured default limits, and exposes
//! the three logical operations: save, query, and list sessions.

use crate::config::Config;
use crate::error::{ConvlogError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod partition;
pub mod query;
pub mod record;
pub mod sessions;

pub use partition::{
    AppendOutcome, Partition, PartitionName, PartitionStore, DEFAULT_ROTATION_THRESHOLD_BYTES,
};
pub use query::{QueryFilter, DEFAULT_QUERY_LIMIT};
pub use record::{
    approximate_tokens, generate_session_id, ConversationBatch, LogEntry, MessageInput, Metadata,
    Role,
};
pub use sessions::{SessionAggregator, SessionSummary, DEFAULT_SESSION_LIMIT};

/// Response to a successful save
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    /// Session the batch was written under
    pub session_id: String,
    /// File holding the batch: the date-named partition, or its rotated name
    /// if this append pushed it over the threshold
    pub log_file_path: PathBuf,
    /// Base time of the batch
    pub timestamp: String,
    /// Number of entries written
    pub message_count: usize,
}

/// Log store with configured defaults
#[derive(Debug)]
pub struct LogStore {
    partitions: PartitionStore,
    default_query_limit: usize,
    default_session_limit: usize,
}

impl LogStore {
    /// Create a store over `dir` with the default rotation threshold and limits
    ///
    /// # Examples
    ///
    /// ```
    /// use convlog::store::LogStore;
    ///
    /// let store = LogStore::new("/tmp/convlog-doc");
    /// assert_eq!(store.default_query_limit(), 50);
    /// ```
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            partitions: PartitionStore::new(dir, DEFAULT_ROTATION_THRESHOLD_BYTES),
            default_query_limit: DEFAULT_QUERY_LIMIT,
            default_session_limit: DEFAULT_SESSION_LIMIT,
        }
    }

    /// Create a store from loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            partitions: PartitionStore::new(
                config.storage.resolved_log_dir(),
                config.storage.rotation_threshold_bytes,
            ),
            default_query_limit: config.query.default_limit,
            default_session_limit: config.query.default_session_limit,
        }
    }

    /// Override the rotation threshold
    pub fn with_rotation_threshold(mut self, bytes: u64) -> Self {
        self.partitions = PartitionStore::new(self.partitions.dir().to_path_buf(), bytes);
        self
    }

    /// Underlying partition store
    pub fn partitions(&self) -> &PartitionStore {
        &self.partitions
    }

    /// Limit used by [`LogStore::query_logs`] when none is given
    pub fn default_query_limit(&self) -> usize {
        self.default_query_limit
    }

    /// Limit used by [`LogStore::list_sessions`] when none is given
    pub fn default_session_limit(&self) -> usize {
        self.default_session_limit
    }

    /// Validate a batch, stamp it, and append it as one block
    ///
    /// # Errors
    ///
    /// IO failures from the append path. Either the whole batch is appended
    /// or the error is returned; a failed append may be partial on disk.
    pub async fn save_conversation(&self, batch: ConversationBatch) -> Result<SaveResponse> {
        let now = Utc::now();
        let mut batch = batch;
        let session_id = batch.resolve_session_id();
        let entries = batch.into_entries(now);

        let outcome = self.partitions.append(&entries).await?;

        tracing::info!(
            session_id = %session_id,
            entries = outcome.entries_written,
            partition = %outcome.partition.display(),
            rotated = outcome.rotated_to.is_some(),
            "Saved conversation"
        );

        Ok(SaveResponse {
            session_id,
            log_file_path: outcome.rotated_to.unwrap_or(outcome.partition),
            timestamp: record::format_timestamp(now),
            message_count: outcome.entries_written,
        })
    }

    /// Filtered search over the full history, most recent partitions first
    pub async fn query_logs(
        &self,
        filter: &QueryFilter,
        limit: Option<usize>,
    ) -> Result<Vec<LogEntry>> {
        let limit = limit.unwrap_or(self.default_query_limit);
        query::query(&self.partitions, filter, limit).await
    }

    /// Per-session summaries sorted by last-seen timestamp
    pub async fn list_sessions(&self, limit: Option<usize>) -> Result<Vec<SessionSummary>> {
        let limit = limit.unwrap_or(self.default_session_limit);
        sessions::list_sessions(&self.partitions, limit).await
    }
}

/// Parse an optional positive `limit` argument
///
/// # Errors
///
/// Returns [`ConvlogError::Validation`] for zero, negative, or non-integer
/// values.
pub fn parse_limit(value: Option<&serde_json::Value>) -> Result<Option<usize>> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => match v.as_u64() {
            Some(n) if n > 0 => Ok(Some(n as usize)),
            _ => Err(ConvlogError::Validation(format!(
                "limit must be a positive integer, got {}",
                v
            ))
            .into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_then_query_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = LogStore::new(temp.path());

        let batch = ConversationBatch::from_value(&json!({
            "messages": [
                {"role": "user", "content": "hi there"},
                {"role": "assistant", "content": "hello, how can I help?"}
            ],
            "user_id": "u-7"
        }))
        .unwrap();
        let saved = store.save_conversation(batch).await.unwrap();
        assert_eq!(saved.message_count, 2);
        assert!(saved.session_id.starts_with("session_"));
        assert_eq!(saved.log_file_path, store.partitions().current_partition_path());

        let filter = QueryFilter {
            session_id: Some(saved.session_id.clone()),
            ..Default::default()
        };
        let logs = store.query_logs(&filter, None).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].tokens, 2);
        assert!(logs[0].timestamp <= logs[1].timestamp);

        let sessions = store.list_sessions(None).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].message_count, 2);
        assert_eq!(sessions[0].user_id.as_deref(), Some("u-7"));
    }

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit(None).unwrap(), None);
        assert_eq!(parse_limit(Some(&json!(null))).unwrap(), None);
        assert_eq!(parse_limit(Some(&json!(5))).unwrap(), Some(5));
        assert!(parse_limit(Some(&json!(0))).is_err());
        assert!(parse_limit(Some(&json!(-3))).is_err());
        assert!(parse_limit(Some(&json!("10"))).is_err());
        assert!(parse_limit(Some(&json!(2.5))).is_err());
    }

    #[test]
    fn test_with_rotation_threshold() {
        let store = LogStore::new("/tmp/x").with_rotation_threshold(42);
        assert_eq!(store.partitions().rotation_threshold_bytes(), 42);
        assert_eq!(store.default_session_limit(), 20);
    }
}
