//! Per-session summaries folded from the full history

use crate::error::Result;
use crate::store::partition::PartitionStore;
use crate::store::record::LogEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default number of sessions returned by a listing
pub const DEFAULT_SESSION_LIMIT: usize = 20;

/// Derived view of one session; never persisted
///
/// `first_timestamp`, `last_timestamp` and `user_id` reflect scan order
/// (newest partition first), not chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session grouping key
    pub session_id: String,
    /// Timestamp of the first record seen for the session
    pub first_timestamp: String,
    /// Timestamp of the last record seen for the session
    pub last_timestamp: String,
    /// Number of records bearing this session id
    pub message_count: usize,
    /// User id of the first record seen for the session
    pub user_id: Option<String>,
}

/// Fold of log entries into session summaries
///
/// Keeps first-seen order so sorting by `last_timestamp` is stable for ties.
#[derive(Debug, Default)]
pub struct SessionAggregator {
    index: HashMap<String, usize>,
    summaries: Vec<SessionSummary>,
}

impl SessionAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one entry into its session's summary
    pub fn observe(&mut self, entry: &LogEntry) {
        match self.index.get(&entry.session_id) {
            Some(&slot) => {
                let summary = &mut self.summaries[slot];
                summary.message_count += 1;
                summary.last_timestamp = entry.timestamp.clone();
            }
            None => {
                self.index
                    .insert(entry.session_id.clone(), self.summaries.len());
                self.summaries.push(SessionSummary {
                    session_id: entry.session_id.clone(),
                    first_timestamp: entry.timestamp.clone(),
                    last_timestamp: entry.timestamp.clone(),
                    message_count: 1,
                    user_id: entry.user_id.clone(),
                });
            }
        }
    }

    /// Number of distinct sessions seen
    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    /// Whether no entries have been observed
    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    /// Summaries sorted by `last_timestamp` descending, truncated to `limit`
    pub fn finish(self, limit: usize) -> Vec<SessionSummary> {
        let mut summaries = self.summaries;
        summaries.sort_by(|a, b| b.last_timestamp.cmp(&a.last_timestamp));
        summaries.truncate(limit);
        summaries
    }
}

/// Summarize every session across all partitions
pub async fn list_sessions(store: &PartitionStore, limit: usize) -> Result<Vec<SessionSummary>> {
    let mut aggregator = SessionAggregator::new();
    let mut records = 0usize;

    for partition in store.list_partitions().await? {
        let Some(mut reader) = store.open_reader(&partition).await? else {
            continue;
        };
        while let Some(entry) = reader.next_entry().await? {
            aggregator.observe(&entry);
            records += 1;
        }
    }

    tracing::debug!(
        records,
        sessions = aggregator.len(),
        limit,
        "Session aggregation complete"
    );

    Ok(aggregator.finish(limit))
}
