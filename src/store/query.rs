//! Filtered linear scan over stored partitions

use crate::error::Result;
use crate::store::partition::PartitionStore;
use crate::store::record::LogEntry;
use serde::{Deserialize, Serialize};

/// Default number of entries returned by a query
pub const DEFAULT_QUERY_LIMIT: usize = 50;

/// Filters applied to every scanned entry; unset fields match everything
///
/// `start_date` and `end_date` are inclusive bounds compared as strings
/// against the entry timestamp, which works because timestamps are ISO-8601.
/// A bare date such as `2025-01-02` as `end_date` therefore excludes entries
/// later on that day; pass `2025-01-02T23:59:59.999Z` to include them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    /// Exact session id
    #[serde(default)]
    pub session_id: Option<String>,
    /// Exact user id
    #[serde(default)]
    pub user_id: Option<String>,
    /// Case-insensitive substring of the message
    #[serde(default)]
    pub keyword: Option<String>,
    /// Inclusive lower bound on the timestamp
    #[serde(default)]
    pub start_date: Option<String>,
    /// Inclusive upper bound on the timestamp
    #[serde(default)]
    pub end_date: Option<String>,
}

impl QueryFilter {
    /// Check whether `entry` passes every set filter
    pub fn matches(&self, entry: &LogEntry) -> bool {
        let keyword_lower = self.keyword.as_deref().map(str::to_lowercase);
        self.matches_with_keyword(entry, keyword_lower.as_deref())
    }

    fn matches_with_keyword(&self, entry: &LogEntry, keyword_lower: Option<&str>) -> bool {
        if let Some(session_id) = &self.session_id {
            if &entry.session_id != session_id {
                return false;
            }
        }
        if let Some(user_id) = &self.user_id {
            if entry.user_id.as_ref() != Some(user_id) {
                return false;
            }
        }
        if let Some(start) = &self.start_date {
            if entry.timestamp.as_str() < start.as_str() {
                return false;
            }
        }
        if let Some(end) = &self.end_date {
            if entry.timestamp.as_str() > end.as_str() {
                return false;
            }
        }
        if let Some(keyword) = keyword_lower {
            if !entry.message.to_lowercase().contains(keyword) {
                return false;
            }
        }
        true
    }
}

/// Scan partitions most recent first and collect up to `limit` matches
///
/// Entries within a partition come back in append order. The scan stops as
/// soon as `limit` matches are collected, so the result is a prefix of the
/// filtered history in scan order.
pub async fn query(
    store: &PartitionStore,
    filter: &QueryFilter,
    limit: usize,
) -> Result<Vec<LogEntry>> {
    let mut results = Vec::new();
    if limit == 0 {
        return Ok(results);
    }

    let keyword_lower = filter.keyword.as_deref().map(str::to_lowercase);
    let partitions = store.list_partitions().await?;
    let mut scanned = 0usize;

    'partitions: for partition in &partitions {
        let Some(mut reader) = store.open_reader(partition).await? else {
            continue;
        };
        scanned += 1;
        while let Some(entry) = reader.next_entry().await? {
            if filter.matches_with_keyword(&entry, keyword_lower.as_deref()) {
                results.push(entry);
                if results.len() >= limit {
                    break 'partitions;
                }
            }
        }
    }

    tracing::debug!(
        partitions = partitions.len(),
        scanned,
        matched = results.len(),
        limit,
        "Query complete"
    );

    Ok(results)
}
