//! Bounded execution log with filtered, paginated queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::AgentryError;
use crate::types::{ExecutionLogEntry, ExecutionStatus};

/// Maximum number of entries the log retains
pub const LOG_CAPACITY: usize = 1000;

/// Filter and pagination settings for a log query.
///
/// All filters are optional and combine with AND; time bounds are
/// inclusive on both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct LogQuery {
    /// Only entries for this tool
    pub tool: Option<String>,
    /// Only entries for this agent
    pub agent_id: Option<String>,
    /// Only entries with this outcome
    pub status: Option<ExecutionStatus>,
    /// Only entries at or after this instant
    pub since: Option<DateTime<Utc>>,
    /// Only entries at or before this instant
    pub until: Option<DateTime<Utc>>,
    /// 1-based page number
    pub page: usize,
    /// Entries per page, 1-100
    pub page_size: usize,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            tool: None,
            agent_id: None,
            status: None,
            since: None,
            until: None,
            page: 1,
            page_size: 10,
        }
    }
}

impl LogQuery {
    fn validate(&self) -> Result<(), AgentryError> {
        if self.page == 0 {
            return Err(AgentryError::validation_error("page must be at least 1"));
        }
        if self.page_size == 0 || self.page_size > 100 {
            return Err(AgentryError::validation_error(
                "page_size must be between 1 and 100",
            ));
        }
        Ok(())
    }

    fn matches(&self, entry: &ExecutionLogEntry) -> bool {
        if let Some(tool) = &self.tool {
            if entry.tool != *tool {
                return false;
            }
        }
        if let Some(agent_id) = &self.agent_id {
            if entry.agent_id != *agent_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if entry.status != status {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.timestamp > until {
                return false;
            }
        }
        true
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Matching entries for the requested page, in insertion order
    pub items: Vec<T>,
    /// Total matches across all pages
    pub total: usize,
    /// 1-based page number that was requested
    pub page: usize,
    /// Page size that was requested
    pub page_size: usize,
    /// Total pages for this filter, `ceil(total / page_size)`
    pub total_pages: usize,
}

/// Execution history bounded to the most recent [`LOG_CAPACITY`] entries.
///
/// Appending beyond capacity evicts the oldest entry first; queries only
/// ever see the retained window. A page past the end of the matches is
/// not an error, it returns an empty item list with the counts intact.
#[derive(Clone)]
pub struct ExecutionLog {
    entries: Arc<RwLock<VecDeque<ExecutionLogEntry>>>,
}

impl ExecutionLog {
    /// Create a new empty log
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(LOG_CAPACITY))),
        }
    }

    /// Append an entry, evicting the oldest if the log is full
    pub async fn append(&self, entry: ExecutionLogEntry) {
        let mut entries = self.entries.write().await;
        if entries.len() == LOG_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Query the retained entries.
    ///
    /// Filters combine with AND; results come back in insertion order
    /// (oldest retained first) and are paginated after filtering.
    pub async fn query(&self, query: &LogQuery) -> Result<Page<ExecutionLogEntry>, AgentryError> {
        query.validate()?;

        let entries = self.entries.read().await;
        let matches: Vec<&ExecutionLogEntry> =
            entries.iter().filter(|entry| query.matches(entry)).collect();

        let total = matches.len();
        let total_pages = total.div_ceil(query.page_size);
        let start = (query.page - 1) * query.page_size;
        let items: Vec<ExecutionLogEntry> = matches
            .into_iter()
            .skip(start)
            .take(query.page_size)
            .cloned()
            .collect();

        Ok(Page {
            items,
            total,
            page: query.page,
            page_size: query.page_size,
            total_pages,
        })
    }

    /// Number of retained entries
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }

    /// Whether the log is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Copy of the retained entries, oldest first
    pub async fn snapshot(&self) -> Vec<ExecutionLogEntry> {
        let entries = self.entries.read().await;
        entries.iter().cloned().collect()
    }
}

impl Default for ExecutionLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Map;

    fn entry_at(
        id: usize,
        tool: &str,
        agent_id: &str,
        status: ExecutionStatus,
        timestamp: DateTime<Utc>,
    ) -> ExecutionLogEntry {
        ExecutionLogEntry {
            execution_id: format!("exec-{}", id),
            timestamp,
            tool: tool.to_string(),
            agent_id: agent_id.to_string(),
            parameters: Map::new(),
            status,
            execution_time_ms: 1.0,
            result: None,
            error: None,
        }
    }

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn test_append_evicts_oldest_beyond_capacity() {
        let log = ExecutionLog::new();
        for i in 0..LOG_CAPACITY + 200 {
            log.append(entry_at(i, "tool", "agent", ExecutionStatus::Success, ts(0)))
                .await;
        }

        assert_eq!(log.len().await, LOG_CAPACITY);

        let snapshot = log.snapshot().await;
        assert_eq!(snapshot.first().unwrap().execution_id, "exec-200");
        assert_eq!(
            snapshot.last().unwrap().execution_id,
            format!("exec-{}", LOG_CAPACITY + 199)
        );

        // Retained window stays in insertion order
        let page = log
            .query(&LogQuery {
                page_size: 100,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, LOG_CAPACITY);
        assert_eq!(page.items[0].execution_id, "exec-200");
    }

    #[tokio::test]
    async fn test_filters_combine_with_and() {
        let log = ExecutionLog::new();
        log.append(entry_at(1, "deploy", "alice", ExecutionStatus::Success, ts(1)))
            .await;
        log.append(entry_at(2, "deploy", "bob", ExecutionStatus::Error, ts(2)))
            .await;
        log.append(entry_at(3, "notify", "alice", ExecutionStatus::Error, ts(3)))
            .await;
        log.append(entry_at(4, "deploy", "alice", ExecutionStatus::Error, ts(4)))
            .await;

        let page = log
            .query(&LogQuery {
                tool: Some("deploy".into()),
                agent_id: Some("alice".into()),
                status: Some(ExecutionStatus::Error),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].execution_id, "exec-4");
    }

    #[tokio::test]
    async fn test_time_bounds_are_inclusive() {
        let log = ExecutionLog::new();
        for minute in 1..=5 {
            log.append(entry_at(
                minute as usize,
                "tool",
                "agent",
                ExecutionStatus::Success,
                ts(minute),
            ))
            .await;
        }

        let page = log
            .query(&LogQuery {
                since: Some(ts(2)),
                until: Some(ts(4)),
                ..Default::default()
            })
            .await
            .unwrap();

        let ids: Vec<&str> = page.items.iter().map(|e| e.execution_id.as_str()).collect();
        assert_eq!(ids, vec!["exec-2", "exec-3", "exec-4"]);
    }

    #[tokio::test]
    async fn test_pagination_counts() {
        let log = ExecutionLog::new();
        for i in 0..25 {
            log.append(entry_at(i, "tool", "agent", ExecutionStatus::Success, ts(0)))
                .await;
        }

        let first = log.query(&LogQuery::default()).await.unwrap();
        assert_eq!(first.total, 25);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.items[0].execution_id, "exec-0");

        let last = log
            .query(&LogQuery {
                page: 3,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(last.items.len(), 5);
        assert_eq!(last.items[0].execution_id, "exec-20");

        // A page past the end is empty, not an error
        let beyond = log
            .query(&LogQuery {
                page: 4,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 25);
        assert_eq!(beyond.total_pages, 3);
    }

    #[tokio::test]
    async fn test_query_validation() {
        let log = ExecutionLog::new();

        let zero_page = LogQuery {
            page: 0,
            ..Default::default()
        };
        assert!(log.query(&zero_page).await.is_err());

        let oversized = LogQuery {
            page_size: 101,
            ..Default::default()
        };
        let err = log.query(&oversized).await.unwrap_err();
        assert!(err.is_user_error());
    }

    #[tokio::test]
    async fn test_empty_log_query() {
        let log = ExecutionLog::new();
        assert!(log.is_empty().await);

        let page = log.query(&LogQuery::default()).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
    }
}
