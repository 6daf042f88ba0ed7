use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const QUERY_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryHistoryEntry {
    pub id: Uuid,
    pub query: String,
    #[serde(default)]
    pub database: Option<String>,
    pub execution_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub affected_rows: Option<u64>,
}

impl QueryHistoryEntry {
    #[must_use]
    pub fn succeeded(
        query: impl Into<String>,
        database: Option<String>,
        execution_time_ms: u64,
        affected_rows: Option<u64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            database,
            execution_time_ms,
            timestamp: Utc::now(),
            success: true,
            error: None,
            affected_rows,
        }
    }

    #[must_use]
    pub fn failed(
        query: impl Into<String>,
        database: Option<String>,
        execution_time_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            database,
            execution_time_ms,
            timestamp: Utc::now(),
            success: false,
            error: Some(error.into()),
            affected_rows: None,
        }
    }
}

/// Executed statements, newest first. Older entries fall off once the
/// capacity is reached.
#[derive(Debug, Clone)]
pub struct QueryHistory {
    capacity: usize,
    entries: VecDeque<QueryHistoryEntry>,
    total_recorded: u64,
}

impl Default for QueryHistory {
    fn default() -> Self {
        Self::new(QUERY_HISTORY_LIMIT)
    }
}

impl QueryHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "query history capacity must be greater than 0");
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            total_recorded: 0,
        }
    }

    /// Restores persisted entries, which are stored newest first.
    #[must_use]
    pub fn from_entries(entries: Vec<QueryHistoryEntry>, capacity: usize) -> Self {
        let mut history = Self::new(capacity);
        history.entries = entries.into_iter().take(capacity).collect();
        history
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries recorded since this history was created, including evicted ones.
    #[must_use]
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    pub fn record(&mut self, entry: QueryHistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(entry);
        self.total_recorded += 1;
    }

    #[must_use]
    pub fn latest(&self) -> Option<&QueryHistoryEntry> {
        self.entries.front()
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&QueryHistoryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryHistoryEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<QueryHistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
