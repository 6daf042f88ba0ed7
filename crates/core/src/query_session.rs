use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::bookmarks::{BookmarkBook, BookmarkUpdate, QueryBookmark};
use crate::connection_session::{ConnectionSession, NOT_CONNECTED};
use crate::driver::{DatabaseDriver, DriverError, QueryOutput};
use crate::notifications::Notifier;
use crate::query_history::{QueryHistory, QueryHistoryEntry, QUERY_HISTORY_LIMIT};
use crate::query_tabs::{CloseOutcome, QueryTab, TabId, TabSet};
use crate::storage::{self, StateKey, StateStore};

/// Finished execution records kept for inspection; running ones are never
/// dropped.
const EXECUTION_LOG_LIMIT: usize = 50;
const EXECUTING_MESSAGE: &str = "Executing query...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionId(u64);

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Running,
    Completed,
    Error,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub output: QueryOutput,
    pub execution_time_ms: u64,
    pub query: String,
}

#[derive(Debug, Clone)]
pub struct QueryExecution {
    pub id: ExecutionId,
    /// The tab that started the execution. It may have been closed since.
    pub tab_id: Option<TabId>,
    pub query: String,
    pub database: Option<String>,
    pub started_at: Instant,
    pub finished_at: Option<Instant>,
    pub status: ExecutionStatus,
    pub result: Option<QueryResult>,
    pub error: Option<String>,
}

impl QueryExecution {
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        let end = self.finished_at.unwrap_or_else(Instant::now);
        millis_between(self.started_at, end)
    }
}

/// Handed out by [`QuerySession::begin_execution`]; the caller runs `query`
/// against the driver and reports back through `finish_execution`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingExecution {
    pub id: ExecutionId,
    pub query: String,
}

/// Editor tabs, in-flight executions, history and bookmarks.
pub struct QuerySession {
    store: Arc<dyn StateStore>,
    tabs: TabSet,
    executions: Vec<QueryExecution>,
    next_execution: u64,
    history: QueryHistory,
    bookmarks: BookmarkBook,
}

impl fmt::Debug for QuerySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySession")
            .field("tabs", &self.tabs)
            .field("executions", &self.executions)
            .field("history", &self.history.len())
            .field("bookmarks", &self.bookmarks.len())
            .finish_non_exhaustive()
    }
}

impl QuerySession {
    #[must_use]
    pub fn load(store: Arc<dyn StateStore>) -> Self {
        let entries: Vec<QueryHistoryEntry> =
            storage::load_or_default(store.as_ref(), StateKey::QueryHistory);
        let bookmarks = BookmarkBook::load(Arc::clone(&store));
        Self {
            store,
            tabs: TabSet::default(),
            executions: Vec::new(),
            next_execution: 1,
            history: QueryHistory::from_entries(entries, QUERY_HISTORY_LIMIT),
            bookmarks,
        }
    }

    #[must_use]
    pub fn tabs(&self) -> &TabSet {
        &self.tabs
    }

    #[must_use]
    pub fn active_tab(&self) -> Option<&QueryTab> {
        self.tabs.active()
    }

    pub fn create_tab(&mut self, content: impl Into<String>, database: Option<String>) -> TabId {
        self.tabs.create(content, database)
    }

    pub fn update_tab_content(&mut self, id: TabId, content: impl Into<String>) -> bool {
        self.tabs.update_content(id, content)
    }

    pub fn save_tab(&mut self, id: TabId) -> bool {
        self.tabs.mark_saved(id)
    }

    pub fn rename_tab(&mut self, id: TabId, title: impl Into<String>) -> bool {
        self.tabs.rename(id, title)
    }

    pub fn set_tab_database(&mut self, id: TabId, database: Option<String>) -> bool {
        self.tabs.set_database(id, database)
    }

    pub fn set_active_tab(&mut self, id: TabId) -> bool {
        self.tabs.set_active(id)
    }

    pub fn close_tab<F>(&mut self, id: TabId, confirm: F) -> CloseOutcome
    where
        F: FnOnce(&QueryTab) -> bool,
    {
        self.tabs.close(id, confirm)
    }

    /// True when the active tab holds something worth sending.
    #[must_use]
    pub fn can_execute(&self, connected: bool) -> bool {
        connected
            && self
                .tabs
                .active()
                .is_some_and(|tab| !tab.content.trim().is_empty())
    }

    #[must_use]
    pub fn executions(&self) -> &[QueryExecution] {
        &self.executions
    }

    #[must_use]
    pub fn execution(&self, id: ExecutionId) -> Option<&QueryExecution> {
        self.executions.iter().find(|execution| execution.id == id)
    }

    #[must_use]
    pub fn running_count(&self) -> usize {
        self.executions
            .iter()
            .filter(|execution| execution.status == ExecutionStatus::Running)
            .count()
    }

    /// Runs a statement on the active connection.
    ///
    /// `query` wins over the tab buffer; the tab is `tab_id` or the active
    /// tab. Every attempt that reaches the driver lands in history.
    pub async fn execute_query<D: DatabaseDriver>(
        &mut self,
        connection: &ConnectionSession<D>,
        notifier: &mut Notifier,
        query: Option<&str>,
        tab_id: Option<TabId>,
    ) -> Option<QueryResult> {
        let pending = self.begin_execution(
            connection.is_connected(),
            query,
            tab_id,
            connection.selected_database(),
            notifier,
        )?;
        let outcome = connection.driver().execute(&pending.query).await;
        self.finish_execution(pending.id, outcome, notifier)
    }

    /// First half of [`Self::execute_query`]: checks preconditions, resolves
    /// the SQL and records a running execution. Returns `None` when nothing
    /// should be sent to the driver.
    pub fn begin_execution(
        &mut self,
        connected: bool,
        query: Option<&str>,
        tab_id: Option<TabId>,
        selected_database: Option<&str>,
        notifier: &mut Notifier,
    ) -> Option<PendingExecution> {
        if !connected {
            notifier.warning(NOT_CONNECTED);
            return None;
        }

        let tab_id = tab_id.or_else(|| self.tabs.active_id());
        let tab = tab_id.and_then(|id| self.tabs.get(id));
        let sql = match query {
            Some(query) => query.to_string(),
            None => tab.map(|tab| tab.content.clone()).unwrap_or_default(),
        };
        if sql.trim().is_empty() {
            notifier.warning("No query to execute");
            return None;
        }
        let database = tab
            .and_then(|tab| tab.database.clone())
            .or_else(|| selected_database.map(str::to_string));

        let id = ExecutionId(self.next_execution);
        self.next_execution += 1;
        self.executions.push(QueryExecution {
            id,
            tab_id,
            query: sql.clone(),
            database,
            started_at: Instant::now(),
            finished_at: None,
            status: ExecutionStatus::Running,
            result: None,
            error: None,
        });
        notifier.set_loading(true, EXECUTING_MESSAGE);
        tracing::debug!(execution = %id, "query started");

        Some(PendingExecution { id, query: sql })
    }

    /// Second half of [`Self::execute_query`]: records the driver outcome.
    ///
    /// A cancelled execution still lands in history, but keeps its
    /// `Cancelled` status and yields no result.
    pub fn finish_execution(
        &mut self,
        id: ExecutionId,
        outcome: Result<QueryOutput, DriverError>,
        notifier: &mut Notifier,
    ) -> Option<QueryResult> {
        let finished_at = Instant::now();
        let Some(execution) = self.executions.iter_mut().find(|execution| execution.id == id)
        else {
            tracing::warn!(execution = %id, "finished an unknown execution");
            return None;
        };
        let cancelled = execution.status == ExecutionStatus::Cancelled;
        if execution.finished_at.is_none() {
            execution.finished_at = Some(finished_at);
        }
        let elapsed = millis_between(execution.started_at, finished_at);
        let query = execution.query.clone();
        let database = execution.database.clone();

        let (entry, result) = match outcome {
            Ok(output) => {
                let entry = QueryHistoryEntry::succeeded(
                    query.clone(),
                    database,
                    elapsed,
                    output.affected_rows,
                );
                let result = QueryResult {
                    output,
                    execution_time_ms: elapsed,
                    query,
                };
                if !cancelled {
                    execution.status = ExecutionStatus::Completed;
                    execution.result = Some(result.clone());
                }
                (entry, (!cancelled).then_some(result))
            }
            Err(error) => {
                let message = error.to_string();
                if !cancelled {
                    execution.status = ExecutionStatus::Error;
                    execution.error = Some(message.clone());
                }
                let entry = QueryHistoryEntry::failed(query, database, elapsed, message);
                (entry, None)
            }
        };

        if cancelled {
            tracing::debug!(execution = %id, "cancelled query finished");
        } else if let Some(result) = &result {
            tracing::info!(execution = %id, elapsed_ms = elapsed, rows = result.output.rows.len(), "query completed");
            notifier.success(format!("Query executed successfully ({elapsed}ms)"));
        } else if let Some(error) = &entry.error {
            notifier.error(format!("Query failed: {error}"));
        }

        self.record_history(entry);
        self.prune_executions();
        self.update_loading(notifier);
        result
    }

    /// Marks a running execution cancelled. The driver call itself keeps
    /// going; its outcome is recorded in history but never returned.
    pub fn cancel_execution(&mut self, id: ExecutionId, notifier: &mut Notifier) -> bool {
        let Some(execution) = self
            .executions
            .iter_mut()
            .find(|execution| execution.id == id && execution.status == ExecutionStatus::Running)
        else {
            return false;
        };
        execution.status = ExecutionStatus::Cancelled;
        execution.finished_at = Some(Instant::now());
        notifier.info("Query cancelled");
        self.update_loading(notifier);
        true
    }

    #[must_use]
    pub fn history(&self) -> &QueryHistory {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.persist_history();
    }

    /// Opens a history entry in a fresh tab.
    pub fn open_history_entry(&mut self, id: Uuid) -> Option<TabId> {
        let entry = self.history.get(id)?;
        let (query, database) = (entry.query.clone(), entry.database.clone());
        Some(self.tabs.create(query, database))
    }

    #[must_use]
    pub fn bookmarks(&self) -> &BookmarkBook {
        &self.bookmarks
    }

    pub fn add_bookmark(
        &mut self,
        title: impl Into<String>,
        query: impl Into<String>,
        database: Option<String>,
        tags: impl IntoIterator<Item = String>,
    ) -> Uuid {
        self.bookmarks
            .add(QueryBookmark::new(title, query, database, tags))
    }

    pub fn update_bookmark(&mut self, id: Uuid, update: BookmarkUpdate) -> bool {
        self.bookmarks.update(id, update)
    }

    pub fn remove_bookmark(&mut self, id: Uuid) -> bool {
        self.bookmarks.remove(id)
    }

    #[must_use]
    pub fn bookmarks_tagged(&self, tag: &str) -> Vec<&QueryBookmark> {
        self.bookmarks.tagged(tag)
    }

    /// Opens a bookmark in a new tab named after it.
    pub fn open_bookmark(&mut self, id: Uuid) -> Option<TabId> {
        let bookmark = self.bookmarks.get(id)?;
        let (title, query, database) = (
            bookmark.title.clone(),
            bookmark.query.clone(),
            bookmark.database.clone(),
        );
        Some(self.tabs.create_titled(title, query, database))
    }

    fn record_history(&mut self, entry: QueryHistoryEntry) {
        self.history.record(entry);
        self.persist_history();
    }

    fn persist_history(&self) {
        if let Err(error) = storage::save(
            self.store.as_ref(),
            StateKey::QueryHistory,
            &self.history.to_vec(),
        ) {
            tracing::warn!(%error, "failed to persist query history");
        }
    }

    fn prune_executions(&mut self) {
        let mut excess = self.executions.len().saturating_sub(EXECUTION_LOG_LIMIT);
        self.executions.retain(|execution| {
            if excess > 0 && execution.status != ExecutionStatus::Running {
                excess -= 1;
                return false;
            }
            true
        });
    }

    fn update_loading(&self, notifier: &mut Notifier) {
        if self.running_count() == 0 {
            notifier.set_loading(false, "");
        }
    }
}

fn millis_between(start: Instant, end: Instant) -> u64 {
    u64::try_from(end.saturating_duration_since(start).as_millis()).unwrap_or(u64::MAX)
}
