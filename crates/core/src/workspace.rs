use std::sync::Arc;

use uuid::Uuid;

use crate::autocomplete;
use crate::config::{ConnectionConfig, ConnectionIdentity};
use crate::connection_session::{ConnectionSession, OperationOutcome};
use crate::credentials::CredentialStore;
use crate::driver::{ColumnInfo, DatabaseDriver, QueryOutput};
use crate::notifications::{Notifier, ToastLevel};
use crate::preferences::Preferences;
use crate::query_session::{ExecutionId, QueryResult, QuerySession};
use crate::query_tabs::{CloseOutcome, QueryTab, TabId};
use crate::settings::Settings;
use crate::storage::StateStore;

/// Everything a front end needs, wired together: one connection, the query
/// editor state, user feedback and preferences.
pub struct Workspace<D: DatabaseDriver> {
    connection: ConnectionSession<D>,
    queries: QuerySession,
    notifier: Notifier,
    preferences: Preferences,
}

impl<D: DatabaseDriver> std::fmt::Debug for Workspace<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("connection", &self.connection)
            .field("queries", &self.queries)
            .field("notifier", &self.notifier)
            .field("preferences", &self.preferences)
            .finish()
    }
}

impl<D: DatabaseDriver> Workspace<D> {
    /// Loads persisted state and opens the default tab.
    #[must_use]
    pub fn open(driver: Arc<D>, store: Arc<dyn StateStore>, settings: &Settings) -> Self {
        let connection = ConnectionSession::new(driver, Arc::clone(&store))
            .with_table_page_size(settings.table_page_size)
            .with_info_concurrency(settings.max_connections);
        let mut queries = QuerySession::load(Arc::clone(&store));
        queries.create_tab("", None);
        tracing::debug!(
            history = connection.history().len(),
            queries = queries.history().len(),
            bookmarks = queries.bookmarks().len(),
            "workspace state loaded"
        );

        Self {
            connection,
            queries,
            notifier: Notifier::new(),
            preferences: Preferences::load(store),
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.connection = self.connection.with_credentials(credentials);
        self
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionSession<D> {
        &self.connection
    }

    #[must_use]
    pub fn queries(&self) -> &QuerySession {
        &self.queries
    }

    pub fn queries_mut(&mut self) -> &mut QuerySession {
        &mut self.queries
    }

    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut Notifier {
        &mut self.notifier
    }

    #[must_use]
    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn preferences_mut(&mut self) -> &mut Preferences {
        &mut self.preferences
    }

    pub async fn test_connection(&mut self, config: &ConnectionConfig) -> OperationOutcome {
        self.notifier.set_loading(true, "Testing connection...");
        let outcome = self.connection.test_connection(config).await;
        self.notifier.set_loading(false, "");
        if outcome.success {
            self.notifier.show(
                ToastLevel::Success,
                "Connection successful",
                "Database connection established successfully",
            );
        } else {
            self.notifier
                .show(ToastLevel::Error, "Connection failed", outcome.message.clone());
        }
        outcome
    }

    pub async fn connect(&mut self, config: ConnectionConfig) -> OperationOutcome {
        self.notifier.set_loading(true, "Connecting...");
        let outcome = self.connection.connect(config).await;
        self.notifier.set_loading(false, "");
        self.announce_connect(&outcome);
        outcome
    }

    pub async fn reconnect(&mut self, identity: &ConnectionIdentity) -> OperationOutcome {
        self.notifier.set_loading(true, "Connecting...");
        let outcome = self.connection.reconnect(identity).await;
        self.notifier.set_loading(false, "");
        self.announce_connect(&outcome);
        outcome
    }

    pub async fn disconnect(&mut self) -> OperationOutcome {
        let outcome = self.connection.disconnect().await;
        if outcome.success {
            self.notifier
                .show(ToastLevel::Info, "Disconnected", "Database connection closed");
        } else {
            self.notifier.show(
                ToastLevel::Warning,
                "Disconnected",
                format!("Connection closed with an error: {}", outcome.message),
            );
        }
        outcome
    }

    pub async fn ping(&self) -> bool {
        self.connection.ping().await
    }

    pub fn remove_from_history(&mut self, identity: &ConnectionIdentity) -> bool {
        self.connection.remove_from_history(identity)
    }

    pub fn clear_connection_history(&mut self) {
        self.connection.clear_history();
    }

    pub async fn select_database(&mut self, database: &str) -> OperationOutcome {
        let outcome = self.connection.load_tables(database).await;
        if outcome.success {
            self.notifier.show(
                ToastLevel::Success,
                "Database selected",
                format!("Now using database: {database}"),
            );
        } else {
            self.report_catalog_failure(&outcome);
        }
        outcome
    }

    pub async fn refresh_databases(&mut self) -> OperationOutcome {
        let outcome = self.connection.refresh_databases().await;
        if !outcome.success {
            self.report_catalog_failure(&outcome);
        }
        outcome
    }

    pub async fn refresh_tables(&mut self) -> OperationOutcome {
        let outcome = self.connection.refresh_tables().await;
        if !outcome.success {
            self.report_catalog_failure(&outcome);
        }
        outcome
    }

    pub async fn table_structure(&self, database: &str, table: &str) -> Vec<ColumnInfo> {
        self.connection.table_structure(database, table).await
    }

    pub async fn table_data(&self, database: &str, table: &str, page: u64) -> QueryOutput {
        self.connection.table_data(database, table, page).await
    }

    /// Opens a tab bound to the selected database.
    pub fn create_tab(&mut self, content: impl Into<String>) -> TabId {
        let database = self.connection.selected_database().map(str::to_string);
        self.queries.create_tab(content, database)
    }

    pub fn close_tab<F>(&mut self, id: TabId, confirm: F) -> CloseOutcome
    where
        F: FnOnce(&QueryTab) -> bool,
    {
        self.queries.close_tab(id, confirm)
    }

    pub async fn execute_query(
        &mut self,
        query: Option<&str>,
        tab_id: Option<TabId>,
    ) -> Option<QueryResult> {
        self.queries
            .execute_query(&self.connection, &mut self.notifier, query, tab_id)
            .await
    }

    pub fn cancel_execution(&mut self, id: ExecutionId) -> bool {
        self.queries.cancel_execution(id, &mut self.notifier)
    }

    /// Bookmarks `query` against the selected database.
    pub fn add_bookmark(
        &mut self,
        title: impl Into<String>,
        query: impl Into<String>,
        tags: impl IntoIterator<Item = String>,
    ) -> Uuid {
        let database = self.connection.selected_database().map(str::to_string);
        let id = self.queries.add_bookmark(title, query, database, tags);
        self.notifier.success("Bookmark added successfully");
        id
    }

    pub fn remove_bookmark(&mut self, id: Uuid) -> bool {
        let removed = self.queries.remove_bookmark(id);
        if removed {
            self.notifier.info("Bookmark removed");
        }
        removed
    }

    pub fn open_bookmark(&mut self, id: Uuid) -> Option<TabId> {
        self.queries.open_bookmark(id)
    }

    #[must_use]
    pub fn completions(&self, prefix: &str) -> Vec<String> {
        autocomplete::completions_with_prefix(self.connection.catalog(), prefix)
    }

    fn announce_connect(&mut self, outcome: &OperationOutcome) {
        if outcome.success {
            self.notifier.show(
                ToastLevel::Success,
                "Connected",
                "Successfully connected to database",
            );
        } else {
            self.notifier
                .show(ToastLevel::Error, "Connection failed", outcome.message.clone());
        }
    }

    fn report_catalog_failure(&mut self, outcome: &OperationOutcome) {
        if self.connection.is_connected() {
            self.notifier.error(outcome.message.clone());
        } else {
            self.notifier.warning(outcome.message.clone());
        }
    }
}
