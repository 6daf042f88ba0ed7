use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::{ConnectionConfig, ConnectionIdentity};
use crate::credentials::{CredentialStore, NoCredentials};
use crate::driver::{ColumnInfo, DatabaseDriver, QueryOutput};
use crate::storage::{self, StateKey, StateStore};
use crate::validate::validate_connection_config;

pub const CONNECTION_HISTORY_LIMIT: usize = 10;
pub const DEFAULT_TABLE_PAGE_SIZE: u64 = 100;
pub const NOT_CONNECTED: &str = "Not connected to database";

/// Result of a session operation. Failures are reported here instead of
/// being raised to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub success: bool,
    pub message: String,
}

impl OperationOutcome {
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Recently used connection configs, most recent first, unique by identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHistory {
    entries: Vec<ConnectionConfig>,
    capacity: usize,
}

impl Default for ConnectionHistory {
    fn default() -> Self {
        Self::new(CONNECTION_HISTORY_LIMIT)
    }
}

impl ConnectionHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "connection history capacity must be greater than 0");
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Rebuilds a history from persisted entries, dropping duplicates and
    /// anything beyond capacity.
    #[must_use]
    pub fn from_entries(entries: Vec<ConnectionConfig>, capacity: usize) -> Self {
        let mut history = Self::new(capacity);
        for entry in entries {
            if history.entries.len() == capacity {
                break;
            }
            if !history.entries.iter().any(|kept| kept.same_identity(&entry)) {
                history.entries.push(entry);
            }
        }
        history
    }

    #[must_use]
    pub fn entries(&self) -> &[ConnectionConfig] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn find(&self, identity: &ConnectionIdentity) -> Option<&ConnectionConfig> {
        self.entries
            .iter()
            .find(|entry| &entry.identity() == identity)
    }

    pub fn push(&mut self, config: ConnectionConfig) {
        self.entries.retain(|entry| !entry.same_identity(&config));
        self.entries.insert(0, config);
        self.entries.truncate(self.capacity);
    }

    pub fn remove(&mut self, identity: &ConnectionIdentity) -> bool {
        let original_len = self.entries.len();
        self.entries.retain(|entry| &entry.identity() != identity);
        self.entries.len() != original_len
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Tracks whether we are connected, to what, and what was used recently.
///
/// At most one configuration is active; `current` is set exactly while
/// connected. The catalog belongs to the active connection and is emptied
/// whenever it goes away.
pub struct ConnectionSession<D: DatabaseDriver> {
    driver: Arc<D>,
    store: Arc<dyn StateStore>,
    credentials: Arc<dyn CredentialStore>,
    current: Option<ConnectionConfig>,
    history: ConnectionHistory,
    catalog: Catalog,
    table_page_size: u64,
}

impl<D: DatabaseDriver> std::fmt::Debug for ConnectionSession<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("current", &self.current)
            .field("history", &self.history)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl<D: DatabaseDriver> ConnectionSession<D> {
    #[must_use]
    pub fn new(driver: Arc<D>, store: Arc<dyn StateStore>) -> Self {
        let entries: Vec<ConnectionConfig> =
            storage::load_or_default(store.as_ref(), StateKey::ConnectionHistory);
        Self {
            driver,
            store,
            credentials: Arc::new(NoCredentials),
            current: None,
            history: ConnectionHistory::from_entries(entries, CONNECTION_HISTORY_LIMIT),
            catalog: Catalog::default(),
            table_page_size: DEFAULT_TABLE_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub fn with_table_page_size(mut self, table_page_size: u64) -> Self {
        self.table_page_size = table_page_size.max(1);
        self
    }

    /// Limits concurrent table info requests, normally to the pool size.
    #[must_use]
    pub fn with_info_concurrency(mut self, limit: usize) -> Self {
        self.catalog = std::mem::take(&mut self.catalog).with_info_concurrency(limit);
        self
    }

    #[must_use]
    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.current.is_some()
    }

    #[must_use]
    pub fn current(&self) -> Option<&ConnectionConfig> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn history(&self) -> &ConnectionHistory {
        &self.history
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn selected_database(&self) -> Option<&str> {
        self.catalog.selected_database()
    }

    pub async fn test_connection(&self, config: &ConnectionConfig) -> OperationOutcome {
        let config = config.clone().normalized();
        if let Err(error) = validate_connection_config(&config) {
            return OperationOutcome::failed(error.to_string());
        }

        match self.driver.test_connection(&config).await {
            Ok(()) => OperationOutcome::ok("Connection successful"),
            Err(error) => {
                tracing::info!(identity = %config.identity(), %error, "connection test failed");
                OperationOutcome::failed(error.to_string())
            }
        }
    }

    /// Connects with `config`, replacing any active connection.
    ///
    /// On failure the session is left exactly as it was.
    pub async fn connect(&mut self, config: ConnectionConfig) -> OperationOutcome {
        let config = config.normalized();
        if let Err(error) = validate_connection_config(&config) {
            return OperationOutcome::failed(error.to_string());
        }

        let identity = config.identity();
        if let Err(error) = self.driver.connect(&config).await {
            tracing::warn!(%identity, %error, "connect failed");
            return OperationOutcome::failed(error.to_string());
        }

        tracing::info!(%identity, "connected");
        self.catalog.clear();
        if !config.password.is_empty() {
            self.credentials.save(&identity, &config.password);
        }
        self.history.push(config.clone());
        self.persist_history();
        self.current = Some(config);

        if let Some(database) = self.current.as_ref().and_then(|c| c.database.clone()) {
            let outcome = self.load_tables(&database).await;
            if !outcome.success {
                tracing::warn!(%database, message = %outcome.message, "default database unavailable");
            }
        }
        let outcome = self.load_databases().await;
        if !outcome.success {
            tracing::warn!(message = %outcome.message, "database listing unavailable after connect");
        }

        OperationOutcome::ok(format!("Connected to {identity}"))
    }

    /// Connects to a history entry, filling in a remembered password.
    pub async fn reconnect(&mut self, identity: &ConnectionIdentity) -> OperationOutcome {
        let Some(entry) = self.history.find(identity) else {
            return OperationOutcome::failed(format!("{identity} is not in connection history"));
        };
        let mut config = entry.clone();
        if let Some(password) = self.credentials.load(identity) {
            config.password = password;
        }
        self.connect(config).await
    }

    /// Tears down the driver connection and resets local state. Local state
    /// is reset even if the driver reports an error during teardown.
    pub async fn disconnect(&mut self) -> OperationOutcome {
        let teardown = self.driver.disconnect().await;
        let previous = self.current.take();
        self.catalog.clear();

        match teardown {
            Ok(()) => {
                if let Some(previous) = previous {
                    tracing::info!(identity = %previous.identity(), "disconnected");
                }
                OperationOutcome::ok("Database connection closed")
            }
            Err(error) => {
                tracing::warn!(%error, "disconnect reported an error");
                OperationOutcome::failed(error.to_string())
            }
        }
    }

    /// Checks the active connection. Never changes session state.
    pub async fn ping(&self) -> bool {
        if !self.is_connected() {
            return false;
        }
        match self.driver.ping().await {
            Ok(()) => true,
            Err(error) => {
                tracing::debug!(%error, "ping failed");
                false
            }
        }
    }

    pub fn remove_from_history(&mut self, identity: &ConnectionIdentity) -> bool {
        if !self.history.remove(identity) {
            return false;
        }
        self.credentials.forget(identity);
        self.persist_history();
        true
    }

    pub fn clear_history(&mut self) {
        for entry in self.history.entries() {
            self.credentials.forget(&entry.identity());
        }
        self.history.clear();
        self.persist_history();
    }

    pub async fn load_databases(&mut self) -> OperationOutcome {
        if !self.is_connected() {
            return OperationOutcome::failed(NOT_CONNECTED);
        }
        match self.catalog.load_databases(self.driver.as_ref()).await {
            Ok(count) => OperationOutcome::ok(format!("Loaded {count} databases")),
            Err(error) => {
                tracing::warn!(%error, "failed to load databases");
                OperationOutcome::failed(format!("Failed to load databases: {error}"))
            }
        }
    }

    pub async fn refresh_databases(&mut self) -> OperationOutcome {
        self.load_databases().await
    }

    pub async fn load_tables(&mut self, database: &str) -> OperationOutcome {
        if !self.is_connected() {
            return OperationOutcome::failed(NOT_CONNECTED);
        }
        match self.catalog.load_tables(self.driver.as_ref(), database).await {
            Ok(count) => OperationOutcome::ok(format!("Loaded {count} tables from {database}")),
            Err(error) => {
                tracing::warn!(database, %error, "failed to load tables");
                OperationOutcome::failed(format!("Failed to load tables: {error}"))
            }
        }
    }

    /// Re-fetches the tables of the selected database, if any.
    pub async fn refresh_tables(&mut self) -> OperationOutcome {
        if !self.is_connected() {
            return OperationOutcome::failed(NOT_CONNECTED);
        }
        let Some(database) = self.catalog.selected_database().map(str::to_string) else {
            return OperationOutcome::ok("No database selected");
        };
        self.load_tables(&database).await
    }

    pub async fn table_structure(&self, database: &str, table: &str) -> Vec<ColumnInfo> {
        if !self.is_connected() {
            return Vec::new();
        }
        self.driver
            .table_structure(database, table)
            .await
            .unwrap_or_else(|error| {
                tracing::warn!(database, table, %error, "failed to load table structure");
                Vec::new()
            })
    }

    /// Fetches one page of rows; pages are `table_page_size` rows long.
    pub async fn table_data(&self, database: &str, table: &str, page: u64) -> QueryOutput {
        if !self.is_connected() {
            return QueryOutput::default();
        }
        let offset = page.saturating_mul(self.table_page_size);
        self.driver
            .table_data(database, table, self.table_page_size, offset)
            .await
            .unwrap_or_else(|error| {
                tracing::warn!(database, table, %error, "failed to load table data");
                QueryOutput::default()
            })
    }

    fn persist_history(&self) {
        if let Err(error) = storage::save(
            self.store.as_ref(),
            StateKey::ConnectionHistory,
            self.history.entries(),
        ) {
            tracing::warn!(%error, "failed to persist connection history");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::{ConnectionHistory, ConnectionSession, CONNECTION_HISTORY_LIMIT, NOT_CONNECTED};
    use crate::config::ConnectionConfig;
    use crate::credentials::MemoryCredentials;
    use crate::storage::{MemoryStateStore, StateStore};
    use crate::testing::FakeDriver;

    fn session() -> (Arc<FakeDriver>, Arc<dyn StateStore>, ConnectionSession<FakeDriver>) {
        let driver = Arc::new(FakeDriver::default());
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let session = ConnectionSession::new(Arc::clone(&driver), Arc::clone(&store));
        (driver, store, session)
    }

    fn host(name: &str) -> ConnectionConfig {
        ConnectionConfig::new(name, "root").with_password("secret")
    }

    fn history_hosts(session: &ConnectionSession<FakeDriver>) -> Vec<String> {
        session
            .history()
            .entries()
            .iter()
            .map(|entry| entry.host.clone())
            .collect()
    }

    #[tokio::test]
    async fn connect_sets_current_and_loads_databases() {
        let (_driver, _store, mut session) = session();

        let outcome = session.connect(host("db-a")).await;

        assert!(outcome.success, "{}", outcome.message);
        assert!(session.is_connected());
        assert_eq!(session.current().map(|c| c.host.as_str()), Some("db-a"));
        assert_eq!(session.catalog().databases(), ["app", "analytics"]);
    }

    #[tokio::test]
    async fn failed_connect_leaves_state_unchanged() {
        let (driver, _store, mut session) = session();
        session.connect(host("db-a")).await;
        driver.fail_connect.store(1, Ordering::SeqCst);

        let outcome = session.connect(host("db-b")).await;

        assert!(!outcome.success);
        assert_eq!(outcome.message, "Access denied for user");
        assert_eq!(session.current().map(|c| c.host.as_str()), Some("db-a"));
        assert_eq!(history_hosts(&session), vec!["db-a"]);
    }

    #[tokio::test]
    async fn connect_survives_failed_database_listing() {
        let (driver, _store, mut session) = session();
        driver.fail_databases.store(true, Ordering::SeqCst);

        let outcome = session.connect(host("db-a")).await;

        assert!(outcome.success);
        assert!(session.is_connected());
        assert!(session.catalog().databases().is_empty());
        assert!(!session.refresh_databases().await.success);
    }

    #[tokio::test]
    async fn padded_host_is_trimmed_before_reaching_driver() {
        let (driver, _store, mut session) = session();
        let mut config = host("db-a");
        config.host = "  db-a \t".to_string();
        config.user = " root ".to_string();

        assert!(session.test_connection(&config).await.success);
        let outcome = session.connect(config).await;

        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(
            driver.last_connect_host.lock().expect("host lock").as_deref(),
            Some("db-a")
        );
        assert_eq!(session.current().map(|c| c.user.as_str()), Some("root"));
        assert_eq!(history_hosts(&session), vec!["db-a"]);
    }

    #[tokio::test]
    async fn invalid_config_never_reaches_driver() {
        let (driver, _store, mut session) = session();

        let outcome = session.connect(ConnectionConfig::new("", "root")).await;

        assert!(!outcome.success);
        assert_eq!(driver.connect_calls.load(Ordering::SeqCst), 0);
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn reconnecting_moves_identity_to_front() {
        let (_driver, _store, mut session) = session();
        session.connect(host("host-a")).await;
        session.connect(host("host-b")).await;
        let before = session.history().len();

        session.connect(host("host-a")).await;

        assert_eq!(history_hosts(&session), vec!["host-a", "host-b"]);
        assert!(session.history().len() <= before);
    }

    #[tokio::test]
    async fn history_keeps_ten_most_recent() {
        let (_driver, _store, mut session) = session();
        for index in 0..15 {
            session.connect(host(&format!("host-{index}"))).await;
        }

        let hosts = history_hosts(&session);
        assert_eq!(hosts.len(), CONNECTION_HISTORY_LIMIT);
        let expected = (5..15)
            .rev()
            .map(|index| format!("host-{index}"))
            .collect::<Vec<_>>();
        assert_eq!(hosts, expected);
    }

    #[tokio::test]
    async fn history_is_persisted_and_reloaded() {
        let (driver, store, mut session) = session();
        session.connect(host("host-a")).await;
        session.connect(host("host-b")).await;

        let reloaded = ConnectionSession::new(driver, store);
        assert_eq!(history_hosts(&reloaded), vec!["host-b", "host-a"]);
        assert!(reloaded.history().entries()[0].password.is_empty());
        assert!(!reloaded.is_connected());
    }

    #[tokio::test]
    async fn disconnect_clears_current_and_catalog() {
        let (driver, _store, mut session) = session();
        session.connect(host("db-a")).await;
        session.load_tables("app").await;
        assert!(!session.catalog().is_empty());

        let outcome = session.disconnect().await;

        assert!(outcome.success);
        assert!(!session.is_connected());
        assert!(session.current().is_none());
        assert!(session.catalog().is_empty());
        assert_eq!(driver.disconnect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disconnect_resets_state_even_when_teardown_fails() {
        let (driver, _store, mut session) = session();
        session.connect(host("db-a")).await;
        driver.fail_disconnect.store(true, Ordering::SeqCst);

        let outcome = session.disconnect().await;

        assert!(!outcome.success);
        assert!(!session.is_connected());
        assert!(session.catalog().is_empty());
    }

    #[tokio::test]
    async fn history_edits_do_not_touch_active_connection() {
        let (_driver, _store, mut session) = session();
        session.connect(host("host-a")).await;
        session.connect(host("host-b")).await;

        assert!(session.remove_from_history(&host("host-a").identity()));
        assert!(!session.remove_from_history(&host("host-a").identity()));
        assert_eq!(history_hosts(&session), vec!["host-b"]);

        session.clear_history();
        assert!(session.history().is_empty());
        assert_eq!(session.current().map(|c| c.host.as_str()), Some("host-b"));
    }

    #[tokio::test]
    async fn reconnect_uses_remembered_password() {
        let driver = Arc::new(FakeDriver::default());
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let credentials = Arc::new(MemoryCredentials::default());
        let mut session = ConnectionSession::new(Arc::clone(&driver), Arc::clone(&store))
            .with_credentials(credentials.clone());
        session.connect(host("host-a")).await;
        session.disconnect().await;

        let outcome = session.reconnect(&host("host-a").identity()).await;

        assert!(outcome.success);
        assert_eq!(
            session.current().map(|c| c.password.as_str()),
            Some("secret")
        );

        session.remove_from_history(&host("host-a").identity());
        assert!(crate::credentials::CredentialStore::load(
            credentials.as_ref(),
            &host("host-a").identity()
        )
        .is_none());
    }

    #[tokio::test]
    async fn catalog_loads_fail_while_disconnected() {
        let (driver, _store, mut session) = session();

        let databases = session.load_databases().await;
        let tables = session.load_tables("app").await;

        assert!(!databases.success);
        assert!(!tables.success);
        assert_eq!(tables.message, NOT_CONNECTED);
        assert!(!session.refresh_databases().await.success);
        assert!(!session.refresh_tables().await.success);
        assert!(session.catalog().is_empty());
        assert!(session.selected_database().is_none());
        assert_eq!(driver.table_info_calls.load(Ordering::SeqCst), 0);
        assert!(!session.ping().await);
    }

    #[tokio::test]
    async fn table_listing_stays_within_info_concurrency() {
        let driver = Arc::new(FakeDriver::default());
        *driver.tables.lock().expect("tables lock") = (0..6)
            .map(|index| crate::driver::TableDescriptor::table(format!("t{index}")))
            .collect();
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let mut session =
            ConnectionSession::new(Arc::clone(&driver), store).with_info_concurrency(2);
        session.connect(host("db-a")).await;

        let outcome = session.load_tables("app").await;

        assert!(outcome.success);
        assert_eq!(session.catalog().tables().len(), 6);
        assert!(driver.max_info_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn table_data_pages_by_configured_size() {
        let driver = Arc::new(FakeDriver::default());
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let mut session = ConnectionSession::new(driver, store).with_table_page_size(25);
        session.connect(host("db-a")).await;

        let page = session.table_data("app", "users", 2).await;

        assert_eq!(page.rows[0][0].as_u64(), Some(25));
        assert_eq!(page.rows[0][1].as_u64(), Some(50));
    }

    #[tokio::test]
    async fn table_structure_requires_connection() {
        let (_driver, _store, mut session) = session();
        assert!(session.table_structure("app", "users").await.is_empty());

        session.connect(host("db-a")).await;
        let columns = session.table_structure("app", "users").await;

        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].name, "id");
    }

    #[test]
    fn from_entries_drops_duplicates_and_overflow() {
        let mut entries = vec![host("a"), host("b"), host("a")];
        entries.extend((0..20).map(|index| host(&format!("extra-{index}"))));

        let history = ConnectionHistory::from_entries(entries, 10);

        assert_eq!(history.len(), 10);
        assert_eq!(history.entries()[0].host, "a");
        assert_eq!(history.entries()[1].host, "b");
        assert_eq!(history.entries()[2].host, "extra-0");
    }
}
