use futures_util::stream::{self, StreamExt};

use crate::driver::{DatabaseDriver, DriverError, TableDescriptor, TableInfo, TableKind};

/// Table info requests kept in flight at once while enriching a listing.
pub const DEFAULT_INFO_CONCURRENCY: usize = 10;

const SYSTEM_DATABASES: [&str; 4] = ["information_schema", "mysql", "performance_schema", "sys"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub name: String,
    pub kind: TableKind,
    pub info: TableInfo,
}

/// Database and table listing cached for the active connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    databases: Vec<String>,
    tables: Vec<TableSummary>,
    selected_database: Option<String>,
    info_concurrency: usize,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            databases: Vec::new(),
            tables: Vec::new(),
            selected_database: None,
            info_concurrency: DEFAULT_INFO_CONCURRENCY,
        }
    }
}

impl Catalog {
    /// Caps concurrent table info requests; keep it at or below the pool size
    /// so queued requests do not time out waiting for a connection.
    #[must_use]
    pub fn with_info_concurrency(mut self, limit: usize) -> Self {
        self.info_concurrency = limit.max(1);
        self
    }

    #[must_use]
    pub fn databases(&self) -> &[String] {
        &self.databases
    }

    #[must_use]
    pub fn tables(&self) -> &[TableSummary] {
        &self.tables
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSummary> {
        self.tables.iter().find(|table| table.name == name)
    }

    #[must_use]
    pub fn selected_database(&self) -> Option<&str> {
        self.selected_database.as_deref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.databases.is_empty() && self.tables.is_empty() && self.selected_database.is_none()
    }

    pub fn clear(&mut self) {
        self.databases.clear();
        self.tables.clear();
        self.selected_database = None;
    }

    pub async fn load_databases<D>(&mut self, driver: &D) -> Result<usize, DriverError>
    where
        D: DatabaseDriver + ?Sized,
    {
        self.databases = driver.databases().await?;
        tracing::debug!(count = self.databases.len(), "loaded databases");
        Ok(self.databases.len())
    }

    /// Selects `database` and replaces the table list with its tables.
    ///
    /// Switching databases drops the previous listing up front, so a failed
    /// fetch leaves an empty list rather than another database's tables.
    pub async fn load_tables<D>(&mut self, driver: &D, database: &str) -> Result<usize, DriverError>
    where
        D: DatabaseDriver + ?Sized,
    {
        if self.selected_database.as_deref() != Some(database) {
            self.tables.clear();
            self.selected_database = Some(database.to_string());
        }

        let descriptors = driver.tables(database).await?;
        self.tables = enrich_tables(driver, database, descriptors, self.info_concurrency).await;
        tracing::debug!(database, count = self.tables.len(), "loaded tables");
        Ok(self.tables.len())
    }
}

async fn enrich_tables<D>(
    driver: &D,
    database: &str,
    descriptors: Vec<TableDescriptor>,
    concurrency: usize,
) -> Vec<TableSummary>
where
    D: DatabaseDriver + ?Sized,
{
    let infos = stream::iter(
        descriptors
            .iter()
            .map(|descriptor| driver.table_info(database, &descriptor.name)),
    )
    .buffered(concurrency)
    .collect::<Vec<_>>()
    .await;

    descriptors
        .into_iter()
        .zip(infos)
        .map(|(descriptor, info)| {
            let info = info.unwrap_or_else(|error| {
                tracing::debug!(database, table = %descriptor.name, %error, "table info unavailable");
                TableInfo::placeholder()
            });
            TableSummary {
                name: descriptor.name,
                kind: descriptor.kind,
                info,
            }
        })
        .collect()
}

#[must_use]
pub fn is_system_database(name: &str) -> bool {
    SYSTEM_DATABASES
        .iter()
        .any(|system| system.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::{is_system_database, Catalog};
    use crate::driver::{TableDescriptor, TableInfo};
    use crate::testing::FakeDriver;

    #[tokio::test]
    async fn load_tables_selects_database_and_enriches_each_table() {
        let driver = FakeDriver::default();
        let mut catalog = Catalog::default();

        let count = catalog
            .load_tables(&driver, "app")
            .await
            .expect("tables should load");

        assert_eq!(count, 2);
        assert_eq!(catalog.selected_database(), Some("app"));
        assert_eq!(driver.table_info_calls.load(Ordering::SeqCst), 2);
        let users = catalog.table("users").expect("users table listed");
        assert_eq!(users.info.rows, 42);
        assert_eq!(users.info.engine, "InnoDB");
    }

    #[tokio::test]
    async fn per_table_info_failure_uses_placeholder() {
        let driver = FakeDriver::default();
        driver
            .broken_info_tables
            .lock()
            .expect("broken lock")
            .push("sessions".to_string());
        let mut catalog = Catalog::default();

        catalog
            .load_tables(&driver, "app")
            .await
            .expect("listing should survive a broken table");

        assert_eq!(catalog.tables().len(), 2);
        let sessions = catalog.table("sessions").expect("sessions still listed");
        assert_eq!(sessions.info, TableInfo::placeholder());
        assert_eq!(catalog.table("users").map(|t| t.info.rows), Some(42));
    }

    #[tokio::test]
    async fn table_info_requests_respect_concurrency_limit() {
        let driver = FakeDriver::default();
        *driver.tables.lock().expect("tables lock") = (0..12)
            .map(|index| TableDescriptor::table(format!("t{index}")))
            .collect();
        let mut catalog = Catalog::default().with_info_concurrency(3);

        let count = catalog
            .load_tables(&driver, "app")
            .await
            .expect("tables should load");

        assert_eq!(count, 12);
        assert_eq!(driver.table_info_calls.load(Ordering::SeqCst), 12);
        let peak = driver.max_info_in_flight.load(Ordering::SeqCst);
        assert!(peak <= 3, "{peak} requests in flight");
        assert!(peak > 1, "requests should still overlap");
        let names = catalog
            .tables()
            .iter()
            .map(|table| table.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names.first(), Some(&"t0"));
        assert_eq!(names.last(), Some(&"t11"));
    }

    #[tokio::test]
    async fn switching_database_replaces_tables() {
        let driver = FakeDriver::default();
        let mut catalog = Catalog::default();
        catalog
            .load_tables(&driver, "app")
            .await
            .expect("tables should load");

        *driver.tables.lock().expect("tables lock") =
            vec![crate::driver::TableDescriptor::table("events")];
        catalog
            .load_tables(&driver, "analytics")
            .await
            .expect("tables should load");

        assert_eq!(catalog.selected_database(), Some("analytics"));
        let names = catalog
            .tables()
            .iter()
            .map(|table| table.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["events"]);
    }

    #[tokio::test]
    async fn clear_empties_everything() {
        let driver = FakeDriver::default();
        let mut catalog = Catalog::default();
        catalog
            .load_databases(&driver)
            .await
            .expect("databases should load");
        catalog
            .load_tables(&driver, "app")
            .await
            .expect("tables should load");
        assert!(!catalog.is_empty());

        catalog.clear();
        assert!(catalog.is_empty());
        assert!(catalog.databases().is_empty());
        assert!(catalog.selected_database().is_none());
    }

    #[test]
    fn recognizes_system_databases() {
        assert!(is_system_database("information_schema"));
        assert!(is_system_database("MySQL"));
        assert!(!is_system_database("app"));
    }
}
