use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::config::ConnectionConfig;
use crate::driver::{
    ColumnInfo, ColumnKey, ColumnMeta, DatabaseDriver, DriverError, QueryOutput, TableDescriptor,
    TableInfo,
};
use crate::value::SqlValue;

/// In-memory driver used by the session tests. Statements containing
/// `FAIL` are rejected; everything else returns a single `1` row.
#[derive(Debug)]
pub(crate) struct FakeDriver {
    pub connect_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
    pub execute_calls: AtomicUsize,
    pub table_info_calls: AtomicUsize,
    pub info_in_flight: AtomicUsize,
    pub max_info_in_flight: AtomicUsize,
    pub fail_connect: AtomicUsize,
    pub fail_disconnect: AtomicBool,
    pub fail_databases: AtomicBool,
    pub databases: Mutex<Vec<String>>,
    pub tables: Mutex<Vec<TableDescriptor>>,
    pub broken_info_tables: Mutex<Vec<String>>,
    pub last_sql: Mutex<Option<String>>,
    pub last_connect_host: Mutex<Option<String>>,
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self {
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            execute_calls: AtomicUsize::new(0),
            table_info_calls: AtomicUsize::new(0),
            info_in_flight: AtomicUsize::new(0),
            max_info_in_flight: AtomicUsize::new(0),
            fail_connect: AtomicUsize::new(0),
            fail_disconnect: AtomicBool::new(false),
            fail_databases: AtomicBool::new(false),
            databases: Mutex::new(vec!["app".to_string(), "analytics".to_string()]),
            tables: Mutex::new(vec![
                TableDescriptor::table("users"),
                TableDescriptor::table("sessions"),
            ]),
            broken_info_tables: Mutex::new(Vec::new()),
            last_sql: Mutex::new(None),
            last_connect_host: Mutex::new(None),
        }
    }
}

impl FakeDriver {
    pub fn executions(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DatabaseDriver for FakeDriver {
    async fn test_connection(&self, config: &ConnectionConfig) -> Result<(), DriverError> {
        if config.host == "unreachable" {
            return Err(DriverError::connection("connect ECONNREFUSED"));
        }
        Ok(())
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<(), DriverError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_connect_host.lock().expect("host lock") = Some(config.host.clone());
        if self.fail_connect.load(Ordering::SeqCst) > 0 {
            self.fail_connect.fetch_sub(1, Ordering::SeqCst);
            return Err(DriverError::connection("Access denied for user"));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DriverError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(DriverError::connection("connection reset"));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn databases(&self) -> Result<Vec<String>, DriverError> {
        if self.fail_databases.load(Ordering::SeqCst) {
            return Err(DriverError::query("SHOW DATABASES denied"));
        }
        Ok(self.databases.lock().expect("databases lock").clone())
    }

    async fn tables(&self, _database: &str) -> Result<Vec<TableDescriptor>, DriverError> {
        Ok(self.tables.lock().expect("tables lock").clone())
    }

    async fn table_info(&self, _database: &str, table: &str) -> Result<TableInfo, DriverError> {
        self.table_info_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.info_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_info_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.info_in_flight.fetch_sub(1, Ordering::SeqCst);

        let broken = self.broken_info_tables.lock().expect("broken lock");
        if broken.iter().any(|name| name == table) {
            return Err(DriverError::query("table is marked as crashed"));
        }
        Ok(TableInfo {
            rows: 42,
            size_bytes: 16_384,
            engine: "InnoDB".to_string(),
            collation: "utf8mb4_0900_ai_ci".to_string(),
        })
    }

    async fn table_structure(
        &self,
        _database: &str,
        _table: &str,
    ) -> Result<Vec<ColumnInfo>, DriverError> {
        Ok(vec![ColumnInfo {
            name: "id".to_string(),
            data_type: "bigint".to_string(),
            nullable: false,
            key: ColumnKey::Primary,
            default_value: None,
            extra: "auto_increment".to_string(),
            comment: String::new(),
        }])
    }

    async fn table_data(
        &self,
        _database: &str,
        _table: &str,
        limit: u64,
        offset: u64,
    ) -> Result<QueryOutput, DriverError> {
        Ok(QueryOutput {
            columns: vec![
                ColumnMeta::new("limit", "LONGLONG"),
                ColumnMeta::new("offset", "LONGLONG"),
            ],
            rows: vec![vec![SqlValue::UInt(limit), SqlValue::UInt(offset)]],
            affected_rows: None,
            insert_id: None,
        })
    }

    async fn execute(&self, sql: &str) -> Result<QueryOutput, DriverError> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_sql.lock().expect("sql lock") = Some(sql.to_string());
        if sql.contains("FAIL") {
            return Err(DriverError::query(
                "You have an error in your SQL syntax near 'FAIL'",
            ));
        }
        Ok(QueryOutput {
            columns: vec![ColumnMeta::new("1", "LONGLONG")],
            rows: vec![vec![SqlValue::Int(1)]],
            affected_rows: Some(0),
            insert_id: None,
        })
    }
}
