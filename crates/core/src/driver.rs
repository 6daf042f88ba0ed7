use async_trait::async_trait;
use thiserror::Error;

use crate::config::ConnectionConfig;
use crate::value::SqlValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    NotConnected,
    Connection,
    Query,
    Timeout,
}

/// Failure reported by a database driver. Server-side rejections and
/// transport faults are folded into this one type so callers handle both
/// the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DriverError {
    kind: DriverErrorKind,
    message: String,
}

impl DriverError {
    #[must_use]
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_connected() -> Self {
        Self::new(DriverErrorKind::NotConnected, "No database connection")
    }

    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Connection, message)
    }

    #[must_use]
    pub fn query(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Query, message)
    }

    #[must_use]
    pub fn kind(&self) -> DriverErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub type_name: String,
}

impl ColumnMeta {
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Rows and metadata returned by a single statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryOutput {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<SqlValue>>,
    pub affected_rows: Option<u64>,
    pub insert_id: Option<u64>,
}

impl QueryOutput {
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Table,
    View,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub kind: TableKind,
}

impl TableDescriptor {
    #[must_use]
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TableKind::Table,
        }
    }
}

/// Storage statistics for one table as reported by `information_schema`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub rows: u64,
    pub size_bytes: u64,
    pub engine: String,
    pub collation: String,
}

impl TableInfo {
    pub const UNKNOWN: &'static str = "Unknown";

    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            rows: 0,
            size_bytes: 0,
            engine: Self::UNKNOWN.to_string(),
            collation: Self::UNKNOWN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnKey {
    #[default]
    None,
    Primary,
    Unique,
    Multiple,
}

impl ColumnKey {
    #[must_use]
    pub fn from_mysql(raw: &str) -> Self {
        match raw {
            "PRI" => Self::Primary,
            "UNI" => Self::Unique,
            "MUL" => Self::Multiple,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub key: ColumnKey,
    pub default_value: Option<String>,
    pub extra: String,
    pub comment: String,
}

/// The operations the session layer needs from a database client.
///
/// `connect` replaces any existing pool, so at most one connection is
/// active per driver. `disconnect` is idempotent.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    async fn test_connection(&self, config: &ConnectionConfig) -> Result<(), DriverError>;
    async fn connect(&self, config: &ConnectionConfig) -> Result<(), DriverError>;
    async fn disconnect(&self) -> Result<(), DriverError>;
    async fn ping(&self) -> Result<(), DriverError>;

    async fn databases(&self) -> Result<Vec<String>, DriverError>;
    async fn tables(&self, database: &str) -> Result<Vec<TableDescriptor>, DriverError>;
    async fn table_info(&self, database: &str, table: &str) -> Result<TableInfo, DriverError>;
    async fn table_structure(
        &self,
        database: &str,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, DriverError>;
    async fn table_data(
        &self,
        database: &str,
        table: &str,
        limit: u64,
        offset: u64,
    ) -> Result<QueryOutput, DriverError>;

    /// Runs `sql` verbatim. No parameter binding or escaping happens here;
    /// the text reaches the server exactly as given.
    async fn execute(&self, sql: &str) -> Result<QueryOutput, DriverError>;
}
