use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use mysql_async::consts::{ColumnFlags, ColumnType};
use mysql_async::prelude::Queryable;
use mysql_async::{Column, Conn, OptsBuilder, Pool, PoolConstraints, PoolOpts, Row, Value};
use parking_lot::Mutex;
use quarry_core::config::ConnectionConfig;
use quarry_core::driver::{
    ColumnInfo, ColumnKey, ColumnMeta, DatabaseDriver, DriverError, DriverErrorKind, QueryOutput,
    TableDescriptor, TableInfo, TableKind,
};
use quarry_core::format::qualified_table_name;
use quarry_core::settings::Settings;
use quarry_core::value::{SqlTime, SqlValue};

const BINARY_CHARSET: u16 = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    pub connect_timeout: Duration,
    pub max_connections: usize,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl DriverOptions {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            connect_timeout: settings.connect_timeout(),
            max_connections: settings.max_connections,
        }
    }
}

/// `mysql_async` backed driver holding at most one connection pool.
#[derive(Debug, Default)]
pub struct MysqlDriver {
    options: DriverOptions,
    pool: Mutex<Option<Pool>>,
}

impl MysqlDriver {
    #[must_use]
    pub fn new(options: DriverOptions) -> Self {
        Self {
            options,
            pool: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn options(&self) -> DriverOptions {
        self.options
    }

    fn pool(&self) -> Result<Pool, DriverError> {
        self.pool.lock().clone().ok_or_else(DriverError::not_connected)
    }

    async fn conn(&self) -> Result<Conn, DriverError> {
        let pool = self.pool()?;
        with_timeout(self.options.connect_timeout, pool.get_conn()).await
    }

    async fn run_text_query(&self, sql: &str) -> Result<QueryOutput, DriverError> {
        let mut conn = self.conn().await?;
        let mut result = conn.query_iter(sql).await.map_err(to_query_error)?;

        let decoders = result
            .columns()
            .map(|columns| columns.iter().map(ColumnDecoder::from_column).collect::<Vec<_>>())
            .unwrap_or_default();
        let rows: Vec<Row> = result.collect().await.map_err(to_query_error)?;
        let affected_rows = result.affected_rows();
        let insert_id = result.last_insert_id();
        result.drop_result().await.map_err(to_query_error)?;

        let rows = rows
            .into_iter()
            .map(|row| decode_row(row, &decoders))
            .collect();
        Ok(QueryOutput {
            columns: decoders.into_iter().map(|decoder| decoder.meta).collect(),
            rows,
            affected_rows: Some(affected_rows),
            insert_id,
        })
    }
}

#[async_trait]
impl DatabaseDriver for MysqlDriver {
    async fn test_connection(&self, config: &ConnectionConfig) -> Result<(), DriverError> {
        let opts = opts_from_config(config, &self.options);
        let mut conn = with_timeout(self.options.connect_timeout, Conn::new(opts)).await?;
        conn.ping().await.map_err(to_connection_error)?;
        conn.disconnect().await.map_err(to_connection_error)
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<(), DriverError> {
        let pool = Pool::new(opts_from_config(config, &self.options));
        let verified = async {
            let mut conn = with_timeout(self.options.connect_timeout, pool.get_conn()).await?;
            conn.ping().await.map_err(to_connection_error)
        }
        .await;

        if let Err(error) = verified {
            if let Err(teardown) = pool.disconnect().await {
                tracing::debug!(error = %teardown, "failed to tear down rejected pool");
            }
            return Err(error);
        }

        // Swapped in only once verified; a failed connect keeps the old pool.
        let previous = self.pool.lock().replace(pool);
        if let Some(previous) = previous {
            if let Err(error) = previous.disconnect().await {
                tracing::warn!(%error, "failed to close previous pool");
            }
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DriverError> {
        let previous = self.pool.lock().take();
        match previous {
            Some(pool) => pool.disconnect().await.map_err(to_connection_error),
            None => Ok(()),
        }
    }

    async fn ping(&self) -> Result<(), DriverError> {
        let mut conn = self.conn().await?;
        conn.ping().await.map_err(to_connection_error)
    }

    async fn databases(&self) -> Result<Vec<String>, DriverError> {
        let mut conn = self.conn().await?;
        conn.query_map("SHOW DATABASES", |database: String| database)
            .await
            .map_err(to_query_error)
    }

    async fn tables(&self, database: &str) -> Result<Vec<TableDescriptor>, DriverError> {
        let mut conn = self.conn().await?;
        conn.exec_map(
            "SELECT TABLE_NAME, TABLE_TYPE \
             FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = ? \
             ORDER BY TABLE_NAME",
            (database,),
            |(name, table_type): (String, String)| TableDescriptor {
                name,
                kind: if table_type.eq_ignore_ascii_case("VIEW") {
                    TableKind::View
                } else {
                    TableKind::Table
                },
            },
        )
        .await
        .map_err(to_query_error)
    }

    async fn table_info(&self, database: &str, table: &str) -> Result<TableInfo, DriverError> {
        let mut conn = self.conn().await?;
        let row: Option<(Option<u64>, Option<u64>, Option<String>, Option<String>)> = conn
            .exec_first(
                "SELECT TABLE_ROWS, DATA_LENGTH + INDEX_LENGTH, ENGINE, TABLE_COLLATION \
                 FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?",
                (database, table),
            )
            .await
            .map_err(to_query_error)?;

        let (rows, size_bytes, engine, collation) = row.ok_or_else(|| {
            DriverError::query(format!("Table '{database}.{table}' doesn't exist"))
        })?;
        Ok(TableInfo {
            rows: rows.unwrap_or_default(),
            size_bytes: size_bytes.unwrap_or_default(),
            engine: engine.unwrap_or_else(|| TableInfo::UNKNOWN.to_string()),
            collation: collation.unwrap_or_else(|| TableInfo::UNKNOWN.to_string()),
        })
    }

    async fn table_structure(
        &self,
        database: &str,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, DriverError> {
        let mut conn = self.conn().await?;
        conn.exec_map(
            "SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_KEY, COLUMN_DEFAULT, \
             EXTRA, COLUMN_COMMENT \
             FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
             ORDER BY ORDINAL_POSITION",
            (database, table),
            |(name, data_type, nullable, key, default_value, extra, comment): (
                String,
                String,
                String,
                String,
                Option<String>,
                String,
                String,
            )| ColumnInfo {
                name,
                data_type,
                nullable: nullable.eq_ignore_ascii_case("YES"),
                key: ColumnKey::from_mysql(&key),
                default_value,
                extra,
                comment,
            },
        )
        .await
        .map_err(to_query_error)
    }

    async fn table_data(
        &self,
        database: &str,
        table: &str,
        limit: u64,
        offset: u64,
    ) -> Result<QueryOutput, DriverError> {
        let sql = format!(
            "SELECT * FROM {} LIMIT {limit} OFFSET {offset}",
            qualified_table_name(Some(database), table)
        );
        self.run_text_query(&sql).await
    }

    async fn execute(&self, sql: &str) -> Result<QueryOutput, DriverError> {
        self.run_text_query(sql).await
    }
}

fn opts_from_config(config: &ConnectionConfig, options: &DriverOptions) -> OptsBuilder {
    let constraints = PoolConstraints::new(1, options.max_connections.max(1)).unwrap_or_default();
    let mut builder = OptsBuilder::default()
        .ip_or_hostname(config.host.clone())
        .tcp_port(config.port)
        .user(Some(config.user.clone()))
        .pool_opts(PoolOpts::default().with_constraints(constraints));

    if !config.password.is_empty() {
        builder = builder.pass(Some(config.password.clone()));
    }

    if let Some(database) = &config.database {
        builder = builder.db_name(Some(database.clone()));
    }

    builder
}

async fn with_timeout<T, F>(limit: Duration, future: F) -> Result<T, DriverError>
where
    F: Future<Output = Result<T, mysql_async::Error>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result.map_err(to_connection_error),
        Err(_) => Err(DriverError::new(
            DriverErrorKind::Timeout,
            format!("Connection timed out after {}s", limit.as_secs()),
        )),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnDecoder {
    meta: ColumnMeta,
    column_type: ColumnType,
    unsigned: bool,
    binary: bool,
}

impl ColumnDecoder {
    fn from_column(column: &Column) -> Self {
        let column_type = column.column_type();
        Self {
            meta: ColumnMeta::new(column.name_str(), type_name(column_type)),
            column_type,
            unsigned: column.flags().contains(ColumnFlags::UNSIGNED_FLAG),
            binary: column.character_set() == BINARY_CHARSET,
        }
    }

    fn decode(&self, value: Value) -> SqlValue {
        match value {
            Value::NULL => SqlValue::Null,
            Value::Int(value) => SqlValue::Int(value),
            Value::UInt(value) => SqlValue::UInt(value),
            Value::Float(value) => SqlValue::Float(f64::from(value)),
            Value::Double(value) => SqlValue::Float(value),
            Value::Date(year, month, day, hour, minute, second, micros) => {
                decode_wire_date(year, month, day, hour, minute, second, micros)
            }
            Value::Time(negative, days, hours, minutes, seconds, micros) => {
                SqlValue::Time(SqlTime {
                    negative,
                    hours: days * 24 + u32::from(hours),
                    minutes,
                    seconds,
                    micros,
                })
            }
            Value::Bytes(bytes) => self.decode_text(bytes),
        }
    }

    fn decode_text(&self, bytes: Vec<u8>) -> SqlValue {
        use ColumnType as T;

        if matches!(self.column_type, T::MYSQL_TYPE_BIT | T::MYSQL_TYPE_GEOMETRY) {
            return SqlValue::Binary(bytes);
        }
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(error) => return SqlValue::Binary(error.into_bytes()),
        };

        let decoded = match self.column_type {
            T::MYSQL_TYPE_TINY
            | T::MYSQL_TYPE_SHORT
            | T::MYSQL_TYPE_INT24
            | T::MYSQL_TYPE_LONG
            | T::MYSQL_TYPE_LONGLONG
            | T::MYSQL_TYPE_YEAR => {
                if self.unsigned {
                    text.parse().ok().map(SqlValue::UInt)
                } else {
                    text.parse().ok().map(SqlValue::Int)
                }
            }
            T::MYSQL_TYPE_FLOAT | T::MYSQL_TYPE_DOUBLE => text.parse().ok().map(SqlValue::Float),
            T::MYSQL_TYPE_DECIMAL | T::MYSQL_TYPE_NEWDECIMAL => {
                Some(SqlValue::Decimal(text.clone()))
            }
            T::MYSQL_TYPE_DATE | T::MYSQL_TYPE_NEWDATE => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .ok()
                .map(SqlValue::Date),
            T::MYSQL_TYPE_DATETIME
            | T::MYSQL_TYPE_DATETIME2
            | T::MYSQL_TYPE_TIMESTAMP
            | T::MYSQL_TYPE_TIMESTAMP2 => {
                NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f")
                    .ok()
                    .map(SqlValue::DateTime)
            }
            T::MYSQL_TYPE_TIME | T::MYSQL_TYPE_TIME2 => SqlTime::parse(&text).map(SqlValue::Time),
            T::MYSQL_TYPE_TINY_BLOB
            | T::MYSQL_TYPE_MEDIUM_BLOB
            | T::MYSQL_TYPE_LONG_BLOB
            | T::MYSQL_TYPE_BLOB
            | T::MYSQL_TYPE_STRING
            | T::MYSQL_TYPE_VAR_STRING
            | T::MYSQL_TYPE_VARCHAR
                if self.binary =>
            {
                return SqlValue::Binary(text.into_bytes());
            }
            _ => None,
        };

        // Zero dates and out-of-range values stay readable as text.
        decoded.unwrap_or(SqlValue::Text(text))
    }
}

fn decode_row(row: Row, decoders: &[ColumnDecoder]) -> Vec<SqlValue> {
    row.unwrap()
        .into_iter()
        .enumerate()
        .map(|(index, value)| match decoders.get(index) {
            Some(decoder) => decoder.decode(value),
            None => SqlValue::Text(value.as_sql(true)),
        })
        .collect()
}

fn decode_wire_date(
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    micros: u32,
) -> SqlValue {
    let Some(date) = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
    else {
        return SqlValue::Text(format!("{year:04}-{month:02}-{day:02}"));
    };
    if (hour, minute, second, micros) == (0, 0, 0, 0) {
        return SqlValue::Date(date);
    }
    date.and_hms_micro_opt(
        u32::from(hour),
        u32::from(minute),
        u32::from(second),
        micros,
    )
    .map_or_else(
        || SqlValue::Date(date),
        SqlValue::DateTime,
    )
}

fn type_name(column_type: ColumnType) -> String {
    let raw = format!("{column_type:?}");
    raw.strip_prefix("MYSQL_TYPE_").unwrap_or(&raw).to_string()
}

fn to_connection_error(error: mysql_async::Error) -> DriverError {
    match error {
        mysql_async::Error::Server(server) => DriverError::connection(server.message),
        other => DriverError::connection(other.to_string()),
    }
}

fn to_query_error(error: mysql_async::Error) -> DriverError {
    match error {
        mysql_async::Error::Server(server) => DriverError::query(server.message),
        other => DriverError::connection(other.to_string()),
    }
}
