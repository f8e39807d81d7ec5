//! MySQL Backend Implementation
//!
//! The MySQL dialect over a sqlx `MySqlPool`. Every placeholder is `?` and
//! generated keys are read from the driver's last-insert-id.

use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::query::Query;
use sqlx::{Column as _, MySql, MySqlPool, Row as _, TypeInfo, ValueRef};
use tracing::{debug, info, warn};

use super::core::{Dialect, ExecResult, Transaction};
use crate::backends::DialectKind;
use crate::config::ConnectionConfig;
use crate::error::{ModelError, OrmResult};
use crate::transaction::TransactionOptions;
use crate::value::{Row, Value};

/// MySQL dialect
#[derive(Debug, Default)]
pub struct MySqlDialect {
    pool: RwLock<Option<MySqlPool>>,
}

impl MySqlDialect {
    pub fn new() -> Self {
        Self::default()
    }

    fn pool(&self) -> OrmResult<MySqlPool> {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ModelError::NotConnected)
    }

    fn connect_options(config: &ConnectionConfig) -> OrmResult<MySqlConnectOptions> {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .database(&config.database);

        if let Some(password) = &config.password {
            options = options.password(password);
        }
        if let Some(ssl_mode) = &config.ssl_mode {
            let mode = MySqlSslMode::from_str(ssl_mode).map_err(|e| {
                ModelError::Configuration(format!("Invalid ssl_mode '{}': {}", ssl_mode, e))
            })?;
            options = options.ssl_mode(mode);
        }
        for (key, value) in &config.additional_params {
            match key.as_str() {
                "charset" => options = options.charset(value),
                "collation" => options = options.collation(value),
                other => debug!("Ignoring unsupported MySQL parameter '{}'", other),
            }
        }

        Ok(options)
    }
}

#[async_trait]
impl Dialect for MySqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::MySql
    }

    async fn connect(&self, config: &ConnectionConfig) -> OrmResult<()> {
        config.validate()?;
        let pool_settings = &config.pool;
        let mut options = MySqlPoolOptions::new()
            .max_connections(pool_settings.max_open_connections)
            .min_connections(pool_settings.max_idle_connections)
            .acquire_timeout(pool_settings.connect_timeout());

        if let Some(idle_timeout) = pool_settings.idle_timeout() {
            options = options.idle_timeout(idle_timeout);
        }
        if let Some(max_lifetime) = pool_settings.max_lifetime() {
            options = options.max_lifetime(max_lifetime);
        }

        let pool = options
            .connect_with(Self::connect_options(config)?)
            .await
            .map_err(|e| ModelError::Database(format!("Failed to create MySQL pool: {}", e)))?;

        info!(
            "Connected to MySQL at {}:{}/{}",
            config.host, config.port, config.database
        );
        *self.pool.write().unwrap_or_else(PoisonError::into_inner) = Some(pool);
        Ok(())
    }

    async fn close(&self) -> OrmResult<()> {
        let pool = self
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pool) = pool {
            pool.close().await;
            info!("MySQL pool closed");
        }
        Ok(())
    }

    async fn ping(&self) -> OrmResult<()> {
        let pool = self.pool()?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> OrmResult<ExecResult> {
        let pool = self.pool()?;
        debug!("Executing: {} with {} args", sql, args.len());
        let result = bind_all(sqlx::query(sql), args).execute(&pool).await?;
        Ok(exec_result(result.rows_affected(), result.last_insert_id()))
    }

    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        let pool = self.pool()?;
        debug!("Querying: {} with {} args", sql, args.len());
        let rows = bind_all(sqlx::query(sql), args).fetch_all(&pool).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn query_row(&self, sql: &str, args: &[Value]) -> OrmResult<Option<Row>> {
        let pool = self.pool()?;
        debug!("Querying one: {} with {} args", sql, args.len());
        let row = bind_all(sqlx::query(sql), args).fetch_optional(&pool).await?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn begin_tx(&self, options: &TransactionOptions) -> OrmResult<Box<dyn Transaction>> {
        // MySQL only honours SET TRANSACTION before START TRANSACTION, which
        // the pool issues itself.
        if options.isolation_level.is_some() || options.read_only {
            warn!(
                "MySQL dialect ignores isolation level and read-only options ({:?})",
                options
            );
        }

        let pool = self.pool()?;
        let tx = pool
            .begin()
            .await
            .map_err(|e| ModelError::Transaction(format!("Failed to begin transaction: {}", e)))?;
        Ok(Box::new(MySqlTransaction { tx }))
    }
}

/// MySQL transaction implementation
pub struct MySqlTransaction {
    tx: sqlx::Transaction<'static, MySql>,
}

#[async_trait]
impl Transaction for MySqlTransaction {
    async fn exec(&mut self, sql: &str, args: &[Value]) -> OrmResult<ExecResult> {
        debug!("Executing in transaction: {}", sql);
        let result = bind_all(sqlx::query(sql), args)
            .execute(&mut *self.tx)
            .await?;
        Ok(exec_result(result.rows_affected(), result.last_insert_id()))
    }

    async fn query(&mut self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        debug!("Querying in transaction: {}", sql);
        let rows = bind_all(sqlx::query(sql), args)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn commit(self: Box<Self>) -> OrmResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| ModelError::Transaction(format!("Transaction commit failed: {}", e)))
    }

    async fn rollback(self: Box<Self>) -> OrmResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| ModelError::Transaction(format!("Transaction rollback failed: {}", e)))
    }
}

fn exec_result(rows_affected: u64, last_insert_id: u64) -> ExecResult {
    ExecResult {
        rows_affected,
        // zero means the statement generated no key
        last_insert_id: i64::try_from(last_insert_id).ok().filter(|id| *id != 0),
    }
}

fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    args: &[Value],
) -> Query<'q, MySql, MySqlArguments> {
    for arg in args {
        query = match arg {
            Value::Null => query.bind(Option::<String>::None),
            Value::Integer(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            Value::Text(s) => query.bind(s.clone()),
            Value::Boolean(b) => query.bind(*b),
            Value::Bytes(b) => query.bind(b.clone()),
            Value::Timestamp(ts) => query.bind(*ts),
        };
    }
    query
}

fn decode_row(row: &MySqlRow) -> OrmResult<Row> {
    let mut decoded = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        decoded.push(column.name(), decode_value(row, index)?);
    }
    Ok(decoded)
}

/// Convert a MySQL column value to a [`Value`]
fn decode_value(row: &MySqlRow, index: usize) -> OrmResult<Value> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let type_name = row.columns()[index].type_info().name();
    let value = match type_name {
        "BOOLEAN" => Value::Boolean(row.try_get(index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            Value::Integer(row.try_get_unchecked::<i64, _>(index)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => {
            let unsigned = row.try_get_unchecked::<u64, _>(index)?;
            match i64::try_from(unsigned) {
                Ok(i) => Value::Integer(i),
                Err(_) => Value::Text(unsigned.to_string()),
            }
        }
        "FLOAT" => Value::Float(row.try_get::<f32, _>(index)?.into()),
        "DOUBLE" => Value::Float(row.try_get(index)?),
        "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" => {
            Value::Text(row.try_get(index)?)
        }
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            Value::Bytes(row.try_get(index)?)
        }
        "TIMESTAMP" => Value::Timestamp(row.try_get::<DateTime<Utc>, _>(index)?),
        "DATETIME" => {
            Value::Timestamp(Utc.from_utc_datetime(&row.try_get::<NaiveDateTime, _>(index)?))
        }
        "DATE" => Value::Text(row.try_get::<NaiveDate, _>(index)?.to_string()),
        "TIME" => Value::Text(row.try_get::<NaiveTime, _>(index)?.to_string()),
        "JSON" => Value::Text(row.try_get::<JsonValue, _>(index)?.to_string()),
        _ => {
            // DECIMAL and friends arrive as text; anything else stays opaque.
            let raw = row.try_get_unchecked::<Vec<u8>, _>(index)?;
            match String::from_utf8(raw) {
                Ok(text) => Value::Text(text),
                Err(e) => Value::Bytes(e.into_bytes()),
            }
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_result_drops_zero_insert_id() {
        assert_eq!(exec_result(3, 0).last_insert_id, None);
        assert_eq!(exec_result(1, 42).last_insert_id, Some(42));
        assert_eq!(exec_result(1, u64::MAX).last_insert_id, None);
    }

    #[tokio::test]
    async fn test_operations_before_connect() {
        let dialect = MySqlDialect::new();
        assert!(!dialect.is_connected());
        assert!(matches!(dialect.ping().await, Err(ModelError::NotConnected)));
        assert!(matches!(
            dialect.exec("DELETE FROM users", &[]).await,
            Err(ModelError::NotConnected)
        ));
        assert!(matches!(
            dialect.table_exists("users").await,
            Err(ModelError::NotConnected)
        ));
        assert!(dialect.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_validates_config() {
        let dialect = MySqlDialect::new();

        let mut config = ConnectionConfig::new("localhost", 3306, "app", "shop");
        config.pool.max_open_connections = 0;
        assert!(matches!(
            dialect.connect(&config).await,
            Err(ModelError::Configuration(_))
        ));

        let config = ConnectionConfig::new("localhost", 3306, "", "");
        assert!(matches!(
            dialect.connect(&config).await,
            Err(ModelError::Configuration(_))
        ));
        assert!(!dialect.is_connected());
    }
}
