//! PostgreSQL Backend Implementation
//!
//! The PostgreSQL dialect over a sqlx `PgPool`. Placeholders are positional
//! (`$1`, `$2`, ...) and generated keys come back through `RETURNING`.

use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow, PgSslMode};
use sqlx::query::Query;
use sqlx::{Column as _, PgPool, Postgres, Row as _, TypeInfo, ValueRef};
use tracing::{debug, info};

use super::core::{Dialect, ExecResult, Transaction};
use crate::backends::DialectKind;
use crate::config::ConnectionConfig;
use crate::error::{ModelError, OrmResult};
use crate::transaction::TransactionOptions;
use crate::value::{Row, Value};

/// PostgreSQL dialect
#[derive(Debug, Default)]
pub struct PostgresDialect {
    pool: RwLock<Option<PgPool>>,
}

impl PostgresDialect {
    pub fn new() -> Self {
        Self::default()
    }

    // The pool is cloned out so the lock is never held across an await.
    fn pool(&self) -> OrmResult<PgPool> {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ModelError::NotConnected)
    }

    fn connect_options(config: &ConnectionConfig) -> OrmResult<PgConnectOptions> {
        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .database(&config.database);

        if let Some(password) = &config.password {
            options = options.password(password);
        }
        if let Some(ssl_mode) = &config.ssl_mode {
            let mode = PgSslMode::from_str(ssl_mode).map_err(|e| {
                ModelError::Configuration(format!("Invalid ssl_mode '{}': {}", ssl_mode, e))
            })?;
            options = options.ssl_mode(mode);
        }
        if !config.additional_params.is_empty() {
            options = options.options(
                config
                    .additional_params
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            );
        }

        Ok(options)
    }
}

#[async_trait]
impl Dialect for PostgresDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    async fn connect(&self, config: &ConnectionConfig) -> OrmResult<()> {
        config.validate()?;
        let pool_settings = &config.pool;
        let mut options = PgPoolOptions::new()
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
            .map_err(|e| {
                ModelError::Database(format!("Failed to create PostgreSQL pool: {}", e))
            })?;

        info!(
            "Connected to PostgreSQL at {}:{}/{}",
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
            info!("PostgreSQL pool closed");
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
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: None,
        })
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
        let pool = self.pool()?;
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| ModelError::Transaction(format!("Failed to begin transaction: {}", e)))?;

        if let Some(isolation_level) = options.isolation_level {
            let sql = format!("SET TRANSACTION ISOLATION LEVEL {}", isolation_level.as_sql());
            sqlx::query(&sql).execute(&mut *tx).await.map_err(|e| {
                ModelError::Transaction(format!("Failed to set isolation level: {}", e))
            })?;
            debug!("Transaction isolation level set to: {:?}", isolation_level);
        }

        if options.read_only {
            sqlx::query("SET TRANSACTION READ ONLY")
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    ModelError::Transaction(format!("Failed to set read-only mode: {}", e))
                })?;
            debug!("Transaction set to read-only mode");
        }

        Ok(Box::new(PostgresTransaction { tx }))
    }
}

/// PostgreSQL transaction implementation
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn exec(&mut self, sql: &str, args: &[Value]) -> OrmResult<ExecResult> {
        debug!("Executing in transaction: {}", sql);
        let result = bind_all(sqlx::query(sql), args)
            .execute(&mut *self.tx)
            .await?;
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: None,
        })
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

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    args: &[Value],
) -> Query<'q, Postgres, PgArguments> {
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

fn decode_row(row: &PgRow) -> OrmResult<Row> {
    let mut decoded = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        decoded.push(column.name(), decode_value(row, index)?);
    }
    Ok(decoded)
}

/// Convert a PostgreSQL column value to a [`Value`]
fn decode_value(row: &PgRow, index: usize) -> OrmResult<Value> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let type_name = row.columns()[index].type_info().name();
    let value = match type_name {
        "BOOL" => Value::Boolean(row.try_get(index)?),
        "INT2" => Value::Integer(row.try_get::<i16, _>(index)?.into()),
        "INT4" => Value::Integer(row.try_get::<i32, _>(index)?.into()),
        "INT8" => Value::Integer(row.try_get(index)?),
        "FLOAT4" => Value::Float(row.try_get::<f32, _>(index)?.into()),
        "FLOAT8" => Value::Float(row.try_get(index)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => Value::Text(row.try_get(index)?),
        "BYTEA" => Value::Bytes(row.try_get(index)?),
        "UUID" => Value::Text(row.try_get::<uuid::Uuid, _>(index)?.to_string()),
        "TIMESTAMPTZ" => Value::Timestamp(row.try_get::<DateTime<Utc>, _>(index)?),
        "TIMESTAMP" => {
            Value::Timestamp(Utc.from_utc_datetime(&row.try_get::<NaiveDateTime, _>(index)?))
        }
        "DATE" => Value::Text(row.try_get::<NaiveDate, _>(index)?.to_string()),
        "TIME" => Value::Text(row.try_get::<NaiveTime, _>(index)?.to_string()),
        "JSON" | "JSONB" => Value::Text(row.try_get::<JsonValue, _>(index)?.to_string()),
        "NUMERIC" => numeric_value(row.try_get::<Decimal, _>(index)?),
        _ => match row.try_get::<String, _>(index) {
            Ok(text) => Value::Text(text),
            // Unknown types are kept as their raw bytes.
            Err(_) => Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        },
    };
    Ok(value)
}

/// Whole numbers within `i64` become integers; anything else keeps its
/// exact decimal text.
fn numeric_value(decimal: Decimal) -> Value {
    let decimal = decimal.normalize();
    if decimal.scale() == 0 {
        if let Some(i) = decimal.to_i64() {
            return Value::Integer(i);
        }
    }
    Value::Text(decimal.to_string())
}
