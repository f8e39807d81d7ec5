//! Core Database Backend Traits
//!
//! [`Dialect`] is the pooled side of a backend: connection lifecycle, raw
//! execution, transaction start and schema operations. [`Transaction`] is
//! the same execution surface bound to one open transaction.

use async_trait::async_trait;

use crate::backends::DialectKind;
use crate::config::ConnectionConfig;
use crate::error::OrmResult;
use crate::metadata::Column;
use crate::transaction::TransactionOptions;
use crate::value::{FromValue, Row, Value};

/// Outcome of a statement that returns no rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Generated key reported by MySQL-style drivers
    pub last_insert_id: Option<i64>,
}

/// Vendor adapter behind the ORM
#[async_trait]
pub trait Dialect: Send + Sync {
    /// SQL flavour used when compiling statements for this dialect
    fn kind(&self) -> DialectKind;

    /// Open the connection pool
    async fn connect(&self, config: &ConnectionConfig) -> OrmResult<()>;

    /// Close the connection pool
    async fn close(&self) -> OrmResult<()>;

    /// Round-trip to the server
    async fn ping(&self) -> OrmResult<()>;

    fn is_connected(&self) -> bool;

    /// Execute a statement that returns no rows
    async fn exec(&self, sql: &str, args: &[Value]) -> OrmResult<ExecResult>;

    /// Execute a query and return every row
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>>;

    /// Execute a query and return the first row, if any
    async fn query_row(&self, sql: &str, args: &[Value]) -> OrmResult<Option<Row>> {
        Ok(self.query(sql, args).await?.into_iter().next())
    }

    /// Start a transaction on a dedicated connection
    async fn begin_tx(&self, options: &TransactionOptions) -> OrmResult<Box<dyn Transaction>>;

    async fn create_table(&self, table: &str, columns: &[Column]) -> OrmResult<()> {
        let sql = self.kind().create_table_sql(table, columns);
        self.exec(&sql, &[]).await.map(|_| ())
    }

    async fn drop_table(&self, table: &str) -> OrmResult<()> {
        let sql = self.kind().drop_table_sql(table);
        self.exec(&sql, &[]).await.map(|_| ())
    }

    async fn table_exists(&self, table: &str) -> OrmResult<bool> {
        let sql = self.kind().table_exists_sql();
        let row = self.query_row(&sql, &[Value::from(table)]).await?;
        let count = match row.and_then(|r| r.get_by_index(0).cloned()) {
            Some(value) => i64::from_value(value)?,
            None => 0,
        };
        Ok(count > 0)
    }

    /// Vendor type for a column
    fn sql_type(&self, column: &Column) -> String {
        self.kind().sql_type(column)
    }

    /// Placeholder for the `index`-th argument (1-based)
    fn placeholder(&self, index: usize) -> String {
        self.kind().placeholder(index)
    }
}

/// An open transaction on one connection
#[async_trait]
pub trait Transaction: Send {
    async fn exec(&mut self, sql: &str, args: &[Value]) -> OrmResult<ExecResult>;

    async fn query(&mut self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>>;

    async fn query_row(&mut self, sql: &str, args: &[Value]) -> OrmResult<Option<Row>> {
        Ok(self.query(sql, args).await?.into_iter().next())
    }

    async fn commit(self: Box<Self>) -> OrmResult<()>;

    async fn rollback(self: Box<Self>) -> OrmResult<()>;
}
