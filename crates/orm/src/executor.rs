//! Statement executors
//!
//! Builders and repositories run their SQL through an [`Executor`]: either
//! the pooled dialect or an open transaction. Schema operations are not part
//! of this surface; they are only reachable from the `Orm` itself.

use std::fmt;
use std::sync::Arc;

use crate::backends::{Dialect, DialectKind, ExecResult};
use crate::error::OrmResult;
use crate::transaction::TransactionHandle;
use crate::value::{Row, Value};

/// Where a statement is executed
#[derive(Clone)]
pub enum Executor {
    /// Any pooled connection of the dialect
    Pooled(Arc<dyn Dialect>),
    /// The connection held by an open transaction
    Transaction(TransactionHandle),
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Executor::Pooled(dialect) => f.debug_tuple("Pooled").field(&dialect.kind()).finish(),
            Executor::Transaction(handle) => f.debug_tuple("Transaction").field(handle).finish(),
        }
    }
}

impl Executor {
    pub fn kind(&self) -> DialectKind {
        match self {
            Executor::Pooled(dialect) => dialect.kind(),
            Executor::Transaction(handle) => handle.kind(),
        }
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self, Executor::Transaction(_))
    }

    pub async fn exec(&self, sql: &str, args: &[Value]) -> OrmResult<ExecResult> {
        match self {
            Executor::Pooled(dialect) => dialect.exec(sql, args).await,
            Executor::Transaction(handle) => handle.exec(sql, args).await,
        }
    }

    pub async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        match self {
            Executor::Pooled(dialect) => dialect.query(sql, args).await,
            Executor::Transaction(handle) => handle.query(sql, args).await,
        }
    }

    pub async fn query_row(&self, sql: &str, args: &[Value]) -> OrmResult<Option<Row>> {
        match self {
            Executor::Pooled(dialect) => dialect.query_row(sql, args).await,
            Executor::Transaction(handle) => handle.query_row(sql, args).await,
        }
    }
}
