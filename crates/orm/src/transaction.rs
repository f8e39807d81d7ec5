//! Transaction Management
//!
//! A [`TransactionHandle`] owns one open dialect transaction and moves
//! through `Active → Committed | RolledBack`. Once finalized, every further
//! commit, rollback or statement fails with `TransactionFinalized`.
//! [`run_scoped`] drives a callback inside a transaction: commit on success,
//! rollback on error or panic.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::backends::{Dialect, DialectKind, ExecResult, Transaction};
use crate::error::{ModelError, ModelResult};
use crate::value::{Row, Value};

/// Transaction isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    /// Read Uncommitted - lowest isolation level
    ReadUncommitted,
    /// Read Committed - default PostgreSQL isolation level
    ReadCommitted,
    /// Repeatable Read - stronger consistency guarantees
    RepeatableRead,
    /// Serializable - highest isolation level
    Serializable,
}

impl IsolationLevel {
    /// Convert to SQL string for SET TRANSACTION ISOLATION LEVEL command
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options applied when a transaction begins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Transaction isolation level, `None` keeps the server default
    pub isolation_level: Option<IsolationLevel>,
    /// Whether the transaction is read-only
    pub read_only: bool,
    /// Deadline for obtaining the transaction. Nothing after `begin` is
    /// cancelled.
    pub begin_timeout: Option<Duration>,
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn begin_timeout(mut self, timeout: Duration) -> Self {
        self.begin_timeout = Some(timeout);
        self
    }
}

/// Lifecycle of a transaction handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Active => write!(f, "active"),
            TransactionState::Committed => write!(f, "committed"),
            TransactionState::RolledBack => write!(f, "rolled back"),
        }
    }
}

struct TransactionSlot {
    tx: Option<Box<dyn Transaction>>,
    state: TransactionState,
}

impl TransactionSlot {
    fn active(&mut self) -> ModelResult<&mut Box<dyn Transaction>> {
        match (self.state, self.tx.as_mut()) {
            (TransactionState::Active, Some(tx)) => Ok(tx),
            (state, _) => Err(ModelError::TransactionFinalized(state.to_string())),
        }
    }
}

/// Shared handle to one open transaction
///
/// Clones refer to the same transaction; statements are serialized on its
/// connection.
#[derive(Clone)]
pub struct TransactionHandle {
    kind: DialectKind,
    slot: Arc<Mutex<TransactionSlot>>,
}

impl fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl TransactionHandle {
    /// Begin a transaction on `dialect`, honouring `options.begin_timeout`
    pub async fn begin(dialect: &dyn Dialect, options: &TransactionOptions) -> ModelResult<Self> {
        debug!("Beginning transaction with options: {:?}", options);

        let tx = match options.begin_timeout {
            Some(timeout) => tokio::time::timeout(timeout, dialect.begin_tx(options))
                .await
                .map_err(|_| {
                    ModelError::Transaction(format!(
                        "Timed out after {:?} waiting to begin transaction",
                        timeout
                    ))
                })??,
            None => dialect.begin_tx(options).await?,
        };

        Ok(Self::new(dialect.kind(), tx))
    }

    /// Wrap an already started dialect transaction
    pub fn new(kind: DialectKind, tx: Box<dyn Transaction>) -> Self {
        Self {
            kind,
            slot: Arc::new(Mutex::new(TransactionSlot {
                tx: Some(tx),
                state: TransactionState::Active,
            })),
        }
    }

    pub fn kind(&self) -> DialectKind {
        self.kind
    }

    pub async fn state(&self) -> TransactionState {
        self.slot.lock().await.state
    }

    pub async fn is_active(&self) -> bool {
        self.state().await == TransactionState::Active
    }

    pub async fn exec(&self, sql: &str, args: &[Value]) -> ModelResult<ExecResult> {
        let mut slot = self.slot.lock().await;
        slot.active()?.exec(sql, args).await
    }

    pub async fn query(&self, sql: &str, args: &[Value]) -> ModelResult<Vec<Row>> {
        let mut slot = self.slot.lock().await;
        slot.active()?.query(sql, args).await
    }

    pub async fn query_row(&self, sql: &str, args: &[Value]) -> ModelResult<Option<Row>> {
        let mut slot = self.slot.lock().await;
        slot.active()?.query_row(sql, args).await
    }

    /// Commit the transaction
    pub async fn commit(&self) -> ModelResult<()> {
        let mut slot = self.slot.lock().await;
        slot.active()?;
        let tx = slot
            .tx
            .take()
            .ok_or_else(|| ModelError::TransactionFinalized(slot.state.to_string()))?;

        debug!("Committing transaction");
        match tx.commit().await {
            Ok(()) => {
                slot.state = TransactionState::Committed;
                debug!("Transaction committed successfully");
                Ok(())
            }
            Err(e) => {
                // the driver discards a transaction whose commit failed
                slot.state = TransactionState::RolledBack;
                Err(e)
            }
        }
    }

    /// Rollback the transaction
    pub async fn rollback(&self) -> ModelResult<()> {
        let mut slot = self.slot.lock().await;
        slot.active()?;
        let tx = slot
            .tx
            .take()
            .ok_or_else(|| ModelError::TransactionFinalized(slot.state.to_string()))?;

        debug!("Rolling back transaction");
        slot.state = TransactionState::RolledBack;
        tx.rollback().await?;
        debug!("Transaction rolled back successfully");
        Ok(())
    }
}

/// Run `work` inside the transaction behind `handle`.
///
/// Commits when `work` succeeds. On error the transaction is rolled back and
/// the original error returned; a failed rollback is reported alongside it
/// as [`ModelError::RollbackFailed`]. A panic rolls back and then resumes
/// unwinding. If `work` already finalized the transaction itself, nothing
/// more is done.
pub async fn run_scoped<T, Fut>(handle: TransactionHandle, work: Fut) -> ModelResult<T>
where
    Fut: Future<Output = ModelResult<T>> + Send,
{
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(Ok(value)) => {
            if handle.is_active().await {
                handle
                    .commit()
                    .await
                    .map_err(|e| e.context("failed to commit transaction"))?;
            }
            Ok(value)
        }
        Ok(Err(original)) => {
            if !handle.is_active().await {
                return Err(original);
            }
            warn!("Rolling back transaction after error: {}", original);
            match handle.rollback().await {
                Ok(()) => Err(original),
                Err(rollback) => {
                    error!("Rollback failed: {}", rollback);
                    Err(ModelError::RollbackFailed {
                        original: Box::new(original),
                        rollback: Box::new(rollback),
                    })
                }
            }
        }
        Err(panic) => {
            if handle.is_active().await {
                warn!("Rolling back transaction after panic");
                if let Err(rollback) = handle.rollback().await {
                    error!("Rollback after panic failed: {}", rollback);
                }
            }
            std::panic::resume_unwind(panic)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_level_sql() {
        assert_eq!(IsolationLevel::ReadUncommitted.as_sql(), "READ UNCOMMITTED");
        assert_eq!(IsolationLevel::ReadCommitted.as_sql(), "READ COMMITTED");
        assert_eq!(IsolationLevel::RepeatableRead.as_sql(), "REPEATABLE READ");
        assert_eq!(IsolationLevel::Serializable.as_sql(), "SERIALIZABLE");
    }

    #[test]
    fn test_transaction_options_default() {
        let options = TransactionOptions::default();
        assert!(options.isolation_level.is_none());
        assert!(!options.read_only);
        assert!(options.begin_timeout.is_none());

        let options = TransactionOptions::new()
            .isolation_level(IsolationLevel::Serializable)
            .read_only()
            .begin_timeout(Duration::from_secs(2));
        assert_eq!(options.isolation_level, Some(IsolationLevel::Serializable));
        assert!(options.read_only);
        assert_eq!(options.begin_timeout, Some(Duration::from_secs(2)));
    }
}
