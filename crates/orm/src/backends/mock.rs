//! In-memory mock dialect
//!
//! Speaks either vendor's SQL syntax without a server. Every statement is
//! recorded; results, errors and generated keys are scripted or simulated.
//! Cloning a `MockDialect` shares its state, so a test can keep one handle
//! while the ORM owns another.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use super::core::{Dialect, ExecResult, Transaction};
use crate::backends::DialectKind;
use crate::config::ConnectionConfig;
use crate::error::{ModelError, OrmResult};
use crate::transaction::TransactionOptions;
use crate::value::{Row, Value};

/// A statement seen by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub sql: String,
    pub args: Vec<Value>,
    pub in_transaction: bool,
}

#[derive(Debug)]
struct MockState {
    connected: bool,
    statements: Vec<RecordedStatement>,
    rows: VecDeque<Vec<Row>>,
    exec_results: VecDeque<ExecResult>,
    errors: VecDeque<ModelError>,
    commit_errors: VecDeque<ModelError>,
    rollback_errors: VecDeque<ModelError>,
    next_insert_id: i64,
    tables: HashSet<String>,
    begins: usize,
    commits: usize,
    rollbacks: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            connected: false,
            statements: Vec::new(),
            rows: VecDeque::new(),
            exec_results: VecDeque::new(),
            errors: VecDeque::new(),
            commit_errors: VecDeque::new(),
            rollback_errors: VecDeque::new(),
            next_insert_id: 1,
            tables: HashSet::new(),
            begins: 0,
            commits: 0,
            rollbacks: 0,
        }
    }
}

impl MockState {
    fn record(&mut self, sql: &str, args: &[Value], in_transaction: bool) -> OrmResult<()> {
        if !self.connected {
            return Err(ModelError::NotConnected);
        }
        debug!("Mock recorded: {}", sql);
        self.statements.push(RecordedStatement {
            sql: sql.to_string(),
            args: args.to_vec(),
            in_transaction,
        });
        match self.errors.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn exec(&mut self, kind: DialectKind, sql: &str) -> ExecResult {
        if let Some(result) = self.exec_results.pop_front() {
            return result;
        }

        let upper = sql.trim_start().to_uppercase();
        if let Some(rest) = upper.strip_prefix("CREATE TABLE IF NOT EXISTS ") {
            self.tables.insert(first_word(rest).to_lowercase());
            return ExecResult::default();
        }
        if let Some(rest) = upper.strip_prefix("DROP TABLE IF EXISTS ") {
            self.tables.remove(&first_word(rest).to_lowercase());
            return ExecResult::default();
        }
        if upper.starts_with("INSERT") {
            let last_insert_id = match kind {
                DialectKind::MySql => Some(self.take_insert_id()),
                DialectKind::Postgres => None,
            };
            return ExecResult {
                rows_affected: 1,
                last_insert_id,
            };
        }
        ExecResult::default()
    }

    fn query(&mut self, sql: &str, args: &[Value]) -> Vec<Row> {
        if sql.contains("information_schema.tables") {
            let exists = args
                .last()
                .and_then(Value::as_str)
                .map_or(false, |table| self.tables.contains(&table.to_lowercase()));
            return vec![Row::from_pairs([("count", i64::from(exists))])];
        }

        if let Some(rows) = self.rows.pop_front() {
            return rows;
        }

        let upper = sql.to_uppercase();
        if upper.trim_start().starts_with("INSERT") {
            if let Some(pos) = upper.rfind(" RETURNING ") {
                let column = sql[pos + " RETURNING ".len()..].trim().to_string();
                let id = self.take_insert_id();
                return vec![Row::from_pairs([(column, id)])];
            }
        }

        Vec::new()
    }

    fn take_insert_id(&mut self) -> i64 {
        let id = self.next_insert_id;
        self.next_insert_id += 1;
        id
    }
}

fn first_word(s: &str) -> &str {
    s.split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
}

/// Recording dialect for tests
#[derive(Debug, Clone)]
pub struct MockDialect {
    kind: DialectKind,
    state: Arc<Mutex<MockState>>,
}

impl MockDialect {
    pub fn new(kind: DialectKind) -> Self {
        Self {
            kind,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    pub fn mysql() -> Self {
        Self::new(DialectKind::MySql)
    }

    pub fn postgres() -> Self {
        Self::new(DialectKind::Postgres)
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the rows returned by the next query
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.state().rows.push_back(rows);
    }

    /// Queue the result of the next exec
    pub fn push_exec_result(&self, result: ExecResult) {
        self.state().exec_results.push_back(result);
    }

    /// Fail the next statement with `error`
    pub fn push_error(&self, error: ModelError) {
        self.state().errors.push_back(error);
    }

    pub fn fail_next_commit(&self, error: ModelError) {
        self.state().commit_errors.push_back(error);
    }

    pub fn fail_next_rollback(&self, error: ModelError) {
        self.state().rollback_errors.push_back(error);
    }

    pub fn set_next_insert_id(&self, id: i64) {
        self.state().next_insert_id = id;
    }

    pub fn add_table(&self, table: &str) {
        self.state().tables.insert(table.to_lowercase());
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.state().tables.contains(&table.to_lowercase())
    }

    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.state().statements.clone()
    }

    /// SQL text of every recorded statement, in order
    pub fn executed_sql(&self) -> Vec<String> {
        self.state().statements.iter().map(|s| s.sql.clone()).collect()
    }

    pub fn last_statement(&self) -> Option<RecordedStatement> {
        self.state().statements.last().cloned()
    }

    pub fn clear_statements(&self) {
        self.state().statements.clear();
    }

    pub fn begin_count(&self) -> usize {
        self.state().begins
    }

    pub fn commit_count(&self) -> usize {
        self.state().commits
    }

    pub fn rollback_count(&self) -> usize {
        self.state().rollbacks
    }
}

#[async_trait]
impl Dialect for MockDialect {
    fn kind(&self) -> DialectKind {
        self.kind
    }

    async fn connect(&self, config: &ConnectionConfig) -> OrmResult<()> {
        config.validate()?;
        self.state().connected = true;
        Ok(())
    }

    async fn close(&self) -> OrmResult<()> {
        self.state().connected = false;
        Ok(())
    }

    async fn ping(&self) -> OrmResult<()> {
        if self.state().connected {
            Ok(())
        } else {
            Err(ModelError::NotConnected)
        }
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> OrmResult<ExecResult> {
        let mut state = self.state();
        state.record(sql, args, false)?;
        Ok(state.exec(self.kind, sql))
    }

    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        let mut state = self.state();
        state.record(sql, args, false)?;
        Ok(state.query(sql, args))
    }

    async fn begin_tx(&self, options: &TransactionOptions) -> OrmResult<Box<dyn Transaction>> {
        let mut state = self.state();
        state.record("BEGIN", &[], true)?;
        state.begins += 1;
        debug!("Mock transaction started with {:?}", options);
        Ok(Box::new(MockTransaction {
            kind: self.kind,
            state: Arc::clone(&self.state),
        }))
    }
}

/// Transaction handed out by [`MockDialect`]
#[derive(Debug)]
pub struct MockTransaction {
    kind: DialectKind,
    state: Arc<Mutex<MockState>>,
}

impl MockTransaction {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transaction for MockTransaction {
    async fn exec(&mut self, sql: &str, args: &[Value]) -> OrmResult<ExecResult> {
        let kind = self.kind;
        let mut state = self.state();
        state.record(sql, args, true)?;
        Ok(state.exec(kind, sql))
    }

    async fn query(&mut self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        let mut state = self.state();
        state.record(sql, args, true)?;
        Ok(state.query(sql, args))
    }

    async fn commit(self: Box<Self>) -> OrmResult<()> {
        let mut state = self.state();
        state.record("COMMIT", &[], true)?;
        if let Some(err) = state.commit_errors.pop_front() {
            return Err(err);
        }
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> OrmResult<()> {
        let mut state = self.state();
        state.record("ROLLBACK", &[], true)?;
        if let Some(err) = state.rollback_errors.pop_front() {
            return Err(err);
        }
        state.rollbacks += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("localhost", 5432, "app", "shop")
    }

    #[tokio::test]
    async fn test_requires_connect() {
        let mock = MockDialect::postgres();
        assert!(matches!(
            mock.exec("DELETE FROM users", &[]).await,
            Err(ModelError::NotConnected)
        ));
        assert!(mock.statements().is_empty());

        mock.connect(&config()).await.unwrap();
        assert!(mock.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_simulated_insert_ids() {
        let mysql = MockDialect::mysql();
        mysql.connect(&config()).await.unwrap();
        mysql.set_next_insert_id(7);

        let result = mysql.exec("INSERT INTO users (name) VALUES (?)", &["a".into()]).await.unwrap();
        assert_eq!(result.last_insert_id, Some(7));

        let postgres = MockDialect::postgres();
        postgres.connect(&config()).await.unwrap();
        let rows = postgres
            .query("INSERT INTO users (name) VALUES ($1) RETURNING id", &["a".into()])
            .await
            .unwrap();
        assert_eq!(rows[0].get("id"), Some(&Value::Integer(1)));
    }

    #[tokio::test]
    async fn test_table_tracking() {
        let mock = MockDialect::mysql();
        mock.connect(&config()).await.unwrap();

        assert!(!mock.table_exists("users").await.unwrap());
        mock.exec("CREATE TABLE IF NOT EXISTS users (id INT)", &[]).await.unwrap();
        assert!(mock.table_exists("users").await.unwrap());
        mock.drop_table("users").await.unwrap();
        assert!(!mock.has_table("users"));
    }

    #[tokio::test]
    async fn test_scripted_errors_and_transactions() {
        let mock = MockDialect::postgres();
        mock.connect(&config()).await.unwrap();
        mock.push_error(ModelError::Database("boom".to_string()));

        assert!(mock.query("SELECT 1", &[]).await.is_err());
        assert!(mock.query("SELECT 1", &[]).await.is_ok());

        let mut tx = mock.begin_tx(&TransactionOptions::default()).await.unwrap();
        tx.exec("UPDATE users SET name = $1", &["x".into()]).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(mock.begin_count(), 1);
        assert_eq!(mock.commit_count(), 1);
        let statements = mock.statements();
        assert!(statements.last().unwrap().in_transaction);
        assert_eq!(statements.last().unwrap().sql, "COMMIT");
    }
}
