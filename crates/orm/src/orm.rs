//! ORM facade
//!
//! [`Orm`] owns the dialect, the metadata manager and the model registry.
//! It hands out query builders and repositories bound to the pooled
//! connection, runs schema operations, and opens transaction [`Scope`]s.
//! A scope exposes the same data operations on the transaction's connection
//! but has no schema operations and cannot open a nested transaction.

use std::any::TypeId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use crate::backends::{Dialect, DialectKind, ExecResult, MySqlDialect, PostgresDialect};
use crate::config::ConnectionConfig;
use crate::error::{ModelError, OrmResult};
use crate::executor::Executor;
use crate::metadata::{MetadataManager, ModelMetadata};
use crate::model::Model;
use crate::query::QueryBuilder;
use crate::repository::Repository;
use crate::transaction::{run_scoped, TransactionHandle, TransactionOptions, TransactionState};
use crate::value::{Row, Value};

#[derive(Default)]
struct Registry {
    models: HashMap<TypeId, Arc<ModelMetadata>>,
    connected: bool,
}

struct OrmInner {
    dialect: Arc<dyn Dialect>,
    metadata: MetadataManager,
    registry: RwLock<Registry>,
}

/// Entry point of the ORM. Cloning shares the same dialect and registry.
#[derive(Clone)]
pub struct Orm {
    inner: Arc<OrmInner>,
}

impl std::fmt::Debug for Orm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry();
        f.debug_struct("Orm")
            .field("dialect", &self.inner.dialect.kind())
            .field("models", &registry.models.len())
            .field("connected", &registry.connected)
            .finish()
    }
}

impl Orm {
    pub fn new(dialect: impl Dialect + 'static) -> Self {
        Self::with_dialect(Arc::new(dialect))
    }

    pub fn with_dialect(dialect: Arc<dyn Dialect>) -> Self {
        Self {
            inner: Arc::new(OrmInner {
                dialect,
                metadata: MetadataManager::new(),
                registry: RwLock::new(Registry::default()),
            }),
        }
    }

    /// Orm with the driver-backed dialect for `kind`, not yet connected
    pub fn for_kind(kind: DialectKind) -> Self {
        match kind {
            DialectKind::MySql => Self::new(MySqlDialect::new()),
            DialectKind::Postgres => Self::new(PostgresDialect::new()),
        }
    }

    /// Parse a `mysql://` or `postgres://` URL and connect to it
    pub async fn connect_url(url: &str) -> OrmResult<Self> {
        let (kind, config) = ConnectionConfig::from_url(url)?;
        let orm = Self::for_kind(kind);
        orm.connect(&config).await?;
        Ok(orm)
    }

    fn registry(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        self.inner.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> std::sync::RwLockWriteGuard<'_, Registry> {
        self.inner.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.inner.dialect
    }

    pub fn kind(&self) -> DialectKind {
        self.inner.dialect.kind()
    }

    pub fn metadata_manager(&self) -> &MetadataManager {
        &self.inner.metadata
    }

    /// Open the dialect's connection pool
    pub async fn connect(&self, config: &ConnectionConfig) -> OrmResult<()> {
        self.inner.dialect.connect(config).await?;
        self.registry_mut().connected = true;
        info!("ORM connected to {} at {}:{}", self.kind(), config.host, config.port);
        Ok(())
    }

    pub async fn close(&self) -> OrmResult<()> {
        self.inner.dialect.close().await?;
        self.registry_mut().connected = false;
        info!("ORM connection closed");
        Ok(())
    }

    pub async fn ping(&self) -> OrmResult<()> {
        self.inner.dialect.ping().await
    }

    pub fn is_connected(&self) -> bool {
        self.registry().connected
    }

    /// Extract and register `M`'s metadata. Registering twice returns the
    /// same cached metadata.
    pub fn register_model<M: Model>(&self) -> OrmResult<Arc<ModelMetadata>> {
        let metadata = self.inner.metadata.extract_metadata::<M>()?;
        let mut registry = self.registry_mut();
        let entry = registry
            .models
            .entry(TypeId::of::<M>())
            .or_insert_with(|| {
                debug!("Registered model {} as table {}", metadata.type_name, metadata.table_name);
                Arc::clone(&metadata)
            });
        Ok(Arc::clone(entry))
    }

    /// Metadata of a registered model
    pub fn metadata<M: Model>(&self) -> OrmResult<Arc<ModelMetadata>> {
        self.registry()
            .models
            .get(&TypeId::of::<M>())
            .cloned()
            .ok_or_else(|| {
                ModelError::Schema(format!(
                    "Model {} is not registered",
                    std::any::type_name::<M>()
                ))
            })
    }

    /// Metadata of every registered model, in no particular order
    pub fn registered_models(&self) -> Vec<Arc<ModelMetadata>> {
        self.registry().models.values().cloned().collect()
    }

    /// Drop every registered model and cached metadata
    pub fn clear_metadata_cache(&self) {
        self.registry_mut().models.clear();
        self.inner.metadata.clear_cache();
    }

    fn pooled(&self) -> Executor {
        Executor::Pooled(Arc::clone(&self.inner.dialect))
    }

    /// Query builder over `M`'s table
    pub fn query<M: Model>(&self) -> QueryBuilder<M> {
        QueryBuilder::bound(self.pooled(), self.metadata::<M>())
    }

    /// Untyped query builder over `table`
    pub fn table(&self, table: &str) -> QueryBuilder<()> {
        QueryBuilder::new(self.kind()).with_executor(self.pooled()).from(table)
    }

    pub fn repository<M: Model>(&self) -> Repository<M> {
        Repository::new(self.pooled(), self.metadata::<M>())
    }

    /// Execute a raw statement on the pool
    pub async fn exec(&self, sql: &str, args: &[Value]) -> OrmResult<ExecResult> {
        self.inner
            .dialect
            .exec(sql, args)
            .await
            .map_err(|e| e.context("failed to execute statement"))
    }

    /// Run a raw query on the pool
    pub async fn raw_query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        self.inner
            .dialect
            .query(sql, args)
            .await
            .map_err(|e| e.context("failed to run query"))
    }

    /// `CREATE TABLE IF NOT EXISTS` for `M`, followed by its indexes
    pub async fn create_table<M: Model>(&self) -> OrmResult<()> {
        let metadata = self.metadata::<M>()?;
        self.create_table_for(&metadata).await
    }

    async fn create_table_for(&self, metadata: &ModelMetadata) -> OrmResult<()> {
        let dialect = &self.inner.dialect;
        dialect
            .create_table(&metadata.table_name, &metadata.columns)
            .await
            .map_err(|e| e.context(format!("failed to create table {}", metadata.table_name)))?;

        for index in &metadata.indexes {
            let sql = self.kind().create_index_sql(&metadata.table_name, index);
            dialect
                .exec(&sql, &[])
                .await
                .map_err(|e| e.context(format!("failed to create index {}", index.name)))?;
        }
        info!("Created table {}", metadata.table_name);
        Ok(())
    }

    pub async fn drop_table<M: Model>(&self) -> OrmResult<()> {
        let metadata = self.metadata::<M>()?;
        self.inner
            .dialect
            .drop_table(&metadata.table_name)
            .await
            .map_err(|e| e.context(format!("failed to drop table {}", metadata.table_name)))
    }

    pub async fn table_exists<M: Model>(&self) -> OrmResult<bool> {
        let metadata = self.metadata::<M>()?;
        self.inner
            .dialect
            .table_exists(&metadata.table_name)
            .await
            .map_err(|e| e.context(format!("failed to inspect table {}", metadata.table_name)))
    }

    /// Create the table of every registered model that does not exist yet
    pub async fn auto_migrate(&self) -> OrmResult<()> {
        let mut models = self.registered_models();
        models.sort_by(|a, b| a.table_name.cmp(&b.table_name));
        for metadata in models {
            let exists = self
                .inner
                .dialect
                .table_exists(&metadata.table_name)
                .await
                .map_err(|e| e.context(format!("failed to inspect table {}", metadata.table_name)))?;
            if !exists {
                self.create_table_for(&metadata).await?;
            }
        }
        Ok(())
    }

    /// Begin a transaction for manual commit / rollback
    pub async fn begin(&self, options: TransactionOptions) -> OrmResult<Scope> {
        let handle = TransactionHandle::begin(self.inner.dialect.as_ref(), &options)
            .await
            .map_err(|e| e.context("failed to begin transaction"))?;
        Ok(Scope {
            orm: self.clone(),
            handle,
        })
    }

    /// Run `work` in a transaction with default options.
    ///
    /// Commits when `work` returns `Ok`. An `Err` rolls back and is returned
    /// unchanged, or as `RollbackFailed` when the rollback fails too. A panic
    /// rolls back before it continues unwinding.
    pub async fn transaction<T, F, Fut>(&self, work: F) -> OrmResult<T>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = OrmResult<T>> + Send,
    {
        self.transaction_with(TransactionOptions::default(), work).await
    }

    pub async fn transaction_with<T, F, Fut>(&self, options: TransactionOptions, work: F) -> OrmResult<T>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = OrmResult<T>> + Send,
    {
        let scope = self.begin(options).await?;
        let handle = scope.handle.clone();
        run_scoped(handle, work(scope)).await
    }
}

/// Data operations inside one transaction
#[derive(Clone, Debug)]
pub struct Scope {
    orm: Orm,
    handle: TransactionHandle,
}

impl Scope {
    fn executor(&self) -> Executor {
        Executor::Transaction(self.handle.clone())
    }

    pub fn kind(&self) -> DialectKind {
        self.handle.kind()
    }

    pub fn handle(&self) -> &TransactionHandle {
        &self.handle
    }

    pub fn query<M: Model>(&self) -> QueryBuilder<M> {
        QueryBuilder::bound(self.executor(), self.orm.metadata::<M>())
    }

    pub fn table(&self, table: &str) -> QueryBuilder<()> {
        QueryBuilder::new(self.kind()).with_executor(self.executor()).from(table)
    }

    pub fn repository<M: Model>(&self) -> Repository<M> {
        Repository::new(self.executor(), self.orm.metadata::<M>())
    }

    pub async fn exec(&self, sql: &str, args: &[Value]) -> OrmResult<ExecResult> {
        self.handle
            .exec(sql, args)
            .await
            .map_err(|e| e.context("failed to execute statement"))
    }

    pub async fn raw_query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        self.handle
            .query(sql, args)
            .await
            .map_err(|e| e.context("failed to run query"))
    }

    pub async fn state(&self) -> TransactionState {
        self.handle.state().await
    }

    pub async fn commit(&self) -> OrmResult<()> {
        self.handle.commit().await
    }

    pub async fn rollback(&self) -> OrmResult<()> {
        self.handle.rollback().await
    }
}
