//! Query Builder - Core builder implementation
//!
//! A builder accumulates one SELECT. Chain methods consume and return it;
//! the first error recorded along the way turns every later chain call
//! into a no-op and is returned by the terminal call.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::backends::DialectKind;
use crate::error::{ModelError, OrmResult};
use crate::executor::Executor;
use crate::metadata::ModelMetadata;

use super::types::*;

/// Query builder for constructing database queries
pub struct QueryBuilder<M = ()> {
    pub(crate) kind: DialectKind,
    pub(crate) executor: Option<Executor>,
    pub(crate) metadata: Option<Arc<ModelMetadata>>,
    pub(crate) select_fields: Vec<String>,
    pub(crate) from_table: Option<String>,
    pub(crate) joins: Vec<JoinClause>,
    /// Filters every read must keep, e.g. the soft-delete scope
    pub(crate) scope_conditions: Vec<ConditionKind>,
    pub(crate) where_conditions: Vec<WhereCondition>,
    pub(crate) group_by: Vec<String>,
    pub(crate) having_conditions: Vec<WhereCondition>,
    pub(crate) order_by: Vec<(String, OrderDirection)>,
    pub(crate) limit_count: Option<u64>,
    pub(crate) offset_value: Option<u64>,
    pub(crate) distinct: bool,
    pub(crate) lock: Option<LockMode>,
    pub(crate) unions: Vec<UnionClause>,
    pub(crate) eager_loads: Vec<EagerLoad>,
    pub(crate) cache: CachePolicy,
    pub(crate) raw: Option<RawQuery>,
    pub(crate) error: Option<ModelError>,
    _phantom: PhantomData<fn() -> M>,
}

impl<M> Clone for QueryBuilder<M> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            executor: self.executor.clone(),
            metadata: self.metadata.clone(),
            select_fields: self.select_fields.clone(),
            from_table: self.from_table.clone(),
            joins: self.joins.clone(),
            scope_conditions: self.scope_conditions.clone(),
            where_conditions: self.where_conditions.clone(),
            group_by: self.group_by.clone(),
            having_conditions: self.having_conditions.clone(),
            order_by: self.order_by.clone(),
            limit_count: self.limit_count,
            offset_value: self.offset_value,
            distinct: self.distinct,
            lock: self.lock,
            unions: self.unions.clone(),
            eager_loads: self.eager_loads.clone(),
            cache: self.cache,
            raw: self.raw.clone(),
            error: self.error.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<M> fmt::Debug for QueryBuilder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("kind", &self.kind)
            .field("table", &self.from_table)
            .field("bound", &self.executor.is_some())
            .field("scope_conditions", &self.scope_conditions)
            .field("where_conditions", &self.where_conditions)
            .field("raw", &self.raw)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<M> QueryBuilder<M> {
    /// Create an unbound builder producing SQL for `kind`
    pub fn new(kind: DialectKind) -> Self {
        Self {
            kind,
            executor: None,
            metadata: None,
            select_fields: Vec::new(),
            from_table: None,
            joins: Vec::new(),
            scope_conditions: Vec::new(),
            where_conditions: Vec::new(),
            group_by: Vec::new(),
            having_conditions: Vec::new(),
            order_by: Vec::new(),
            limit_count: None,
            offset_value: None,
            distinct: false,
            lock: None,
            unions: Vec::new(),
            eager_loads: Vec::new(),
            cache: CachePolicy::Default,
            raw: None,
            error: None,
            _phantom: PhantomData,
        }
    }

    /// Builder bound to an executor and, when resolved, a model's metadata.
    /// A failed metadata lookup is carried as the builder's error.
    pub(crate) fn bound(executor: Executor, metadata: OrmResult<Arc<ModelMetadata>>) -> Self {
        let mut builder = Self::new(executor.kind());
        builder.executor = Some(executor);
        match metadata {
            Ok(metadata) => {
                builder.from_table = Some(metadata.table_name.clone());
                builder.metadata = Some(metadata);
            }
            Err(e) => builder.error = Some(e),
        }
        builder
    }

    /// Attach an executor to run terminal calls against
    pub fn with_executor(mut self, executor: Executor) -> Self {
        self.kind = executor.kind();
        self.executor = Some(executor);
        self
    }

    /// The error recorded on this builder, if any
    pub fn error(&self) -> Option<&ModelError> {
        self.error.as_ref()
    }

    pub fn table_name(&self) -> Option<&str> {
        self.from_table.as_deref()
    }

    pub fn dialect_kind(&self) -> DialectKind {
        self.kind
    }

    /// Declared eager loads, recorded for callers but never executed
    pub fn eager_loads(&self) -> &[EagerLoad] {
        &self.eager_loads
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache
    }

    /// Drop the model type, keeping all accumulated state
    pub fn into_untyped(self) -> QueryBuilder<()> {
        QueryBuilder {
            kind: self.kind,
            executor: self.executor,
            metadata: self.metadata,
            select_fields: self.select_fields,
            from_table: self.from_table,
            joins: self.joins,
            scope_conditions: self.scope_conditions,
            where_conditions: self.where_conditions,
            group_by: self.group_by,
            having_conditions: self.having_conditions,
            order_by: self.order_by,
            limit_count: self.limit_count,
            offset_value: self.offset_value,
            distinct: self.distinct,
            lock: self.lock,
            unions: self.unions,
            eager_loads: self.eager_loads,
            cache: self.cache,
            raw: self.raw,
            error: self.error,
            _phantom: PhantomData,
        }
    }

    /// Apply `f` unless an error is already recorded
    pub(crate) fn update(mut self, f: impl FnOnce(&mut Self)) -> Self {
        if self.error.is_none() {
            f(&mut self);
        }
        self
    }

    /// Record `error` unless an earlier one is already recorded
    pub(crate) fn fail(mut self, error: ModelError) -> Self {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self
    }

    pub(crate) fn push_condition(self, conjunction: Conjunction, kind: ConditionKind) -> Self {
        self.update(|b| b.where_conditions.push(WhereCondition { conjunction, kind }))
    }

    /// Add a filter that caller conditions, `or_where` included, cannot widen
    pub(crate) fn scoped(self, kind: ConditionKind) -> Self {
        self.update(|b| b.scope_conditions.push(kind))
    }
}
