//! Repository - CRUD over one model type
//!
//! A [`Repository`] pairs a model's cached metadata with an [`Executor`].
//! Reads go through the query builder; writes compile their own statements.
//! With a soft-delete column configured, reads only see rows whose
//! soft-delete column is NULL.
//!
//! - `persistence`: save / insert / update / delete and batch variants
//! - `soft_delete`: soft delete, restore, force delete, trashed rows
//! - `aggregates`: chunking, plucking, increment / decrement
//! - `mapping`: row → model conversion

pub mod aggregates;
pub mod mapping;
pub mod persistence;
pub mod soft_delete;

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{ModelError, OrmResult};
use crate::executor::Executor;
use crate::metadata::ModelMetadata;
use crate::model::Model;
use crate::query::sql_generation::SqlWriter;
use crate::query::{ConditionKind, QueryBuilder};
use crate::value::Value;

pub use mapping::row_to_model;

/// Column / value pairs matched with equality, joined by AND
pub type Criteria<'a> = &'a [(&'a str, Value)];

/// Generic repository for one model type
pub struct Repository<M: Model> {
    executor: Executor,
    metadata: OrmResult<Arc<ModelMetadata>>,
    _phantom: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for Repository<M> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            metadata: self.metadata.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<M: Model> std::fmt::Debug for Repository<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("model", &std::any::type_name::<M>())
            .field("executor", &self.executor)
            .finish()
    }
}

impl<M: Model> Repository<M> {
    /// Repository over `executor`. A failed metadata lookup is reported by
    /// every operation before any SQL is issued.
    pub fn new(executor: Executor, metadata: OrmResult<Arc<ModelMetadata>>) -> Self {
        Self {
            executor,
            metadata,
            _phantom: PhantomData,
        }
    }

    pub fn metadata(&self) -> OrmResult<&Arc<ModelMetadata>> {
        self.metadata.as_ref().map_err(Clone::clone)
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Builder over the model's table, excluding soft-deleted rows
    pub fn query(&self) -> QueryBuilder<M> {
        let builder = QueryBuilder::bound(self.executor.clone(), self.metadata.clone());
        match self.metadata.as_ref().ok().and_then(|m| m.soft_delete_column.clone()) {
            Some(column) => builder.scoped(ConditionKind::Null {
                column,
                negated: false,
            }),
            None => builder,
        }
    }

    /// Builder over every row, trashed ones included
    pub(crate) fn unscoped(&self) -> QueryBuilder<M> {
        QueryBuilder::bound(self.executor.clone(), self.metadata.clone())
    }

    fn primary_key_name(&self) -> OrmResult<String> {
        let metadata = self.metadata()?;
        metadata.primary_key.clone().ok_or_else(|| {
            ModelError::Schema(format!("{} has no primary key column", metadata.type_name))
        })
    }

    /// Find a model by its primary key
    pub async fn find(&self, id: impl Into<Value>) -> OrmResult<Option<M>> {
        let pk = self.primary_key_name()?;
        self.query().where_eq(&pk, id).find_one().await
    }

    /// Find a model by its primary key or fail with `NotFound`
    pub async fn find_or_fail(&self, id: impl Into<Value>) -> OrmResult<M> {
        let table = self.metadata()?.table_name.clone();
        self.find(id).await?.ok_or(ModelError::NotFound(table))
    }

    pub async fn find_all(&self) -> OrmResult<Vec<M>> {
        self.query().find().await
    }

    /// Rows equal to every criterion; a NULL criterion matches `IS NULL`
    pub async fn find_by(&self, criteria: Criteria<'_>) -> OrmResult<Vec<M>> {
        self.metadata()?;
        apply_criteria(self.query(), criteria).find().await
    }

    pub async fn find_one_by(&self, criteria: Criteria<'_>) -> OrmResult<Option<M>> {
        self.metadata()?;
        apply_criteria(self.query(), criteria).find_one().await
    }

    pub async fn count(&self) -> OrmResult<u64> {
        self.metadata()?;
        self.query().count().await
    }

    /// Whether a row with primary key `id` exists
    pub async fn exists(&self, id: impl Into<Value>) -> OrmResult<bool> {
        let pk = self.primary_key_name()?;
        self.query().where_eq(&pk, id).exists().await
    }
}

fn apply_criteria<M>(builder: QueryBuilder<M>, criteria: Criteria<'_>) -> QueryBuilder<M> {
    criteria
        .iter()
        .fold(builder, |b, (column, value)| b.where_eq(column, value.clone()))
}

/// Write `column = ? AND …` for `criteria` into `w`
pub(crate) fn write_criteria(w: &mut SqlWriter, criteria: Criteria<'_>) {
    for (i, (column, value)) in criteria.iter().enumerate() {
        if i > 0 {
            w.push(" AND ");
        }
        w.push(column);
        if value.is_null() {
            w.push(" IS NULL");
        } else {
            w.push(" = ");
            w.bind(value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::DialectKind;

    #[test]
    fn test_write_criteria() {
        let mut w = SqlWriter::new(DialectKind::Postgres);
        write_criteria(
            &mut w,
            &[("status", "active".into()), ("deleted_at", Value::Null), ("age", 30.into())],
        );
        let (sql, args) = w.finish();
        assert_eq!(sql, "status = $1 AND deleted_at IS NULL AND age = $2");
        assert_eq!(args, vec![Value::from("active"), Value::Integer(30)]);
    }
}
