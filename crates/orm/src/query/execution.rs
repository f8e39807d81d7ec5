//! Query Builder execution
//!
//! Terminal calls never modify the builder: `count`, `exists` and
//! `find_one` each run a derived copy.

use tracing::debug;

use super::builder::QueryBuilder;
use crate::error::{ModelError, OrmResult};
use crate::executor::Executor;
use crate::model::Model;
use crate::repository::mapping::row_to_model;
use crate::value::{Row, Value};

impl<M> QueryBuilder<M> {
    fn executor(&self) -> OrmResult<&Executor> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        self.executor
            .as_ref()
            .ok_or_else(|| ModelError::Query("Query builder is not bound to a database".to_string()))
    }

    fn describe_target(&self) -> String {
        self.from_table
            .clone()
            .unwrap_or_else(|| "raw query".to_string())
    }

    async fn fetch(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        let executor = self.executor()?;
        debug!("Executing query: {}", sql);
        executor
            .query(sql, args)
            .await
            .map_err(|e| e.context(format!("failed to query {}", self.describe_target())))
    }

    /// Execute and return the raw rows
    pub async fn rows(&self) -> OrmResult<Vec<Row>> {
        self.executor()?;
        let (sql, args) = self.to_sql()?;
        self.fetch(&sql, &args).await
    }

    /// Number of rows the query matches. ORDER BY, LIMIT and OFFSET are
    /// dropped, so a paginated builder counts every matching row.
    pub async fn count(&self) -> OrmResult<u64> {
        self.executor()?;

        let mut scoped = self.clone();
        scoped.order_by.clear();
        scoped.limit_count = None;
        scoped.offset_value = None;

        let (sql, args) = if self.raw.is_some()
            || !self.unions.is_empty()
            || !self.group_by.is_empty()
            || self.distinct
        {
            let (sql, args) = scoped.to_sql()?;
            (format!("SELECT COUNT(*) FROM ({}) AS counted", sql), args)
        } else {
            scoped.select_fields = vec!["COUNT(*)".to_string()];
            scoped.to_sql()?
        };

        let rows = self.fetch(&sql, &args).await?;
        match rows.first().and_then(|row| row.get_by_index(0)) {
            None => Ok(0),
            Some(value) => value
                .as_i64()
                .and_then(|n| u64::try_from(n).ok())
                .ok_or_else(|| {
                    ModelError::Conversion(format!("COUNT(*) returned {}", value.type_name()))
                }),
        }
    }

    /// Whether the query matches at least one row
    pub async fn exists(&self) -> OrmResult<bool> {
        self.executor()?;

        let (sql, args) = if self.raw.is_some() || !self.unions.is_empty() {
            let (sql, args) = self.to_sql()?;
            (format!("SELECT 1 FROM ({}) AS matched LIMIT 1", sql), args)
        } else {
            let mut scoped = self.clone();
            scoped.select_fields = vec!["1".to_string()];
            scoped.limit_count = Some(1);
            scoped.to_sql()?
        };

        Ok(!self.fetch(&sql, &args).await?.is_empty())
    }
}

impl<M: Model> QueryBuilder<M> {
    /// Execute and map every row into `M`
    pub async fn find(&self) -> OrmResult<Vec<M>> {
        let rows = self.rows().await?;
        let metadata = self.metadata.as_ref().ok_or_else(|| {
            ModelError::Query(format!("No metadata for {}", std::any::type_name::<M>()))
        })?;
        rows.into_iter()
            .map(|row| row_to_model::<M>(metadata, row))
            .collect()
    }

    /// First matching row, or `None` when nothing matches
    pub async fn find_one(&self) -> OrmResult<Option<M>> {
        let scoped = if self.raw.is_some() {
            self.clone()
        } else {
            self.clone().limit(1)
        };
        Ok(scoped.find().await?.into_iter().next())
    }
}
