//! Chunked iteration, column plucking and counters

use super::Repository;
use crate::error::{ModelError, OrmResult};
use crate::model::Model;
use crate::query::sql_generation::SqlWriter;
use crate::value::Value;

impl<M: Model> Repository<M> {
    /// Call `callback` once per page of `size` models, paging by offset in
    /// primary key order. Stops after an empty or short page.
    pub async fn chunk<F>(&self, size: u64, mut callback: F) -> OrmResult<()>
    where
        F: FnMut(Vec<M>) -> OrmResult<()>,
    {
        if size == 0 {
            return Err(ModelError::Query("Chunk size must be positive".to_string()));
        }
        let metadata = self.metadata()?.clone();

        let mut offset = 0;
        loop {
            let mut page = self.query();
            if let Some(pk) = &metadata.primary_key {
                page = page.order_by_asc(pk);
            }
            let models = page.limit(size).offset(offset).find().await?;
            if models.is_empty() {
                break;
            }

            let short = (models.len() as u64) < size;
            callback(models)?;
            if short {
                break;
            }
            offset += size;
        }
        Ok(())
    }

    /// Call `callback` for every model, one at a time
    pub async fn each<F>(&self, mut callback: F) -> OrmResult<()>
    where
        F: FnMut(M) -> OrmResult<()>,
    {
        self.chunk(1, |models| models.into_iter().try_for_each(&mut callback))
            .await
    }

    /// Every value of `column`
    pub async fn pluck(&self, column: &str) -> OrmResult<Vec<Value>> {
        self.metadata()?;
        let rows = self.query().select(&[column]).rows().await?;
        Ok(rows
            .into_iter()
            .map(|row| row.get_by_index(0).cloned().unwrap_or(Value::Null))
            .collect())
    }

    /// `column` of the first row, `None` for an empty table
    pub async fn value(&self, column: &str) -> OrmResult<Option<Value>> {
        self.metadata()?;
        let rows = self.query().select(&[column]).limit(1).rows().await?;
        Ok(rows.first().and_then(|row| row.get_by_index(0).cloned()))
    }

    /// Add `amount` to `column` on every row of the table
    pub async fn increment(&self, column: &str, amount: i64) -> OrmResult<u64> {
        self.adjust(column, "+", amount).await
    }

    /// Subtract `amount` from `column` on every row of the table
    pub async fn decrement(&self, column: &str, amount: i64) -> OrmResult<u64> {
        self.adjust(column, "-", amount).await
    }

    // no row filter: applies table-wide
    async fn adjust(&self, column: &str, sign: &str, amount: i64) -> OrmResult<u64> {
        let metadata = self.metadata()?.clone();
        let mut w = SqlWriter::new(self.executor.kind());
        w.push(&format!(
            "UPDATE {} SET {} = {} {} ",
            metadata.table_name, column, column, sign
        ));
        w.bind(Value::Integer(amount));
        let (sql, args) = w.finish();

        let result = self
            .executor
            .exec(&sql, &args)
            .await
            .map_err(|e| e.context(format!("failed to update {}", metadata.table_name)))?;
        Ok(result.rows_affected)
    }
}
