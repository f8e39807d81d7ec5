//! Soft delete support

use std::sync::Arc;

use chrono::Utc;

use super::mapping::primary_key;
use super::Repository;
use crate::error::{ModelError, OrmResult};
use crate::metadata::{Column, ModelMetadata};
use crate::model::Model;
use crate::query::sql_generation::SqlWriter;
use crate::value::Value;

impl<M: Model> Repository<M> {
    fn soft_delete_target(&self) -> OrmResult<(Arc<ModelMetadata>, Column)> {
        let metadata = self.metadata()?.clone();
        let column = metadata.soft_delete().cloned().ok_or_else(|| {
            ModelError::Unsupported(format!(
                "soft delete not enabled for {}",
                metadata.type_name
            ))
        })?;
        Ok((metadata, column))
    }

    async fn set_soft_delete(&self, entity: &mut M, value: Value) -> OrmResult<()> {
        let (metadata, soft) = self.soft_delete_target()?;
        let (pk_column, pk_value) = primary_key(&metadata, entity)?;

        let mut w = SqlWriter::new(self.executor.kind());
        w.push(&format!("UPDATE {} SET {} = ", metadata.table_name, soft.name));
        if value.is_null() {
            w.push("NULL");
        } else {
            w.bind(value.clone());
        }
        w.push(&format!(" WHERE {} = ", pk_column.name));
        w.bind(pk_value);
        let (sql, args) = w.finish();

        self.executor
            .exec(&sql, &args)
            .await
            .map_err(|e| e.context(format!("failed to update {}", metadata.table_name)))?;
        entity.set_field(&soft.field, value)
    }

    /// Mark `entity` deleted by setting its soft-delete column to now
    pub async fn soft_delete(&self, entity: &mut M) -> OrmResult<()> {
        self.set_soft_delete(entity, Value::Timestamp(Utc::now())).await
    }

    /// Clear the soft-delete column of `entity`
    pub async fn restore(&self, entity: &mut M) -> OrmResult<()> {
        self.set_soft_delete(entity, Value::Null).await
    }

    /// Permanently delete `entity`, soft-delete column or not
    pub async fn force_delete(&self, entity: &mut M) -> OrmResult<()> {
        let metadata = self.metadata()?.clone();
        self.delete_row(&metadata, entity).await?;
        Ok(())
    }

    /// Rows that have been soft-deleted
    pub async fn find_trashed(&self) -> OrmResult<Vec<M>> {
        let (_, soft) = self.soft_delete_target()?;
        self.unscoped().where_not_null(&soft.name).find().await
    }
}
