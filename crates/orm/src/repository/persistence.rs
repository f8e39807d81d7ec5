//! Persistence operations: save, insert, update, delete

use chrono::Utc;
use tracing::debug;

use super::mapping::{column_value, primary_key};
use super::{write_criteria, Criteria, Repository};
use crate::backends::{DialectKind, ExecResult};
use crate::error::{ModelError, OrmResult};
use crate::metadata::{Column, ModelMetadata};
use crate::model::Model;
use crate::query::sql_generation::SqlWriter;
use crate::value::Value;

/// Write a value list entry: NULL inline, anything else bound
fn write_value(w: &mut SqlWriter, value: Value) {
    if value.is_null() {
        w.push("NULL");
    } else {
        w.bind(value);
    }
}

/// Fill an unset timestamp column on `entity` with `now`
fn touch_if_unset<M: Model>(entity: &mut M, column: &Column, now: Value) -> OrmResult<()> {
    if column_value(entity, column).is_zero() {
        entity.set_field(&column.field, now)?;
    }
    Ok(())
}

impl<M: Model> Repository<M> {
    /// Insert when the primary key holds its zero value, update otherwise
    pub async fn save(&self, entity: &mut M) -> OrmResult<()> {
        let metadata = self.metadata()?.clone();
        let (_, pk_value) = primary_key(&metadata, entity)?;
        if pk_value.is_zero() {
            self.insert(entity).await
        } else {
            self.update(entity).await
        }
    }

    /// Insert `entity`, writing a generated key back into it
    pub async fn insert(&self, entity: &mut M) -> OrmResult<()> {
        let metadata = self.metadata()?.clone();
        let kind = self.executor.kind();

        let now = Value::Timestamp(Utc::now());
        for name in [&metadata.created_at_column, &metadata.updated_at_column]
            .into_iter()
            .flatten()
        {
            if let Some(column) = metadata.column(name) {
                touch_if_unset(entity, column, now.clone())?;
            }
        }

        let columns: Vec<&Column> = metadata
            .columns
            .iter()
            .filter(|c| !c.auto_increment)
            .collect();

        let mut w = SqlWriter::new(kind);
        w.push(&format!("INSERT INTO {}", metadata.table_name));
        if columns.is_empty() {
            w.push(match kind {
                DialectKind::MySql => " () VALUES ()",
                DialectKind::Postgres => " DEFAULT VALUES",
            });
        } else {
            let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
            w.push(&format!(" ({}) VALUES (", names.join(", ")));
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                write_value(&mut w, column_value(entity, column));
            }
            w.push(")");
        }

        let auto = metadata.auto_increment_column();
        if let (Some(auto), true) = (auto, kind.supports_returning()) {
            w.push(&format!(" RETURNING {}", auto.name));
        }
        let (sql, args) = w.finish();
        debug!("Inserting into {}: {}", metadata.table_name, sql);

        let context = || format!("failed to insert into {}", metadata.table_name);
        let Some(auto) = auto else {
            self.executor.exec(&sql, &args).await.map_err(|e| e.context(context()))?;
            return Ok(());
        };

        let generated = if kind.supports_returning() {
            let row = self
                .executor
                .query_row(&sql, &args)
                .await
                .map_err(|e| e.context(context()))?;
            row.and_then(|row| row.get_by_index(0).cloned())
        } else {
            let result = self
                .executor
                .exec(&sql, &args)
                .await
                .map_err(|e| e.context(context()))?;
            result.last_insert_id.map(Value::Integer)
        };

        match generated {
            Some(id) => entity.set_field(&auto.field, id),
            None => Err(ModelError::Database(format!(
                "No generated key returned for {}",
                metadata.table_name
            ))
            .context(context())),
        }
    }

    /// Update every present, non-null field except the primary key.
    /// The soft-delete column is written even when NULL.
    pub async fn update(&self, entity: &mut M) -> OrmResult<()> {
        let metadata = self.metadata()?.clone();

        if let Some(column) = metadata
            .updated_at_column
            .as_deref()
            .and_then(|name| metadata.column(name))
        {
            entity.set_field(&column.field, Value::Timestamp(Utc::now()))?;
        }

        let (pk_column, pk_value) = primary_key(&metadata, entity)?;

        let mut w = SqlWriter::new(self.executor.kind());
        w.push(&format!("UPDATE {} SET ", metadata.table_name));
        let mut assigned = 0;
        for column in metadata.columns.iter().filter(|c| !c.primary_key) {
            let value = match entity.get_field(&column.field) {
                Some(value) if !value.is_null() || column.soft_delete => value,
                _ => continue,
            };
            if assigned > 0 {
                w.push(", ");
            }
            w.push(&format!("{} = ", column.name));
            write_value(&mut w, value);
            assigned += 1;
        }

        if assigned == 0 {
            debug!("Nothing to update on {}", metadata.table_name);
            return Ok(());
        }

        w.push(&format!(" WHERE {} = ", pk_column.name));
        w.bind(pk_value);
        let (sql, args) = w.finish();

        self.executor
            .exec(&sql, &args)
            .await
            .map_err(|e| e.context(format!("failed to update {}", metadata.table_name)))?;
        Ok(())
    }

    /// Delete `entity`; soft-deletes when a soft-delete column is configured
    pub async fn delete(&self, entity: &mut M) -> OrmResult<()> {
        let has_soft = self.metadata()?.soft_delete_column.is_some();
        if has_soft {
            self.soft_delete(entity).await
        } else {
            self.force_delete(entity).await
        }
    }

    /// Delete every row matching `criteria`; soft-deletes when configured.
    /// Returns the number of affected rows.
    pub async fn delete_by(&self, criteria: Criteria<'_>) -> OrmResult<u64> {
        let metadata = self.metadata()?.clone();
        if criteria.is_empty() {
            return Err(ModelError::Query(format!(
                "Refusing to delete from {} without criteria",
                metadata.table_name
            )));
        }

        let mut w = SqlWriter::new(self.executor.kind());
        match metadata.soft_delete_column.as_deref() {
            Some(soft) => {
                w.push(&format!("UPDATE {} SET {} = ", metadata.table_name, soft));
                w.bind(Value::Timestamp(Utc::now()));
                w.push(" WHERE ");
                write_criteria(&mut w, criteria);
                w.push(&format!(" AND {} IS NULL", soft));
            }
            None => {
                w.push(&format!("DELETE FROM {} WHERE ", metadata.table_name));
                write_criteria(&mut w, criteria);
            }
        }
        let (sql, args) = w.finish();

        let result = self
            .executor
            .exec(&sql, &args)
            .await
            .map_err(|e| e.context(format!("failed to delete from {}", metadata.table_name)))?;
        Ok(result.rows_affected)
    }

    /// Insert each entity in order, stopping at the first failure
    pub async fn batch_create(&self, entities: &mut [M]) -> OrmResult<()> {
        for entity in entities.iter_mut() {
            self.insert(entity).await?;
        }
        Ok(())
    }

    /// Update each entity in order, stopping at the first failure
    pub async fn batch_update(&self, entities: &mut [M]) -> OrmResult<()> {
        for entity in entities.iter_mut() {
            self.update(entity).await?;
        }
        Ok(())
    }

    /// Delete each entity in order, stopping at the first failure
    pub async fn batch_delete(&self, entities: &mut [M]) -> OrmResult<()> {
        for entity in entities.iter_mut() {
            self.delete(entity).await?;
        }
        Ok(())
    }

    pub(crate) async fn delete_row(&self, metadata: &ModelMetadata, entity: &M) -> OrmResult<ExecResult> {
        let (pk_column, pk_value) = primary_key(metadata, entity)?;
        let mut w = SqlWriter::new(self.executor.kind());
        w.push(&format!(
            "DELETE FROM {} WHERE {} = ",
            metadata.table_name, pk_column.name
        ));
        w.bind(pk_value);
        let (sql, args) = w.finish();

        self.executor
            .exec(&sql, &args)
            .await
            .map_err(|e| e.context(format!("failed to delete from {}", metadata.table_name)))
    }
}
