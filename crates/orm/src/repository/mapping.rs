//! Row ↔ model mapping

use tracing::debug;

use crate::error::{ModelError, OrmResult};
use crate::metadata::{Column, ModelMetadata};
use crate::model::Model;
use crate::value::{Row, Value};

/// Build an `M` from a result row.
///
/// Each column is routed to a field through the metadata's lookup table;
/// columns no field claims are skipped.
pub fn row_to_model<M: Model>(metadata: &ModelMetadata, row: Row) -> OrmResult<M> {
    let mut model = M::default();
    for (column, value) in row {
        match metadata.find_field_by_column_name(&column) {
            Some(field) => model.set_field(field, value)?,
            None => debug!("Column '{}' has no field on {}", column, metadata.type_name),
        }
    }
    Ok(model)
}

/// Value of the field behind `column`, `NULL` when the model does not expose it
pub(crate) fn column_value<M: Model>(entity: &M, column: &Column) -> Value {
    entity.get_field(&column.field).unwrap_or(Value::Null)
}

/// The primary key column and the entity's current value for it
pub(crate) fn primary_key<'a, M: Model>(
    metadata: &'a ModelMetadata,
    entity: &M,
) -> OrmResult<(&'a Column, Value)> {
    let column = metadata.primary_key_column().ok_or_else(|| {
        ModelError::Schema(format!("{} has no primary key column", metadata.type_name))
    })?;
    let value = entity
        .get_field(&column.field)
        .ok_or_else(|| ModelError::MissingPrimaryKey(column.field.clone()))?;
    Ok((column, value))
}

#[cfg(test)]
mod tests {
    use std::any::TypeId;

    use super::*;
    use crate::metadata::build_metadata;
    use crate::model::{unknown_field, FieldDef, ModelDescriptor};
    use crate::value::FromValue;

    #[derive(Debug, Default)]
    struct Author {
        id: i64,
        pen_name: String,
        bio: Option<String>,
    }

    impl Model for Author {
        fn describe() -> ModelDescriptor {
            ModelDescriptor::new("Author")
                .table("authors")
                .field(FieldDef::of::<i64>("id").tag("pk,auto"))
                .field(FieldDef::of::<String>("pen_name").tag("column:penName"))
                .field(FieldDef::of::<Option<String>>("bio").legacy("db", "biography"))
        }

        fn get_field(&self, field: &str) -> Option<Value> {
            match field {
                "id" => Some(self.id.into()),
                "pen_name" => Some(self.pen_name.as_str().into()),
                "bio" => Some(self.bio.clone().into()),
                _ => None,
            }
        }

        fn set_field(&mut self, field: &str, value: Value) -> OrmResult<()> {
            match field {
                "id" => self.id = FromValue::from_value(value)?,
                "pen_name" => self.pen_name = FromValue::from_value(value)?,
                "bio" => self.bio = FromValue::from_value(value)?,
                _ => return Err(unknown_field::<Self>(field)),
            }
            Ok(())
        }
    }

    fn metadata() -> ModelMetadata {
        build_metadata(&Author::describe(), TypeId::of::<Author>()).unwrap()
    }

    #[test]
    fn test_row_to_model_resolves_names() {
        let row = Row::from_pairs([
            ("ID", Value::Integer(4)),
            ("penName", Value::from("Saki")),
            ("biography", Value::Null),
            ("unrelated", Value::from("ignored")),
        ]);

        let author: Author = row_to_model(&metadata(), row).unwrap();
        assert_eq!(author.id, 4);
        assert_eq!(author.pen_name, "Saki");
        assert!(author.bio.is_none());
    }

    #[test]
    fn test_row_to_model_conversion_error() {
        let row = Row::from_pairs([("id", Value::from("four"))]);
        let result: OrmResult<Author> = row_to_model(&metadata(), row);
        assert!(matches!(result, Err(ModelError::Conversion(_))));
    }

    #[test]
    fn test_primary_key_lookup() {
        let metadata = metadata();
        let author = Author { id: 9, ..Default::default() };
        let (column, value) = primary_key(&metadata, &author).unwrap();
        assert_eq!(column.name, "id");
        assert_eq!(value, Value::Integer(9));
    }
}
