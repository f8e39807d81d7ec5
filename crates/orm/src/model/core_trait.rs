//! Core Model Trait - Base definition for database entities
//!
//! A model registers itself once through [`Model::describe`], which lists its
//! fields and their annotations. Reading and writing field values goes
//! through [`Model::get_field`] / [`Model::set_field`], keyed by the Rust
//! field name, so rows can be mapped without reflection.

use crate::error::ModelResult;
use crate::model::descriptor::ModelDescriptor;
use crate::value::Value;

/// Core trait for database models
///
/// ```rust,ignore
/// #[derive(Debug, Default)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// impl Model for User {
///     fn describe() -> ModelDescriptor {
///         ModelDescriptor::new("User")
///             .field(FieldDef::of::<i64>("id").tag("pk,auto"))
///             .field(FieldDef::of::<String>("name").tag("column:name"))
///     }
///
///     fn get_field(&self, field: &str) -> Option<Value> {
///         match field {
///             "id" => Some(self.id.into()),
///             "name" => Some(self.name.as_str().into()),
///             _ => None,
///         }
///     }
///
///     fn set_field(&mut self, field: &str, value: Value) -> ModelResult<()> {
///         match field {
///             "id" => self.id = FromValue::from_value(value)?,
///             "name" => self.name = FromValue::from_value(value)?,
///             _ => return Err(unknown_field::<Self>(field)),
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Model: Default + Send + Sync + 'static {
    /// Field layout and annotations for this type
    fn describe() -> ModelDescriptor;

    /// Current value of a field, `None` when the model has no such field
    fn get_field(&self, field: &str) -> Option<Value>;

    /// Assign a decoded column value to a field
    fn set_field(&mut self, field: &str, value: Value) -> ModelResult<()>;
}

/// Error for `set_field` implementations receiving a name they do not know
pub fn unknown_field<M: Model>(field: &str) -> crate::error::ModelError {
    crate::error::ModelError::Schema(format!(
        "{} has no field named '{}'",
        std::any::type_name::<M>(),
        field
    ))
}
