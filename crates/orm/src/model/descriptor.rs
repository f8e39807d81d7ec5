//! Model descriptors
//!
//! The registration table a model hands to the metadata manager: its type
//! name, an optional table override and one [`FieldDef`] per struct field.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Runtime type of a model field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    String,
    Bytes,
    Timestamp,
    /// Another model, used by relation fields
    Model(&'static str),
    /// Anything without a dedicated mapping (stored as TEXT)
    Other(&'static str),
}

/// Types that know their [`FieldKind`]
pub trait HasFieldKind {
    fn field_kind() -> FieldKind;
}

macro_rules! impl_has_field_kind {
    ($($ty:ty => $kind:expr),* $(,)?) => {
        $(
            impl HasFieldKind for $ty {
                fn field_kind() -> FieldKind {
                    $kind
                }
            }
        )*
    };
}

impl_has_field_kind! {
    i8 => FieldKind::I8,
    i16 => FieldKind::I16,
    i32 => FieldKind::I32,
    i64 => FieldKind::I64,
    u8 => FieldKind::U8,
    u16 => FieldKind::U16,
    u32 => FieldKind::U32,
    u64 => FieldKind::U64,
    f32 => FieldKind::F32,
    f64 => FieldKind::F64,
    bool => FieldKind::Bool,
    String => FieldKind::String,
    Vec<u8> => FieldKind::Bytes,
    DateTime<Utc> => FieldKind::Timestamp,
    NaiveDateTime => FieldKind::Timestamp,
    uuid::Uuid => FieldKind::Other("uuid"),
    serde_json::Value => FieldKind::Other("json"),
}

impl<T: HasFieldKind> HasFieldKind for Option<T> {
    fn field_kind() -> FieldKind {
        T::field_kind()
    }
}

/// One struct field and its annotations
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub tag: Option<String>,
    pub legacy: Vec<(String, String)>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            tag: None,
            legacy: Vec::new(),
        }
    }

    /// Field whose kind is inferred from its Rust type
    pub fn of<T: HasFieldKind>(name: impl Into<String>) -> Self {
        Self::new(name, T::field_kind())
    }

    /// Field pointing at another model, for relation annotations
    pub fn relation(name: impl Into<String>, target: &'static str) -> Self {
        Self::new(name, FieldKind::Model(target))
    }

    /// Annotation in the comma-separated `key:value` grammar
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Legacy single-purpose annotation, consulted when no tag is present
    pub fn legacy(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.legacy.push((key.into(), value.into()));
        self
    }
}

/// Registration table for one model type
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    pub type_name: String,
    pub table: Option<String>,
    pub fields: Vec<FieldDef>,
}

impl ModelDescriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            table: None,
            fields: Vec::new(),
        }
    }

    /// Override the table name (defaults to the lowercased type name)
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_kind_inference() {
        assert_eq!(FieldDef::of::<i64>("id").kind, FieldKind::I64);
        assert_eq!(FieldDef::of::<Option<String>>("bio").kind, FieldKind::String);
        assert_eq!(
            FieldDef::of::<Option<DateTime<Utc>>>("deleted_at").kind,
            FieldKind::Timestamp
        );
        assert_eq!(FieldDef::of::<uuid::Uuid>("token").kind, FieldKind::Other("uuid"));
    }

    #[test]
    fn test_descriptor_builder() {
        let descriptor = ModelDescriptor::new("User")
            .table("accounts")
            .field(FieldDef::of::<i64>("id").tag("pk,auto"))
            .field(FieldDef::of::<String>("name").legacy("db", "user_name"));

        assert_eq!(descriptor.table.as_deref(), Some("accounts"));
        assert_eq!(descriptor.fields.len(), 2);
        assert_eq!(descriptor.fields[0].tag.as_deref(), Some("pk,auto"));
        assert_eq!(
            descriptor.fields[1].legacy,
            vec![("db".to_string(), "user_name".to_string())]
        );
    }
}
