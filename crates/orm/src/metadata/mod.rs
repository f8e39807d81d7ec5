//! Model metadata
//!
//! [`ModelMetadata`] is the cached schema description of one model type:
//! table name, ordered columns, key columns, relations and indexes. It is
//! built once by the [`MetadataManager`] and shared behind an `Arc`.

pub mod annotation;
pub mod manager;

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::FieldKind;

pub use annotation::{parse_legacy, parse_tag, FieldAnnotation};
pub use manager::{build_metadata, MetadataManager};

/// Action taken on the referencing row when the referenced row changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    pub fn as_sql(self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }
}

impl FromStr for ReferentialAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "no_action" | "noaction" => Ok(ReferentialAction::NoAction),
            "restrict" => Ok(ReferentialAction::Restrict),
            "cascade" => Ok(ReferentialAction::Cascade),
            "set_null" | "setnull" => Ok(ReferentialAction::SetNull),
            "set_default" | "setdefault" => Ok(ReferentialAction::SetDefault),
            _ => Err(format!("Unknown referential action: {}", s)),
        }
    }
}

/// Foreign key constraint on a column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

impl ForeignKey {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
        }
    }

    /// Parse `table.column`; anything else yields `None`
    pub fn parse(reference: &str) -> Option<Self> {
        let mut parts = reference.trim().split('.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(table), Some(column), None) if !table.is_empty() && !column.is_empty() => {
                Some(Self::new(table, column))
            }
            _ => None,
        }
    }
}

/// A mapped table column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Rust field backing this column
    pub field: String,
    pub name: String,
    /// Generic SQL type, refined per dialect
    pub sql_type: String,
    pub length: Option<u32>,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub indexed: bool,
    pub default: Option<String>,
    pub foreign_key: Option<ForeignKey>,
    pub soft_delete: bool,
    pub kind: FieldKind,
    /// Name given by a `column:` annotation
    pub explicit_name: Option<String>,
    /// Name given by the legacy `db` annotation
    pub legacy_name: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            field: name.clone(),
            name,
            sql_type: sql_type.into(),
            length: None,
            nullable: false,
            primary_key: false,
            auto_increment: false,
            unique: false,
            indexed: false,
            default: None,
            foreign_key: None,
            soft_delete: false,
            kind: FieldKind::Other("unknown"),
            explicit_name: None,
            legacy_name: None,
        }
    }

    pub fn as_primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn as_auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn as_nullable(mut self) -> Self {
        if !self.primary_key {
            self.nullable = true;
        }
        self
    }

    pub fn as_unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }
}

/// Defines the type of relationship between models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// One-to-one relationship (hasOne)
    HasOne,
    /// One-to-many relationship (hasMany)
    HasMany,
    /// Many-to-one relationship (belongsTo)
    BelongsTo,
    /// Many-to-many relationship through a join table
    ManyToMany,
    /// Polymorphic one-to-one relationship
    MorphOne,
    /// Polymorphic one-to-many relationship
    MorphMany,
    /// Inverse polymorphic relationship
    MorphTo,
}

impl RelationKind {
    /// Returns true if this relationship type is polymorphic
    pub fn is_polymorphic(self) -> bool {
        matches!(self, Self::MorphOne | Self::MorphMany | Self::MorphTo)
    }

    /// Returns true if this relationship returns a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany | Self::ManyToMany | Self::MorphMany)
    }
}

impl FromStr for RelationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "has_one" | "one_to_one" => Ok(RelationKind::HasOne),
            "has_many" | "one_to_many" => Ok(RelationKind::HasMany),
            "belongs_to" | "many_to_one" => Ok(RelationKind::BelongsTo),
            "many_to_many" | "belongs_to_many" => Ok(RelationKind::ManyToMany),
            "morph_one" => Ok(RelationKind::MorphOne),
            "morph_many" => Ok(RelationKind::MorphMany),
            "morph_to" => Ok(RelationKind::MorphTo),
            _ => Err(format!("Unknown relation kind: {}", s)),
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelationKind::HasOne => "has_one",
            RelationKind::HasMany => "has_many",
            RelationKind::BelongsTo => "belongs_to",
            RelationKind::ManyToMany => "many_to_many",
            RelationKind::MorphOne => "morph_one",
            RelationKind::MorphMany => "morph_many",
            RelationKind::MorphTo => "morph_to",
        };
        write!(f, "{}", name)
    }
}

/// Relation declared by a model field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Field name in the model
    pub name: String,
    pub kind: RelationKind,
    /// Related model's type name
    pub target: String,
    pub foreign_key: String,
    pub references: String,
    /// Join table for many-to-many relations
    pub join_table: Option<String>,
    pub lazy: bool,
}

/// Secondary index on one or more columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Cached schema description of one model type
#[derive(Debug)]
pub struct ModelMetadata {
    pub type_id: TypeId,
    pub type_name: String,
    pub table_name: String,
    pub columns: Vec<Column>,
    pub primary_key: Option<String>,
    pub auto_increment: Option<String>,
    pub relations: HashMap<String, Relation>,
    pub indexes: Vec<Index>,
    pub soft_delete_column: Option<String>,
    pub created_at_column: Option<String>,
    pub updated_at_column: Option<String>,
    /// Explicit and legacy column names → column position
    pub(crate) name_lookup: HashMap<String, usize>,
    /// Lowercased field names → column position
    pub(crate) field_lookup: HashMap<String, usize>,
}

impl ModelMetadata {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key_column(&self) -> Option<&Column> {
        self.primary_key.as_deref().and_then(|pk| self.column(pk))
    }

    pub fn auto_increment_column(&self) -> Option<&Column> {
        self.auto_increment.as_deref().and_then(|c| self.column(c))
    }

    pub fn soft_delete(&self) -> Option<&Column> {
        self.soft_delete_column.as_deref().and_then(|c| self.column(c))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    /// Resolve a result column to the model field it populates.
    ///
    /// Precedence: explicit `column:` name, then legacy `db` name, then a
    /// case-insensitive match on the field name. First match wins.
    pub fn find_field_by_column_name(&self, column: &str) -> Option<&str> {
        self.name_lookup
            .get(column)
            .or_else(|| self.field_lookup.get(&column.to_lowercase()))
            .map(|&i| self.columns[i].field.as_str())
    }
}
