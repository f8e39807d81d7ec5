//! Metadata extraction and caching
//!
//! [`MetadataManager`] turns a model's [`ModelDescriptor`] into a
//! [`ModelMetadata`] the first time the type is seen and hands out the same
//! `Arc` afterwards. The cache belongs to whoever owns the manager (normally
//! the `Orm`) and can be cleared explicitly.

use std::any::TypeId;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::error::{ModelError, OrmResult};
use crate::metadata::annotation::{parse_legacy, parse_tag, FieldAnnotation};
use crate::metadata::{Column, Index, ModelMetadata, Relation, RelationKind};
use crate::model::{FieldDef, FieldKind, Model, ModelDescriptor};

/// Per-type metadata cache keyed by `TypeId`
#[derive(Debug, Default)]
pub struct MetadataManager {
    cache: RwLock<HashMap<TypeId, Arc<ModelMetadata>>>,
}

impl MetadataManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata for `M`, built on first use and cached afterwards
    pub fn extract_metadata<M: Model>(&self) -> OrmResult<Arc<ModelMetadata>> {
        if let Some(metadata) = self.cached::<M>() {
            return Ok(metadata);
        }

        let metadata = build_metadata(&M::describe(), TypeId::of::<M>())?;
        debug!(
            "Extracted metadata for {} (table '{}', {} columns)",
            metadata.type_name,
            metadata.table_name,
            metadata.columns.len()
        );

        // A concurrent extraction may have won the race; keep the first entry.
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let entry = cache
            .entry(TypeId::of::<M>())
            .or_insert_with(|| Arc::new(metadata));
        Ok(Arc::clone(entry))
    }

    pub fn get_metadata<M: Model>(&self) -> OrmResult<Arc<ModelMetadata>> {
        self.extract_metadata::<M>()
    }

    /// Cached metadata without triggering extraction
    pub fn cached<M: Model>(&self) -> Option<Arc<ModelMetadata>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<M>())
            .cloned()
    }

    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build metadata from a descriptor without touching any cache
pub fn build_metadata(descriptor: &ModelDescriptor, type_id: TypeId) -> OrmResult<ModelMetadata> {
    let type_name = descriptor.type_name.trim();
    if type_name.is_empty() {
        return Err(ModelError::Schema(
            "model descriptor has an empty type name".to_string(),
        ));
    }

    let table_name = descriptor
        .table
        .clone()
        .unwrap_or_else(|| type_name.to_lowercase());

    let mut columns: Vec<Column> = Vec::new();
    let mut relations = HashMap::new();

    for field in &descriptor.fields {
        let (annotation, from_tag) = match &field.tag {
            Some(tag) => (parse_tag(tag), true),
            None => match parse_legacy(&field.legacy) {
                Some(annotation) => (annotation, false),
                None => {
                    debug!("Skipping unannotated field {}.{}", type_name, field.name);
                    continue;
                }
            },
        };

        if annotation.skip {
            continue;
        }

        if let Some(kind) = annotation.relation.as_deref() {
            let relation = build_relation(type_name, field, kind, &annotation)?;
            relations.insert(relation.name.clone(), relation);
            continue;
        }

        columns.push(build_column(field, &annotation, from_tag));
    }

    if columns.is_empty() {
        return Err(ModelError::Schema(format!(
            "model {} has no mapped columns",
            type_name
        )));
    }

    let mut seen = HashSet::new();
    for column in &columns {
        if !seen.insert(column.name.as_str()) {
            return Err(ModelError::Schema(format!(
                "model {} maps column '{}' more than once",
                type_name, column.name
            )));
        }
    }

    let primary_keys: Vec<&Column> = columns.iter().filter(|c| c.primary_key).collect();
    if primary_keys.len() > 1 {
        return Err(ModelError::Schema(format!(
            "model {} declares {} primary keys; composite keys are not supported",
            type_name,
            primary_keys.len()
        )));
    }
    let primary_key = primary_keys.first().map(|c| c.name.clone());

    let auto_increment = first_column(&columns, |c| c.auto_increment);
    let soft_delete_column = first_column(&columns, |c| c.soft_delete);
    let created_at_column = first_column(&columns, |c| c.name == "created_at");
    let updated_at_column = first_column(&columns, |c| c.name == "updated_at");

    let indexes = columns
        .iter()
        .filter(|c| c.indexed)
        .map(|c| Index {
            name: format!("idx_{}_{}", table_name, c.name),
            columns: vec![c.name.clone()],
            unique: false,
        })
        .collect();

    let mut name_lookup = HashMap::new();
    for (i, column) in columns.iter().enumerate() {
        if let Some(name) = &column.explicit_name {
            name_lookup.entry(name.clone()).or_insert(i);
        }
    }
    for (i, column) in columns.iter().enumerate() {
        if let Some(name) = &column.legacy_name {
            name_lookup.entry(name.clone()).or_insert(i);
        }
    }
    let mut field_lookup = HashMap::new();
    for (i, column) in columns.iter().enumerate() {
        field_lookup.entry(column.field.to_lowercase()).or_insert(i);
    }

    Ok(ModelMetadata {
        type_id,
        type_name: type_name.to_string(),
        table_name,
        columns,
        primary_key,
        auto_increment,
        relations,
        indexes,
        soft_delete_column,
        created_at_column,
        updated_at_column,
        name_lookup,
        field_lookup,
    })
}

fn first_column(columns: &[Column], pred: impl Fn(&Column) -> bool) -> Option<String> {
    columns.iter().find(|c| pred(c)).map(|c| c.name.clone())
}

fn build_column(field: &FieldDef, annotation: &FieldAnnotation, from_tag: bool) -> Column {
    let name = annotation.column.clone().unwrap_or_else(|| field.name.clone());
    let sql_type = annotation
        .sql_type
        .clone()
        .unwrap_or_else(|| generic_sql_type(&field.kind).to_string());
    let length = annotation
        .length
        .or_else(|| (sql_type == "VARCHAR").then_some(255));

    let mut column = Column::new(name, sql_type);
    column.field = field.name.clone();
    column.kind = field.kind.clone();
    column.length = length;
    column.auto_increment = annotation.auto_increment;
    column.unique = annotation.unique;
    column.indexed = annotation.index;
    column.default = annotation.default.clone();
    column.foreign_key = annotation.resolved_foreign_key();
    column.soft_delete = annotation.soft_delete;
    column.nullable = annotation.nullable || annotation.soft_delete;
    if from_tag {
        column.explicit_name = annotation.column.clone();
    } else {
        column.legacy_name = annotation.column.clone();
    }

    if annotation.primary_key {
        column = column.as_primary_key();
    }
    column
}

fn build_relation(
    owner: &str,
    field: &FieldDef,
    kind: &str,
    annotation: &FieldAnnotation,
) -> OrmResult<Relation> {
    let kind: RelationKind = kind
        .parse()
        .map_err(|e| ModelError::Schema(format!("{}.{}: {}", owner, field.name, e)))?;

    let target = match (&annotation.target, &field.kind) {
        (Some(target), _) => target.clone(),
        (None, FieldKind::Model(target)) => target.to_string(),
        (None, _) if kind == RelationKind::MorphTo => String::new(),
        (None, _) => {
            return Err(ModelError::Schema(format!(
                "relation {}.{} does not name its target model",
                owner, field.name
            )))
        }
    };

    let foreign_key = annotation.relation_foreign_key.clone().unwrap_or_else(|| {
        match kind {
            RelationKind::BelongsTo | RelationKind::MorphTo => format!("{}_id", field.name),
            _ => format!("{}_id", owner.to_lowercase()),
        }
    });

    Ok(Relation {
        name: field.name.clone(),
        kind,
        target,
        foreign_key,
        references: annotation
            .references
            .clone()
            .unwrap_or_else(|| "id".to_string()),
        join_table: annotation.join_table.clone(),
        lazy: annotation.lazy,
    })
}

/// Vendor-neutral SQL type for a field kind
pub fn generic_sql_type(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::I8 | FieldKind::I16 | FieldKind::I32 => "INT",
        FieldKind::I64 => "BIGINT",
        FieldKind::U8 | FieldKind::U16 | FieldKind::U32 => "INT UNSIGNED",
        FieldKind::U64 => "BIGINT UNSIGNED",
        FieldKind::F32 => "FLOAT",
        FieldKind::F64 => "DOUBLE",
        FieldKind::Bool => "BOOLEAN",
        FieldKind::String => "VARCHAR",
        FieldKind::Bytes => "BLOB",
        FieldKind::Timestamp => "TIMESTAMP",
        FieldKind::Model(_) | FieldKind::Other(_) => "TEXT",
    }
}
