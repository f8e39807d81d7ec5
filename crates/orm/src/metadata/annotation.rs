//! Field annotation parsing
//!
//! Two formats are understood. The tag grammar is a comma-separated token
//! list: bare flags (`pk`, `auto`, `unique`, `index`, `nullable`, `soft`,
//! `lazy`) and `key:value` pairs (`column:name`, `fk:users.id`,
//! `length:64`, `default:0`, `relation:has_many`, ...). The legacy format
//! carries one concern per key (`db`, `primary_key`, `size`, ...) and is only
//! consulted when a field has no tag.

use tracing::debug;

use crate::metadata::{ForeignKey, ReferentialAction};

/// Everything a field annotation can say about a column or relation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldAnnotation {
    pub column: Option<String>,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub index: bool,
    pub nullable: bool,
    pub soft_delete: bool,
    pub lazy: bool,
    pub length: Option<u32>,
    pub default: Option<String>,
    pub foreign_key: Option<ForeignKey>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
    pub sql_type: Option<String>,
    /// Raw relation kind, validated when metadata is built
    pub relation: Option<String>,
    pub target: Option<String>,
    pub relation_foreign_key: Option<String>,
    pub references: Option<String>,
    pub join_table: Option<String>,
    /// Legacy `db:"-"` marker
    pub skip: bool,
}

impl FieldAnnotation {
    /// Foreign key with any `on_delete` / `on_update` actions applied
    pub fn resolved_foreign_key(&self) -> Option<ForeignKey> {
        self.foreign_key.clone().map(|mut fk| {
            if let Some(action) = self.on_delete {
                fk.on_delete = action;
            }
            if let Some(action) = self.on_update {
                fk.on_update = action;
            }
            fk
        })
    }
}

/// Parse a tag in the comma-separated grammar
pub fn parse_tag(tag: &str) -> FieldAnnotation {
    let mut annotation = FieldAnnotation::default();

    for token in tag.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.split_once(':') {
            None => match token {
                "pk" => annotation.primary_key = true,
                "auto" => annotation.auto_increment = true,
                "unique" => annotation.unique = true,
                "index" => annotation.index = true,
                "nullable" => annotation.nullable = true,
                "soft" => annotation.soft_delete = true,
                "lazy" => annotation.lazy = true,
                other => debug!("Ignoring unknown annotation flag '{}'", other),
            },
            Some((key, value)) => {
                let value = value.trim();
                match key.trim() {
                    "column" => annotation.column = Some(value.to_string()),
                    "fk" => annotation.foreign_key = ForeignKey::parse(value),
                    "length" => match value.parse::<u32>() {
                        Ok(length) => annotation.length = Some(length),
                        Err(_) => debug!("Ignoring non-numeric length '{}'", value),
                    },
                    "default" => annotation.default = Some(value.to_string()),
                    "relation" => annotation.relation = Some(value.to_string()),
                    "on_delete" => annotation.on_delete = parse_action(value),
                    "on_update" => annotation.on_update = parse_action(value),
                    "type" => annotation.sql_type = Some(value.to_uppercase()),
                    "target" => annotation.target = Some(value.to_string()),
                    "foreign_key" => annotation.relation_foreign_key = Some(value.to_string()),
                    "references" => annotation.references = Some(value.to_string()),
                    "join_table" => annotation.join_table = Some(value.to_string()),
                    other => debug!("Ignoring unknown annotation key '{}'", other),
                }
            }
        }
    }

    annotation
}

/// Parse legacy per-concern annotations. `None` when no recognised key is present.
pub fn parse_legacy(entries: &[(String, String)]) -> Option<FieldAnnotation> {
    let mut annotation = FieldAnnotation::default();
    let mut recognised = false;

    for (key, value) in entries {
        if apply_legacy(&mut annotation, key, value.trim()) {
            recognised = true;
        } else {
            debug!("Ignoring unknown legacy annotation '{}'", key);
        }
    }

    recognised.then_some(annotation)
}

fn apply_legacy(annotation: &mut FieldAnnotation, key: &str, value: &str) -> bool {
    match key {
        "db" | "column" => {
            if value == "-" {
                annotation.skip = true;
            } else if !value.is_empty() {
                annotation.column = Some(value.to_string());
            }
        }
        "primary_key" | "pk" => annotation.primary_key = truthy(value),
        "auto_increment" => annotation.auto_increment = truthy(value),
        "unique" => annotation.unique = truthy(value),
        "index" => annotation.index = truthy(value),
        "nullable" => annotation.nullable = truthy(value),
        "soft_delete" => annotation.soft_delete = truthy(value),
        "default" => annotation.default = Some(value.to_string()),
        "size" | "length" => annotation.length = value.parse().ok(),
        "foreign_key" => annotation.foreign_key = ForeignKey::parse(value),
        _ => return false,
    }
    true
}

fn truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "" | "true" | "1" | "yes")
}

fn parse_action(value: &str) -> Option<ReferentialAction> {
    match value.parse() {
        Ok(action) => Some(action),
        Err(e) => {
            debug!("{}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags_and_pairs() {
        let annotation = parse_tag("pk, auto, column:user_id, length:64, default:0");

        assert!(annotation.primary_key);
        assert!(annotation.auto_increment);
        assert_eq!(annotation.column.as_deref(), Some("user_id"));
        assert_eq!(annotation.length, Some(64));
        assert_eq!(annotation.default.as_deref(), Some("0"));
    }

    #[test]
    fn test_parse_foreign_key_with_actions() {
        let annotation = parse_tag("fk:users.id,on_delete:cascade,on_update:set_null");
        let fk = annotation.resolved_foreign_key().unwrap();

        assert_eq!(fk.table, "users");
        assert_eq!(fk.column, "id");
        assert_eq!(fk.on_delete, ReferentialAction::Cascade);
        assert_eq!(fk.on_update, ReferentialAction::SetNull);
    }

    #[test]
    fn test_malformed_foreign_key_is_dropped() {
        let annotation = parse_tag("fk:users");
        assert!(annotation.foreign_key.is_none());
        assert!(annotation.resolved_foreign_key().is_none());
    }

    #[test]
    fn test_unknown_tokens_are_ignored() {
        let annotation = parse_tag("pk,sparkly,colour:blue");
        assert!(annotation.primary_key);
        assert_eq!(annotation, FieldAnnotation { primary_key: true, ..Default::default() });
    }

    #[test]
    fn test_relation_tokens() {
        let annotation =
            parse_tag("relation:many_to_many,target:Role,join_table:user_roles,lazy");
        assert_eq!(annotation.relation.as_deref(), Some("many_to_many"));
        assert_eq!(annotation.target.as_deref(), Some("Role"));
        assert_eq!(annotation.join_table.as_deref(), Some("user_roles"));
        assert!(annotation.lazy);
    }

    #[test]
    fn test_legacy_annotations() {
        let entries = vec![
            ("db".to_string(), "user_name".to_string()),
            ("size".to_string(), "80".to_string()),
            ("unique".to_string(), "true".to_string()),
        ];
        let annotation = parse_legacy(&entries).unwrap();

        assert_eq!(annotation.column.as_deref(), Some("user_name"));
        assert_eq!(annotation.length, Some(80));
        assert!(annotation.unique);
    }

    #[test]
    fn test_legacy_skip_and_absent() {
        let skip = parse_legacy(&[("db".to_string(), "-".to_string())]).unwrap();
        assert!(skip.skip);

        assert!(parse_legacy(&[]).is_none());
        assert!(parse_legacy(&[("json".to_string(), "name".to_string())]).is_none());
    }
}
