//! Query Builder WITH Methods - eager-load declarations and cache hints
//!
//! Declarations are validated against the model's relations and kept on the
//! builder. They do not change the compiled SQL and nothing is loaded.

use std::time::Duration;

use tracing::debug;

use super::builder::QueryBuilder;
use super::types::*;
use crate::error::ModelError;

impl<M> QueryBuilder<M> {
    /// Declare an eager load of `relation`
    pub fn with(self, relation: &str) -> Self {
        self.declare(relation, EagerLoadKind::Load)
    }

    /// Declare a relation count alongside the rows
    pub fn with_count(self, relation: &str) -> Self {
        self.declare(relation, EagerLoadKind::Count)
    }

    /// Declare a relation existence flag alongside the rows
    pub fn with_exists(self, relation: &str) -> Self {
        self.declare(relation, EagerLoadKind::Exists)
    }

    fn declare(self, relation: &str, kind: EagerLoadKind) -> Self {
        if self.error.is_some() {
            return self;
        }

        let known = match &self.metadata {
            Some(metadata) => metadata.relation(relation).is_some(),
            None => {
                return self.fail(ModelError::Query(format!(
                    "Cannot eager load '{}' without a model",
                    relation
                )))
            }
        };
        if !known {
            let model = self
                .metadata
                .as_ref()
                .map(|m| m.type_name.clone())
                .unwrap_or_default();
            return self.fail(ModelError::Query(format!(
                "Unknown relation '{}' on {}",
                relation, model
            )));
        }

        debug!("Recorded {:?} of relation '{}'", kind, relation);
        self.update(|b| {
            b.eager_loads.push(EagerLoad {
                relation: relation.to_string(),
                kind,
            })
        })
    }

    /// Ask for results to be cached for `ttl`
    pub fn cache(self, ttl: Duration) -> Self {
        self.update(|b| b.cache = CachePolicy::Enabled(ttl))
    }

    /// Ask for results not to be cached
    pub fn without_cache(self) -> Self {
        self.update(|b| b.cache = CachePolicy::Disabled)
    }
}
