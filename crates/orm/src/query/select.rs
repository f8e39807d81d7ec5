//! Query Builder SELECT operations

use super::builder::QueryBuilder;
use super::types::*;
use crate::value::Value;

impl<M> QueryBuilder<M> {
    /// Add SELECT fields. No call selects `*`.
    pub fn select(self, fields: &[&str]) -> Self {
        self.update(|b| b.select_fields.extend(fields.iter().map(|f| f.to_string())))
    }

    /// Set FROM table
    pub fn from(self, table: &str) -> Self {
        self.update(|b| b.from_table = Some(table.to_string()))
    }

    /// Set DISTINCT
    pub fn distinct(self) -> Self {
        self.update(|b| b.distinct = true)
    }

    /// Use `sql` and `args` verbatim instead of the compiled clauses
    pub fn raw(self, sql: &str, args: Vec<Value>) -> Self {
        self.update(|b| {
            b.raw = Some(RawQuery {
                sql: sql.to_string(),
                args,
            })
        })
    }

    /// Append `UNION` with another query
    pub fn union<N>(self, query: QueryBuilder<N>) -> Self {
        self.add_union(false, query)
    }

    /// Append `UNION ALL` with another query
    pub fn union_all<N>(self, query: QueryBuilder<N>) -> Self {
        self.add_union(true, query)
    }

    fn add_union<N>(self, all: bool, query: QueryBuilder<N>) -> Self {
        if let Some(err) = query.error.clone() {
            return self.fail(err);
        }
        self.update(|b| {
            b.unions.push(UnionClause {
                all,
                query: Box::new(query.into_untyped()),
            })
        })
    }

    /// Append a row lock clause
    pub fn lock(self, mode: LockMode) -> Self {
        self.update(|b| b.lock = Some(mode))
    }

    /// `FOR UPDATE`
    pub fn lock_for_update(self) -> Self {
        self.lock(LockMode::ForUpdate)
    }

    /// `FOR SHARE` on PostgreSQL, `LOCK IN SHARE MODE` on MySQL
    pub fn shared_lock(self) -> Self {
        self.lock(LockMode::Shared)
    }
}
