//! Query Builder Module - fluent, dialect-aware SELECT builder

pub mod builder;
pub mod execution;
pub mod joins;
pub mod ordering;
pub mod pagination;
pub mod select;
pub mod sql_generation;
pub mod types;
pub mod where_clause;
pub mod with;

pub use builder::QueryBuilder;
pub use types::{
    CachePolicy, ConditionKind, Conjunction, EagerLoad, EagerLoadKind, JoinClause, JoinType,
    LockMode, OrderDirection, QueryOperator, RawQuery, UnionClause, WhereCondition,
};
