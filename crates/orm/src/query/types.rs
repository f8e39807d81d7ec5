//! Query Builder Types - Core types and enums for query building

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::backends::DialectKind;
use crate::value::Value;

use super::builder::QueryBuilder;

/// Comparison operators accepted by `where_condition`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
    NotLike,
}

impl FromStr for QueryOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "=" => Ok(QueryOperator::Equal),
            "!=" | "<>" => Ok(QueryOperator::NotEqual),
            ">" => Ok(QueryOperator::GreaterThan),
            ">=" => Ok(QueryOperator::GreaterThanOrEqual),
            "<" => Ok(QueryOperator::LessThan),
            "<=" => Ok(QueryOperator::LessThanOrEqual),
            "LIKE" => Ok(QueryOperator::Like),
            "NOT LIKE" => Ok(QueryOperator::NotLike),
            other => Err(format!("Unknown comparison operator '{}'", other)),
        }
    }
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOperator::Equal => write!(f, "="),
            QueryOperator::NotEqual => write!(f, "!="),
            QueryOperator::GreaterThan => write!(f, ">"),
            QueryOperator::GreaterThanOrEqual => write!(f, ">="),
            QueryOperator::LessThan => write!(f, "<"),
            QueryOperator::LessThanOrEqual => write!(f, "<="),
            QueryOperator::Like => write!(f, "LIKE"),
            QueryOperator::NotLike => write!(f, "NOT LIKE"),
        }
    }
}

/// How a condition attaches to the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

impl fmt::Display for Conjunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conjunction::And => write!(f, "AND"),
            Conjunction::Or => write!(f, "OR"),
        }
    }
}

/// The predicate of one WHERE / HAVING condition
#[derive(Debug, Clone)]
pub enum ConditionKind {
    Compare {
        column: String,
        operator: QueryOperator,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
        negated: bool,
    },
    Null {
        column: String,
        negated: bool,
    },
    Regexp {
        column: String,
        pattern: Value,
        negated: bool,
    },
    FullText {
        columns: Vec<String>,
        query: Value,
    },
    /// SQL fragment with `?` markers, one per argument
    Raw {
        sql: String,
        args: Vec<Value>,
    },
    SubQuery {
        column: String,
        operator: String,
        query: Box<QueryBuilder<()>>,
    },
}

/// Where clause condition
#[derive(Debug, Clone)]
pub struct WhereCondition {
    pub conjunction: Conjunction,
    pub kind: ConditionKind,
}

/// Join types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Left => write!(f, "LEFT JOIN"),
            JoinType::Right => write!(f, "RIGHT JOIN"),
        }
    }
}

/// Join clause
#[derive(Debug, Clone)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    pub left: String,
    pub operator: String,
    pub right: String,
}

/// Order by direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl FromStr for OrderDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ASC" => Ok(OrderDirection::Asc),
            "DESC" => Ok(OrderDirection::Desc),
            other => Err(format!("Unknown sort direction '{}'", other)),
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Row lock requested with the SELECT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    ForUpdate,
    Shared,
}

impl LockMode {
    pub fn as_sql(self, kind: DialectKind) -> &'static str {
        match (self, kind) {
            (LockMode::ForUpdate, _) => "FOR UPDATE",
            (LockMode::Shared, DialectKind::MySql) => "LOCK IN SHARE MODE",
            (LockMode::Shared, DialectKind::Postgres) => "FOR SHARE",
        }
    }
}

impl FromStr for LockMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', " ").as_str() {
            "for update" | "update" | "exclusive" => Ok(LockMode::ForUpdate),
            "for share" | "share" | "shared" | "lock in share mode" => Ok(LockMode::Shared),
            other => Err(format!("Unknown lock mode '{}'", other)),
        }
    }
}

/// A query combined with UNION
#[derive(Debug, Clone)]
pub struct UnionClause {
    pub all: bool,
    pub query: Box<QueryBuilder<()>>,
}

/// What an eager-load declaration asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EagerLoadKind {
    Load,
    Count,
    Exists,
}

/// Declared eager load of a relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EagerLoad {
    pub relation: String,
    pub kind: EagerLoadKind,
}

/// Result caching preference of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    #[default]
    Default,
    Enabled(Duration),
    Disabled,
}

/// SQL and arguments supplied verbatim
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuery {
    pub sql: String,
    pub args: Vec<Value>,
}
