//! Query Builder WHERE clause operations

use super::builder::QueryBuilder;
use super::types::*;
use crate::error::ModelError;
use crate::value::Value;

impl<M> QueryBuilder<M> {
    /// Add a WHERE condition with an operator given as text (`=`, `!=`, `<>`,
    /// `>`, `>=`, `<`, `<=`, `LIKE`, `NOT LIKE`).
    ///
    /// An unknown operator is recorded as the builder's error. Comparing with
    /// a null value under `=` or `!=` becomes `IS NULL` / `IS NOT NULL`.
    pub fn where_condition<T: Into<Value>>(self, column: &str, operator: &str, value: T) -> Self {
        self.add_compare(Conjunction::And, column, operator, value.into())
    }

    /// Add an OR-joined WHERE condition
    pub fn or_where<T: Into<Value>>(self, column: &str, operator: &str, value: T) -> Self {
        self.add_compare(Conjunction::Or, column, operator, value.into())
    }

    fn add_compare(self, conjunction: Conjunction, column: &str, operator: &str, value: Value) -> Self {
        match operator.parse::<QueryOperator>() {
            Ok(operator) => self.push_compare(conjunction, column, operator, value),
            Err(msg) => self.fail(ModelError::Query(msg)),
        }
    }

    fn push_compare(self, conjunction: Conjunction, column: &str, operator: QueryOperator, value: Value) -> Self {
        let column = column.to_string();
        let kind = match (operator, value.is_null()) {
            (QueryOperator::Equal, true) => ConditionKind::Null { column, negated: false },
            (QueryOperator::NotEqual, true) => ConditionKind::Null { column, negated: true },
            _ => ConditionKind::Compare { column, operator, value },
        };
        self.push_condition(conjunction, kind)
    }

    /// Add WHERE condition with equality
    pub fn where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_compare(Conjunction::And, column, QueryOperator::Equal, value.into())
    }

    /// Add WHERE condition with not equal
    pub fn where_ne<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_compare(Conjunction::And, column, QueryOperator::NotEqual, value.into())
    }

    /// Add WHERE condition with greater than
    pub fn where_gt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_compare(Conjunction::And, column, QueryOperator::GreaterThan, value.into())
    }

    /// Add WHERE condition with greater than or equal
    pub fn where_gte<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_compare(Conjunction::And, column, QueryOperator::GreaterThanOrEqual, value.into())
    }

    /// Add WHERE condition with less than
    pub fn where_lt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_compare(Conjunction::And, column, QueryOperator::LessThan, value.into())
    }

    /// Add WHERE condition with less than or equal
    pub fn where_lte<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_compare(Conjunction::And, column, QueryOperator::LessThanOrEqual, value.into())
    }

    /// Add WHERE condition with LIKE
    pub fn where_like(self, column: &str, pattern: &str) -> Self {
        self.push_compare(Conjunction::And, column, QueryOperator::Like, pattern.into())
    }

    /// Add WHERE condition with NOT LIKE
    pub fn where_not_like(self, column: &str, pattern: &str) -> Self {
        self.push_compare(Conjunction::And, column, QueryOperator::NotLike, pattern.into())
    }

    /// Add WHERE condition with IN
    pub fn where_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push_condition(
            Conjunction::And,
            ConditionKind::In { column: column.to_string(), values, negated: false },
        )
    }

    /// Add WHERE condition with NOT IN
    pub fn where_not_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push_condition(
            Conjunction::And,
            ConditionKind::In { column: column.to_string(), values, negated: true },
        )
    }

    /// Add WHERE condition with BETWEEN
    pub fn where_between<T: Into<Value>>(self, column: &str, low: T, high: T) -> Self {
        self.push_condition(
            Conjunction::And,
            ConditionKind::Between {
                column: column.to_string(),
                low: low.into(),
                high: high.into(),
                negated: false,
            },
        )
    }

    /// Add WHERE condition with NOT BETWEEN
    pub fn where_not_between<T: Into<Value>>(self, column: &str, low: T, high: T) -> Self {
        self.push_condition(
            Conjunction::And,
            ConditionKind::Between {
                column: column.to_string(),
                low: low.into(),
                high: high.into(),
                negated: true,
            },
        )
    }

    /// Add WHERE condition with IS NULL
    pub fn where_null(self, column: &str) -> Self {
        self.push_condition(
            Conjunction::And,
            ConditionKind::Null { column: column.to_string(), negated: false },
        )
    }

    /// Add WHERE condition with IS NOT NULL
    pub fn where_not_null(self, column: &str) -> Self {
        self.push_condition(
            Conjunction::And,
            ConditionKind::Null { column: column.to_string(), negated: true },
        )
    }

    /// Regular expression match (`REGEXP` on MySQL, `~` on PostgreSQL)
    pub fn where_regexp(self, column: &str, pattern: &str) -> Self {
        self.push_condition(
            Conjunction::And,
            ConditionKind::Regexp { column: column.to_string(), pattern: pattern.into(), negated: false },
        )
    }

    pub fn where_not_regexp(self, column: &str, pattern: &str) -> Self {
        self.push_condition(
            Conjunction::And,
            ConditionKind::Regexp { column: column.to_string(), pattern: pattern.into(), negated: true },
        )
    }

    /// Full-text match of `query` against `columns`
    pub fn full_text_search(self, columns: &[&str], query: &str) -> Self {
        if columns.is_empty() {
            return self.fail(ModelError::Query(
                "Full-text search needs at least one column".to_string(),
            ));
        }
        self.push_condition(
            Conjunction::And,
            ConditionKind::FullText {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                query: query.into(),
            },
        )
    }

    /// Add a raw WHERE fragment. Each `?` in `sql` binds one of `args`, in order,
    /// and is rewritten to the dialect's placeholder.
    pub fn where_raw(self, sql: &str, args: Vec<Value>) -> Self {
        let markers = sql.matches('?').count();
        if markers != args.len() {
            return self.fail(ModelError::Query(format!(
                "Raw condition has {} placeholders but {} arguments",
                markers,
                args.len()
            )));
        }
        self.push_condition(
            Conjunction::And,
            ConditionKind::Raw { sql: sql.to_string(), args },
        )
    }

    /// Compare `column` against a nested SELECT, e.g. `IN` or `>=`.
    /// An error already recorded on `query` is taken over by this builder.
    pub fn where_sub_query<N>(self, column: &str, operator: &str, query: QueryBuilder<N>) -> Self {
        let operator = operator.trim().to_uppercase();
        let known = matches!(
            operator.as_str(),
            "IN" | "NOT IN" | "=" | "!=" | "<>" | ">" | ">=" | "<" | "<="
        );
        if !known {
            return self.fail(ModelError::Query(format!(
                "Unknown sub-query operator '{}'",
                operator
            )));
        }
        if let Some(err) = query.error.clone() {
            return self.fail(err);
        }
        self.push_condition(
            Conjunction::And,
            ConditionKind::SubQuery {
                column: column.to_string(),
                operator,
                query: Box::new(query.into_untyped()),
            },
        )
    }
}
