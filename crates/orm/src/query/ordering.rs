//! Query Builder ordering and grouping operations

use super::builder::QueryBuilder;
use super::types::*;
use crate::error::ModelError;
use crate::value::Value;

impl<M> QueryBuilder<M> {
    /// Add ORDER BY clause; `direction` is `ASC` or `DESC`
    pub fn order_by(self, column: &str, direction: &str) -> Self {
        match direction.parse::<OrderDirection>() {
            Ok(direction) => self.update(|b| b.order_by.push((column.to_string(), direction))),
            Err(msg) => self.fail(ModelError::Query(msg)),
        }
    }

    /// Add ORDER BY ASC
    pub fn order_by_asc(self, column: &str) -> Self {
        self.update(|b| b.order_by.push((column.to_string(), OrderDirection::Asc)))
    }

    /// Add ORDER BY DESC
    pub fn order_by_desc(self, column: &str) -> Self {
        self.update(|b| b.order_by.push((column.to_string(), OrderDirection::Desc)))
    }

    /// Add GROUP BY clause
    pub fn group_by(self, column: &str) -> Self {
        self.update(|b| b.group_by.push(column.to_string()))
    }

    /// Add HAVING clause. Its argument is bound after every WHERE argument.
    pub fn having<T: Into<Value>>(self, column: &str, operator: &str, value: T) -> Self {
        match operator.parse::<QueryOperator>() {
            Ok(operator) => {
                let value = value.into();
                self.update(|b| {
                    b.having_conditions.push(WhereCondition {
                        conjunction: Conjunction::And,
                        kind: ConditionKind::Compare {
                            column: column.to_string(),
                            operator,
                            value,
                        },
                    })
                })
            }
            Err(msg) => self.fail(ModelError::Query(msg)),
        }
    }
}
