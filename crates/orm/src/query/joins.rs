//! Query Builder JOIN operations

use super::builder::QueryBuilder;
use super::types::*;

impl<M> QueryBuilder<M> {
    /// Add JOIN clause of any type
    pub fn join(self, join_type: JoinType, table: &str, left: &str, operator: &str, right: &str) -> Self {
        self.update(|b| {
            b.joins.push(JoinClause {
                join_type,
                table: table.to_string(),
                left: left.to_string(),
                operator: operator.to_string(),
                right: right.to_string(),
            })
        })
    }

    /// Add INNER JOIN clause
    pub fn inner_join(self, table: &str, left: &str, operator: &str, right: &str) -> Self {
        self.join(JoinType::Inner, table, left, operator, right)
    }

    /// Add LEFT JOIN clause
    pub fn left_join(self, table: &str, left: &str, operator: &str, right: &str) -> Self {
        self.join(JoinType::Left, table, left, operator, right)
    }

    /// Add RIGHT JOIN clause
    pub fn right_join(self, table: &str, left: &str, operator: &str, right: &str) -> Self {
        self.join(JoinType::Right, table, left, operator, right)
    }
}
