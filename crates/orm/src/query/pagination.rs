//! Query Builder pagination operations

use super::builder::QueryBuilder;
use super::types::*;
use crate::value::Value;

impl<M> QueryBuilder<M> {
    /// Add LIMIT clause
    pub fn limit(self, count: u64) -> Self {
        self.update(|b| b.limit_count = Some(count))
    }

    /// Add OFFSET clause
    pub fn offset(self, count: u64) -> Self {
        self.update(|b| b.offset_value = Some(count))
    }

    /// Page-number pagination; pages start at 1 and a page of 0 is treated as 1.
    /// An offset past `u64::MAX` saturates.
    pub fn offset_paginate(self, page: u64, per_page: u64) -> Self {
        let page = page.max(1);
        self.limit(per_page).offset((page - 1).saturating_mul(per_page))
    }

    /// Cursor-based pagination: rows after `cursor` in `direction`, ordered by
    /// the cursor column. No cursor starts from the first row.
    pub fn cursor_paginate<T: Into<Value>>(
        self,
        column: &str,
        cursor: Option<T>,
        per_page: u64,
        direction: OrderDirection,
    ) -> Self {
        let mut builder = self.limit(per_page);

        if let Some(cursor) = cursor {
            builder = match direction {
                OrderDirection::Asc => builder.where_gt(column, cursor),
                OrderDirection::Desc => builder.where_lt(column, cursor),
            };
        }

        builder.update(|b| b.order_by.push((column.to_string(), direction)))
    }
}
