//! Query Builder SQL generation
//!
//! Compilation is a single pass over the builder: every bound value is
//! pushed onto the argument list at the moment its placeholder is written,
//! so placeholders and arguments cannot drift apart.

use super::builder::QueryBuilder;
use super::types::*;
use crate::backends::DialectKind;
use crate::error::{ModelError, OrmResult};
use crate::value::Value;

/// SQL text and arguments under construction
pub(crate) struct SqlWriter {
    kind: DialectKind,
    sql: String,
    args: Vec<Value>,
}

impl SqlWriter {
    pub(crate) fn new(kind: DialectKind) -> Self {
        Self {
            kind,
            sql: String::new(),
            args: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    /// Write the next placeholder and bind `value` to it
    pub(crate) fn bind(&mut self, value: Value) {
        self.args.push(value);
        let placeholder = self.kind.placeholder(self.args.len());
        self.sql.push_str(&placeholder);
    }

    /// Write `fragment`, turning each `?` into the next placeholder
    fn push_marked(&mut self, fragment: &str, args: &[Value]) {
        let mut args = args.iter();
        for (i, part) in fragment.split('?').enumerate() {
            if i > 0 {
                match args.next() {
                    Some(value) => self.bind(value.clone()),
                    None => self.sql.push('?'),
                }
            }
            self.sql.push_str(part);
        }
    }

    pub(crate) fn finish(self) -> (String, Vec<Value>) {
        (self.sql, self.args)
    }
}

impl<M> QueryBuilder<M> {
    /// Compile to SQL text and its ordered arguments
    pub fn to_sql(&self) -> OrmResult<(String, Vec<Value>)> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if let Some(raw) = &self.raw {
            return Ok((raw.sql.clone(), raw.args.clone()));
        }

        let mut writer = SqlWriter::new(self.kind);
        self.write_select(&mut writer)?;
        Ok(writer.finish())
    }

    /// Compiled SQL text
    pub fn get_sql(&self) -> OrmResult<String> {
        self.to_sql().map(|(sql, _)| sql)
    }

    /// Compiled arguments, in placeholder order
    pub fn get_args(&self) -> OrmResult<Vec<Value>> {
        self.to_sql().map(|(_, args)| args)
    }

    /// Write this query into `w`, numbering placeholders after those
    /// already written
    pub(crate) fn write_select(&self, w: &mut SqlWriter) -> OrmResult<()> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if let Some(raw) = &self.raw {
            w.push_marked(&raw.sql, &raw.args);
            return Ok(());
        }

        let table = self
            .from_table
            .as_deref()
            .ok_or_else(|| ModelError::Query("No table specified for query".to_string()))?;

        // SELECT clause
        w.push(if self.distinct { "SELECT DISTINCT " } else { "SELECT " });
        if self.select_fields.is_empty() {
            w.push("*");
        } else {
            w.push(&self.select_fields.join(", "));
        }

        // FROM clause
        w.push(" FROM ");
        w.push(table);

        for join in &self.joins {
            w.push(&format!(
                " {} {} ON {} {} {}",
                join.join_type, join.table, join.left, join.operator, join.right
            ));
        }

        if !self.scope_conditions.is_empty() || !self.where_conditions.is_empty() {
            w.push(" WHERE ");
        }
        for (i, kind) in self.scope_conditions.iter().enumerate() {
            if i > 0 {
                w.push(" AND ");
            }
            write_condition(w, kind)?;
        }
        if !self.where_conditions.is_empty() {
            let grouped = !self.scope_conditions.is_empty()
                && self
                    .where_conditions
                    .iter()
                    .skip(1)
                    .any(|c| c.conjunction == Conjunction::Or);
            if !self.scope_conditions.is_empty() {
                w.push(" AND ");
            }
            if grouped {
                w.push("(");
            }
            write_conditions(w, &self.where_conditions)?;
            if grouped {
                w.push(")");
            }
        }

        if !self.group_by.is_empty() {
            w.push(" GROUP BY ");
            w.push(&self.group_by.join(", "));
        }

        if !self.having_conditions.is_empty() {
            w.push(" HAVING ");
            write_conditions(w, &self.having_conditions)?;
        }

        for union in &self.unions {
            w.push(if union.all { " UNION ALL " } else { " UNION " });
            union.query.write_select(w)?;
        }

        if !self.order_by.is_empty() {
            let order: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{} {}", column, direction))
                .collect();
            w.push(" ORDER BY ");
            w.push(&order.join(", "));
        }

        if let Some(limit) = self.limit_count {
            w.push(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset_value {
            w.push(&format!(" OFFSET {}", offset));
        }

        if let Some(lock) = self.lock {
            w.push(" ");
            w.push(lock.as_sql(self.kind));
        }

        Ok(())
    }
}

fn write_conditions(w: &mut SqlWriter, conditions: &[WhereCondition]) -> OrmResult<()> {
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            w.push(&format!(" {} ", condition.conjunction));
        }
        write_condition(w, &condition.kind)?;
    }
    Ok(())
}

fn write_condition(w: &mut SqlWriter, kind: &ConditionKind) -> OrmResult<()> {
    match kind {
        ConditionKind::Compare { column, operator, value } => {
            w.push(&format!("{} {} ", column, operator));
            w.bind(value.clone());
        }
        ConditionKind::In { values, negated, .. } if values.is_empty() => {
            // IN () is not valid SQL
            w.push(if *negated { "1 = 1" } else { "1 = 0" });
        }
        ConditionKind::In { column, values, negated } => {
            w.push(column);
            w.push(if *negated { " NOT IN (" } else { " IN (" });
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                w.bind(value.clone());
            }
            w.push(")");
        }
        ConditionKind::Between { column, low, high, negated } => {
            w.push(column);
            w.push(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
            w.bind(low.clone());
            w.push(" AND ");
            w.bind(high.clone());
        }
        ConditionKind::Null { column, negated } => {
            w.push(column);
            w.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
        }
        ConditionKind::Regexp { column, pattern, negated } => {
            let operator = w.kind.regexp_operator(*negated);
            w.push(&format!("{} {} ", column, operator));
            w.bind(pattern.clone());
        }
        ConditionKind::FullText { columns, query } => {
            w.args.push(query.clone());
            let placeholder = w.kind.placeholder(w.args.len());
            let predicate = w.kind.full_text_predicate(columns, &placeholder);
            w.push(&predicate);
        }
        ConditionKind::Raw { sql, args } => {
            w.push("(");
            w.push_marked(sql, args);
            w.push(")");
        }
        ConditionKind::SubQuery { column, operator, query } => {
            w.push(&format!("{} {} (", column, operator));
            query.write_select(w)?;
            w.push(")");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users(kind: DialectKind) -> QueryBuilder {
        QueryBuilder::new(kind).from("users")
    }

    #[test]
    fn test_select_all() {
        let (sql, args) = users(DialectKind::MySql).to_sql().unwrap();
        assert_eq!(sql, "SELECT * FROM users");
        assert!(args.is_empty());
    }

    #[test]
    fn test_placeholders_per_dialect() {
        let build = |kind| {
            users(kind)
                .where_eq("status", "active")
                .where_gt("age", 18)
                .get_sql()
                .unwrap()
        };

        assert_eq!(
            build(DialectKind::MySql),
            "SELECT * FROM users WHERE status = ? AND age > ?"
        );
        assert_eq!(
            build(DialectKind::Postgres),
            "SELECT * FROM users WHERE status = $1 AND age > $2"
        );
    }

    #[test]
    fn test_clause_order_is_fixed() {
        let (sql, args) = users(DialectKind::Postgres)
            .lock_for_update()
            .offset(20)
            .limit(10)
            .order_by_desc("created_at")
            .having("COUNT(*)", ">", 1)
            .group_by("users.id")
            .where_eq("users.active", true)
            .left_join("posts", "posts.user_id", "=", "users.id")
            .select(&["users.id", "COUNT(*) AS posts"])
            .distinct()
            .to_sql()
            .unwrap();

        assert_eq!(
            sql,
            "SELECT DISTINCT users.id, COUNT(*) AS posts FROM users \
             LEFT JOIN posts ON posts.user_id = users.id \
             WHERE users.active = $1 GROUP BY users.id HAVING COUNT(*) > $2 \
             ORDER BY created_at DESC LIMIT 10 OFFSET 20 FOR UPDATE"
        );
        assert_eq!(args, vec![Value::Boolean(true), Value::Integer(1)]);
    }

    #[test]
    fn test_having_args_follow_where_args() {
        let args = users(DialectKind::MySql)
            .group_by("role")
            .having("COUNT(*)", ">=", 5)
            .where_in("role", ["admin", "staff"])
            .get_args()
            .unwrap();

        assert_eq!(
            args,
            vec![Value::from("admin"), Value::from("staff"), Value::Integer(5)]
        );
    }

    #[test]
    fn test_empty_in_lists() {
        let empty: Vec<i64> = Vec::new();
        let sql = users(DialectKind::MySql)
            .where_in("id", empty.clone())
            .where_not_in("id", empty)
            .get_sql()
            .unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE 1 = 0 AND 1 = 1");
    }

    #[test]
    fn test_null_comparisons() {
        let (sql, args) = users(DialectKind::Postgres)
            .where_condition("deleted_at", "=", Value::Null)
            .where_condition("email", "<>", Value::Null)
            .where_not_null("name")
            .to_sql()
            .unwrap();

        assert_eq!(
            sql,
            "SELECT * FROM users WHERE deleted_at IS NULL AND email IS NOT NULL AND name IS NOT NULL"
        );
        assert!(args.is_empty());
    }

    #[test]
    fn test_or_between_and_like() {
        let (sql, args) = users(DialectKind::MySql)
            .where_between("age", 18, 30)
            .or_where("role", "=", "admin")
            .where_not_like("email", "%@spam.test")
            .to_sql()
            .unwrap();

        assert_eq!(
            sql,
            "SELECT * FROM users WHERE age BETWEEN ? AND ? OR role = ? AND email NOT LIKE ?"
        );
        assert_eq!(args.len(), 4);
    }

    #[test]
    fn test_raw_condition_renumbers_for_postgres() {
        let (sql, args) = users(DialectKind::Postgres)
            .where_eq("active", true)
            .where_raw("age > ? OR score < ?", vec![21.into(), 3.into()])
            .to_sql()
            .unwrap();

        assert_eq!(
            sql,
            "SELECT * FROM users WHERE active = $1 AND (age > $2 OR score < $3)"
        );
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_regexp_and_full_text() {
        let mysql = users(DialectKind::MySql)
            .where_regexp("name", "^a")
            .full_text_search(&["title", "body"], "rust orm")
            .get_sql()
            .unwrap();
        assert_eq!(
            mysql,
            "SELECT * FROM users WHERE name REGEXP ? AND \
             MATCH(title, body) AGAINST(? IN NATURAL LANGUAGE MODE)"
        );

        let postgres = users(DialectKind::Postgres)
            .where_not_regexp("name", "^a")
            .full_text_search(&["title"], "rust")
            .get_sql()
            .unwrap();
        assert_eq!(
            postgres,
            "SELECT * FROM users WHERE name !~ $1 AND to_tsvector(title) @@ plainto_tsquery($2)"
        );
    }

    #[test]
    fn test_sub_query_and_union_share_numbering() {
        let banned = QueryBuilder::<()>::new(DialectKind::Postgres)
            .from("bans")
            .select(&["user_id"])
            .where_eq("reason", "spam");
        let archived = QueryBuilder::<()>::new(DialectKind::Postgres)
            .from("archived_users")
            .where_eq("year", 2020);

        let (sql, args) = users(DialectKind::Postgres)
            .where_eq("active", true)
            .where_sub_query("id", "not in", banned)
            .union_all(archived)
            .to_sql()
            .unwrap();

        assert_eq!(
            sql,
            "SELECT * FROM users WHERE active = $1 AND id NOT IN \
             (SELECT user_id FROM bans WHERE reason = $2) \
             UNION ALL SELECT * FROM archived_users WHERE year = $3"
        );
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_shared_lock_per_dialect() {
        assert!(users(DialectKind::MySql)
            .shared_lock()
            .get_sql()
            .unwrap()
            .ends_with("LOCK IN SHARE MODE"));
        assert!(users(DialectKind::Postgres)
            .shared_lock()
            .get_sql()
            .unwrap()
            .ends_with("FOR SHARE"));
    }

    #[test]
    fn test_raw_mode_is_verbatim() {
        let (sql, args) = users(DialectKind::Postgres)
            .where_eq("ignored", 1)
            .raw("SELECT name FROM users WHERE id = $1", vec![7.into()])
            .to_sql()
            .unwrap();

        assert_eq!(sql, "SELECT name FROM users WHERE id = $1");
        assert_eq!(args, vec![Value::Integer(7)]);
    }

    #[test]
    fn test_pagination() {
        let sql = users(DialectKind::MySql)
            .offset_paginate(3, 25)
            .get_sql()
            .unwrap();
        assert_eq!(sql, "SELECT * FROM users LIMIT 25 OFFSET 50");

        let sql = users(DialectKind::MySql)
            .offset_paginate(0, 25)
            .get_sql()
            .unwrap();
        assert_eq!(sql, "SELECT * FROM users LIMIT 25 OFFSET 0");

        let sql = users(DialectKind::MySql)
            .offset_paginate(u64::MAX, 1000)
            .get_sql()
            .unwrap();
        assert_eq!(sql, format!("SELECT * FROM users LIMIT 1000 OFFSET {}", u64::MAX));

        let (sql, args) = users(DialectKind::Postgres)
            .cursor_paginate("id", Some(40), 10, OrderDirection::Desc)
            .to_sql()
            .unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE id < $1 ORDER BY id DESC LIMIT 10");
        assert_eq!(args, vec![Value::Integer(40)]);

        let sql = users(DialectKind::Postgres)
            .cursor_paginate::<i64>("id", None, 10, OrderDirection::Asc)
            .get_sql()
            .unwrap();
        assert_eq!(sql, "SELECT * FROM users ORDER BY id ASC LIMIT 10");
    }

    #[test]
    fn test_first_error_is_kept() {
        let builder = users(DialectKind::MySql)
            .where_condition("age", "=>", 3)
            .order_by("name", "sideways")
            .where_raw("a = ?", vec![]);

        match builder.to_sql() {
            Err(ModelError::Query(msg)) => assert!(msg.contains("=>")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_raw_condition_count_mismatch() {
        let result = users(DialectKind::MySql)
            .where_raw("a = ? AND b = ?", vec![1.into()])
            .to_sql();
        assert!(matches!(result, Err(ModelError::Query(_))));
    }

    #[test]
    fn test_missing_table() {
        let result = QueryBuilder::<()>::new(DialectKind::MySql).to_sql();
        assert!(matches!(result, Err(ModelError::Query(_))));
    }

    #[test]
    fn test_eager_load_without_model_is_error() {
        let result = users(DialectKind::MySql).with("posts").to_sql();
        assert!(matches!(result, Err(ModelError::Query(_))));

        let builder = users(DialectKind::MySql).cache(std::time::Duration::from_secs(60));
        assert!(matches!(builder.cache_policy(), CachePolicy::Enabled(_)));
        assert_eq!(builder.without_cache().cache_policy(), CachePolicy::Disabled);
    }
}
