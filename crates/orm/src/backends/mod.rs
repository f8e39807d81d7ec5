//! Database Backend Abstractions
//!
//! The [`Dialect`] trait is implemented once per vendor (MySQL and
//! PostgreSQL over sqlx, plus an in-memory [`MockDialect`]). Everything that
//! is pure SQL syntax lives on [`DialectKind`] so it can be exercised without
//! a server.

pub mod core;
pub mod mock;
pub mod mysql;
pub mod postgres;

pub use self::core::{Dialect, ExecResult, Transaction};
pub use mock::{MockDialect, RecordedStatement};
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;

use crate::metadata::{Column, ForeignKey, Index};

/// SQL flavour a dialect speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectKind {
    MySql,
    Postgres,
}

impl DialectKind {
    /// Placeholder for the `index`-th bound argument (1-based)
    pub fn placeholder(self, index: usize) -> String {
        match self {
            DialectKind::MySql => "?".to_string(),
            DialectKind::Postgres => format!("${}", index),
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            DialectKind::MySql => 3306,
            DialectKind::Postgres => 5432,
        }
    }

    /// Inserts report generated keys through `RETURNING` rather than
    /// a last-insert-id
    pub fn supports_returning(self) -> bool {
        matches!(self, DialectKind::Postgres)
    }

    /// Vendor type for a column, including the length for `VARCHAR`
    pub fn sql_type(self, column: &Column) -> String {
        let generic = column.sql_type.trim().to_uppercase();

        let refined = match self {
            DialectKind::MySql => generic,
            DialectKind::Postgres if column.auto_increment => match generic.as_str() {
                "BIGINT" | "BIGINT UNSIGNED" => "BIGSERIAL".to_string(),
                _ => "SERIAL".to_string(),
            },
            DialectKind::Postgres => match generic.as_str() {
                "INT" => "INTEGER".to_string(),
                "INT UNSIGNED" => "BIGINT".to_string(),
                "BIGINT UNSIGNED" => "NUMERIC(20)".to_string(),
                "DOUBLE" => "DOUBLE PRECISION".to_string(),
                "FLOAT" => "REAL".to_string(),
                "BLOB" => "BYTEA".to_string(),
                _ => generic,
            },
        };

        if refined == "VARCHAR" {
            format!("VARCHAR({})", column.length.unwrap_or(255))
        } else {
            refined
        }
    }

    /// One column fragment of a `CREATE TABLE` statement
    pub fn column_definition(self, column: &Column) -> String {
        let mut parts = vec![column.name.clone(), self.sql_type(column)];

        parts.push(if column.nullable { "NULL" } else { "NOT NULL" }.to_string());

        if column.auto_increment && self == DialectKind::MySql {
            parts.push("AUTO_INCREMENT".to_string());
        }
        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", default));
        }
        if column.primary_key {
            parts.push("PRIMARY KEY".to_string());
        }
        if column.unique && !column.primary_key {
            parts.push("UNIQUE".to_string());
        }
        if let (DialectKind::Postgres, Some(fk)) = (self, &column.foreign_key) {
            parts.push(format!("REFERENCES {}", references_clause(fk)));
        }

        parts.join(" ")
    }

    pub fn create_table_sql(self, table: &str, columns: &[Column]) -> String {
        let mut definitions: Vec<String> =
            columns.iter().map(|c| self.column_definition(c)).collect();

        if self == DialectKind::MySql {
            definitions.extend(columns.iter().filter_map(|c| {
                c.foreign_key.as_ref().map(|fk| {
                    format!("FOREIGN KEY ({}) REFERENCES {}", c.name, references_clause(fk))
                })
            }));
        }

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            table,
            definitions.join(", ")
        );
        match self {
            DialectKind::MySql => format!("{} ENGINE=InnoDB DEFAULT CHARSET=utf8mb4", sql),
            DialectKind::Postgres => sql,
        }
    }

    pub fn drop_table_sql(self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", table)
    }

    /// Existence check binding the table name as its only argument
    pub fn table_exists_sql(self) -> String {
        match self {
            DialectKind::MySql => "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?"
                .to_string(),
            DialectKind::Postgres => "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1"
                .to_string(),
        }
    }

    pub fn create_index_sql(self, table: &str, index: &Index) -> String {
        let unique = if index.unique { "UNIQUE " } else { "" };
        // MySQL has no IF NOT EXISTS for indexes
        let guard = match self {
            DialectKind::MySql => "",
            DialectKind::Postgres => "IF NOT EXISTS ",
        };
        format!(
            "CREATE {}INDEX {}{} ON {} ({})",
            unique,
            guard,
            index.name,
            table,
            index.columns.join(", ")
        )
    }

    pub fn regexp_operator(self, negated: bool) -> &'static str {
        match (self, negated) {
            (DialectKind::MySql, false) => "REGEXP",
            (DialectKind::MySql, true) => "NOT REGEXP",
            (DialectKind::Postgres, false) => "~",
            (DialectKind::Postgres, true) => "!~",
        }
    }

    /// Natural-language full-text predicate over `columns`
    pub fn full_text_predicate(self, columns: &[String], placeholder: &str) -> String {
        match self {
            DialectKind::MySql => format!(
                "MATCH({}) AGAINST({} IN NATURAL LANGUAGE MODE)",
                columns.join(", "),
                placeholder
            ),
            DialectKind::Postgres => format!(
                "to_tsvector({}) @@ plainto_tsquery({})",
                columns.join(" || ' ' || "),
                placeholder
            ),
        }
    }
}

impl std::fmt::Display for DialectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DialectKind::MySql => write!(f, "mysql"),
            DialectKind::Postgres => write!(f, "postgres"),
        }
    }
}

impl std::str::FromStr for DialectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(DialectKind::Postgres),
            "mysql" => Ok(DialectKind::MySql),
            _ => Err(format!("Unsupported database dialect: {}", s)),
        }
    }
}

fn references_clause(fk: &ForeignKey) -> String {
    format!(
        "{}({}) ON DELETE {} ON UPDATE {}",
        fk.table,
        fk.column,
        fk.on_delete.as_sql(),
        fk.on_update.as_sql()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ReferentialAction;

    fn users_columns() -> Vec<Column> {
        vec![
            Column::new("id", "BIGINT").as_primary_key().as_auto_increment(),
            Column::new("email", "VARCHAR").with_length(120).as_unique(),
            Column::new("score", "DOUBLE").as_nullable().with_default("0"),
        ]
    }

    #[test]
    fn test_placeholders() {
        for i in 1..5 {
            assert_eq!(DialectKind::MySql.placeholder(i), "?");
        }
        assert_eq!(DialectKind::Postgres.placeholder(1), "$1");
        assert_eq!(DialectKind::Postgres.placeholder(12), "$12");
    }

    #[test]
    fn test_mysql_create_table() {
        let sql = DialectKind::MySql.create_table_sql("users", &users_columns());
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS users (\
             id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY, \
             email VARCHAR(120) NOT NULL UNIQUE, \
             score DOUBLE NULL DEFAULT 0) \
             ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
        );
    }

    #[test]
    fn test_postgres_create_table() {
        let sql = DialectKind::Postgres.create_table_sql("users", &users_columns());
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS users (\
             id BIGSERIAL NOT NULL PRIMARY KEY, \
             email VARCHAR(120) NOT NULL UNIQUE, \
             score DOUBLE PRECISION NULL DEFAULT 0)"
        );
    }

    #[test]
    fn test_postgres_type_refinement() {
        let kind = DialectKind::Postgres;
        assert_eq!(kind.sql_type(&Column::new("a", "INT")), "INTEGER");
        assert_eq!(kind.sql_type(&Column::new("a", "INT").as_auto_increment()), "SERIAL");
        assert_eq!(kind.sql_type(&Column::new("a", "INT UNSIGNED")), "BIGINT");
        assert_eq!(kind.sql_type(&Column::new("a", "BIGINT UNSIGNED")), "NUMERIC(20)");
        assert_eq!(kind.sql_type(&Column::new("a", "FLOAT")), "REAL");
        assert_eq!(kind.sql_type(&Column::new("a", "BLOB")), "BYTEA");
        assert_eq!(kind.sql_type(&Column::new("a", "VARCHAR")), "VARCHAR(255)");

        assert_eq!(DialectKind::MySql.sql_type(&Column::new("a", "INT")), "INT");
    }

    #[test]
    fn test_foreign_key_placement() {
        let mut fk = ForeignKey::new("users", "id");
        fk.on_delete = ReferentialAction::Cascade;
        let columns = vec![
            Column::new("id", "INT").as_primary_key(),
            Column::new("user_id", "INT").with_foreign_key(fk),
        ];

        let mysql = DialectKind::MySql.create_table_sql("posts", &columns);
        assert!(mysql.contains(
            "FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE ON UPDATE NO ACTION"
        ));

        let postgres = DialectKind::Postgres.create_table_sql("posts", &columns);
        assert!(postgres.contains(
            "user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE ON UPDATE NO ACTION"
        ));
    }

    #[test]
    fn test_index_and_drop_sql() {
        let index = Index {
            name: "idx_users_email".to_string(),
            columns: vec!["email".to_string()],
            unique: false,
        };
        assert_eq!(
            DialectKind::MySql.create_index_sql("users", &index),
            "CREATE INDEX idx_users_email ON users (email)"
        );
        assert_eq!(
            DialectKind::Postgres.create_index_sql("users", &index),
            "CREATE INDEX IF NOT EXISTS idx_users_email ON users (email)"
        );
        assert_eq!(DialectKind::MySql.drop_table_sql("users"), "DROP TABLE IF EXISTS users");
    }

    #[test]
    fn test_search_operators() {
        assert_eq!(DialectKind::Postgres.regexp_operator(true), "!~");
        assert_eq!(
            DialectKind::MySql.full_text_predicate(&["title".to_string(), "body".to_string()], "?"),
            "MATCH(title, body) AGAINST(? IN NATURAL LANGUAGE MODE)"
        );
        assert_eq!(
            DialectKind::Postgres.full_text_predicate(&["title".to_string()], "$1"),
            "to_tsvector(title) @@ plainto_tsquery($1)"
        );
    }
}
