//! End-to-end scenarios through the public API, run against the mock dialect

use chrono::{TimeZone, Utc};
use tagorm::{
    unknown_field, ConnectionConfig, Dialect, DialectKind, FieldDef, FromValue, MockDialect,
    Model, ModelDescriptor, ModelError, ModelResult, MySqlDialect, Orm, PostgresDialect,
    QueryBuilder, Row, Value,
};

#[derive(Debug, Clone, Default, PartialEq)]
struct Account {
    id: i64,
    name: String,
}

impl Model for Account {
    fn describe() -> ModelDescriptor {
        ModelDescriptor::new("Account")
            .field(FieldDef::of::<i64>("id").tag("pk,auto"))
            .field(FieldDef::of::<String>("name").tag("column:name"))
    }

    fn get_field(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.as_str().into()),
            _ => None,
        }
    }

    fn set_field(&mut self, field: &str, value: Value) -> ModelResult<()> {
        match field {
            "id" => self.id = FromValue::from_value(value)?,
            "name" => self.name = FromValue::from_value(value)?,
            _ => return Err(unknown_field::<Self>(field)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Member {
    id: i64,
    name: String,
    level: u16,
    score: f64,
    active: bool,
    avatar: Vec<u8>,
    joined_at: chrono::DateTime<Utc>,
}

impl Model for Member {
    fn describe() -> ModelDescriptor {
        ModelDescriptor::new("Member")
            .table("members")
            .field(FieldDef::of::<i64>("id").tag("pk,auto"))
            .field(FieldDef::of::<String>("name").tag("column:display_name"))
            .field(FieldDef::of::<u16>("level").legacy("db", "lvl"))
            .field(FieldDef::of::<f64>("score").tag(""))
            .field(FieldDef::of::<bool>("active").tag("default:true"))
            .field(FieldDef::of::<Vec<u8>>("avatar").tag(""))
            .field(FieldDef::of::<chrono::DateTime<Utc>>("joined_at").tag(""))
    }

    fn get_field(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.as_str().into()),
            "level" => Some(self.level.into()),
            "score" => Some(self.score.into()),
            "active" => Some(self.active.into()),
            "avatar" => Some(self.avatar.clone().into()),
            "joined_at" => Some(self.joined_at.into()),
            _ => None,
        }
    }

    fn set_field(&mut self, field: &str, value: Value) -> ModelResult<()> {
        match field {
            "id" => self.id = FromValue::from_value(value)?,
            "name" => self.name = FromValue::from_value(value)?,
            "level" => self.level = FromValue::from_value(value)?,
            "score" => self.score = FromValue::from_value(value)?,
            "active" => self.active = FromValue::from_value(value)?,
            "avatar" => self.avatar = FromValue::from_value(value)?,
            "joined_at" => self.joined_at = FromValue::from_value(value)?,
            _ => return Err(unknown_field::<Self>(field)),
        }
        Ok(())
    }
}

async fn connected(kind: DialectKind) -> (Orm, MockDialect) {
    let mock = MockDialect::new(kind);
    let orm = Orm::new(mock.clone());
    orm.connect(&ConnectionConfig::new("localhost", kind.default_port(), "app", "shop"))
        .await
        .unwrap();
    orm.register_model::<Account>().unwrap();
    orm.register_model::<Member>().unwrap();
    (orm, mock)
}

fn placeholder_count(sql: &str, kind: DialectKind) -> usize {
    match kind {
        DialectKind::MySql => sql.matches('?').count(),
        DialectKind::Postgres => sql.matches('$').count(),
    }
}

#[tokio::test]
async fn scenario_metadata_for_two_column_model() {
    let (orm, _mock) = connected(DialectKind::MySql).await;

    let metadata = orm.register_model::<Account>().unwrap();
    assert!(std::sync::Arc::ptr_eq(&metadata, &orm.register_model::<Account>().unwrap()));
    assert_eq!(metadata.table_name, "account");
    assert_eq!(metadata.columns.len(), 2);
    assert_eq!(metadata.primary_key.as_deref(), Some("id"));
    assert_eq!(metadata.auto_increment.as_deref(), Some("id"));
}

#[test]
fn placeholders_per_dialect() {
    let mysql = MySqlDialect::new();
    let postgres = PostgresDialect::new();

    for i in 1..=5 {
        assert_eq!(mysql.placeholder(i), "?");
        assert_eq!(postgres.placeholder(i), format!("${}", i));
    }
}

#[tokio::test]
async fn scenario_where_order_limit() {
    let (orm, _mock) = connected(DialectKind::MySql).await;

    let (sql, args) = orm
        .query::<Account>()
        .where_condition("age", ">", 30)
        .order_by("name", "ASC")
        .limit(10)
        .to_sql()
        .unwrap();

    assert_eq!(sql, "SELECT * FROM account WHERE age > ? ORDER BY name ASC LIMIT 10");
    assert_eq!(args, vec![Value::Integer(30)]);
}

#[test]
fn placeholders_align_with_args() {
    for kind in [DialectKind::MySql, DialectKind::Postgres] {
        let builder = QueryBuilder::<()>::new(kind)
            .from("events")
            .where_eq("kind", "login")
            .where_in("user_id", [4, 8, 15])
            .or_where("attempts", ">=", 3)
            .where_between("at", 100, 200)
            .where_raw("payload LIKE ?", vec!["%x%".into()])
            .group_by("user_id")
            .having("COUNT(*)", ">", 2);

        let (sql, args) = builder.to_sql().unwrap();
        assert_eq!(placeholder_count(&sql, kind), args.len());
        assert_eq!(
            args,
            vec![
                Value::from("login"),
                Value::Integer(4),
                Value::Integer(8),
                Value::Integer(15),
                Value::Integer(3),
                Value::Integer(100),
                Value::Integer(200),
                Value::from("%x%"),
                Value::Integer(2),
            ]
        );
    }
}

#[tokio::test]
async fn scenario_postgres_insert_returns_key() {
    let (orm, mock) = connected(DialectKind::Postgres).await;
    mock.set_next_insert_id(101);

    let mut account = Account { id: 0, name: "ops".to_string() };
    orm.repository::<Account>().save(&mut account).await.unwrap();

    assert_eq!(account.id, 101);
    let statement = mock.last_statement().unwrap();
    assert_eq!(statement.sql, "INSERT INTO account (name) VALUES ($1) RETURNING id");
    assert_eq!(statement.args, vec![Value::from("ops")]);

    account.name = "ops-team".to_string();
    orm.repository::<Account>().save(&mut account).await.unwrap();
    assert_eq!(
        mock.last_statement().unwrap().sql,
        "UPDATE account SET name = $1 WHERE id = $2"
    );
}

#[tokio::test]
async fn scenario_transaction_error_rolls_back() {
    let (orm, mock) = connected(DialectKind::MySql).await;

    let result: Result<(), ModelError> = orm
        .transaction(|scope| async move {
            let mut account = Account { id: 0, name: "temp".to_string() };
            scope.repository::<Account>().save(&mut account).await?;
            Err(ModelError::Conversion("bad input".to_string()))
        })
        .await;

    match result {
        Err(ModelError::Conversion(msg)) => assert_eq!(msg, "bad input"),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(mock.rollback_count(), 1);
    assert_eq!(mock.commit_count(), 0);
}

#[tokio::test]
async fn scenario_increment_has_no_row_filter() {
    let (orm, mock) = connected(DialectKind::MySql).await;
    mock.push_exec_result(tagorm::ExecResult { rows_affected: 12, last_insert_id: None });

    let affected = orm.repository::<Member>().increment("score", 5).await.unwrap();

    assert_eq!(affected, 12);
    let statement = mock.last_statement().unwrap();
    assert_eq!(statement.sql, "UPDATE members SET score = score + ?");
    assert!(!statement.sql.contains("WHERE"));
    assert_eq!(statement.args, vec![Value::Integer(5)]);
}

#[tokio::test]
async fn insert_then_find_round_trip() {
    for kind in [DialectKind::MySql, DialectKind::Postgres] {
        let (orm, mock) = connected(kind).await;
        mock.set_next_insert_id(9);

        let original = Member {
            id: 0,
            name: "Lin".to_string(),
            level: 7,
            score: 12.5,
            active: true,
            avatar: vec![0xde, 0xad],
            joined_at: Utc.with_ymd_and_hms(2023, 5, 6, 7, 8, 9).unwrap(),
        };
        let mut saved = original.clone();
        let repo = orm.repository::<Member>();
        repo.save(&mut saved).await.unwrap();
        assert_eq!(saved.id, 9);

        // Serve the stored row back exactly as it was written.
        let insert = mock.last_statement().unwrap();
        let metadata = orm.metadata::<Member>().unwrap();
        let mut row = Row::new();
        row.push("id", saved.id);
        for (column, value) in metadata
            .columns
            .iter()
            .filter(|c| !c.auto_increment)
            .zip(insert.args)
        {
            row.push(column.name.clone(), value);
        }
        assert_eq!(row.len(), 7);
        mock.push_rows(vec![row]);

        let found = repo.find(saved.id).await.unwrap().unwrap();
        assert_eq!(found, Member { id: 9, ..original });
    }
}

#[tokio::test]
async fn clause_order_is_independent_of_call_order() {
    let (orm, _mock) = connected(DialectKind::Postgres).await;

    let sql = orm
        .table("orders")
        .shared_lock()
        .offset(5)
        .limit(5)
        .order_by_asc("id")
        .having("SUM(total)", ">", 100)
        .group_by("customer_id")
        .where_not_null("paid_at")
        .inner_join("customers", "customers.id", "=", "orders.customer_id")
        .select(&["customer_id", "SUM(total)"])
        .get_sql()
        .unwrap();

    assert_eq!(
        sql,
        "SELECT customer_id, SUM(total) FROM orders \
         INNER JOIN customers ON customers.id = orders.customer_id \
         WHERE paid_at IS NOT NULL GROUP BY customer_id HAVING SUM(total) > $1 \
         ORDER BY id ASC LIMIT 5 OFFSET 5 FOR SHARE"
    );
}
